// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Drawing, state and layer entry points.
//!
//! Each takes a canvas handle: either a surface or the recorder token
//! passed to a recording callback.

use kurbo::Stroke;
use peniko::BlendMode;
use understory_canvas::{
    CanvasError, ColorStop, Glyph, LinearGradient, RadialGradient, Result, SweepGradient,
};

use crate::error::{read_slice, status};
use crate::registry::{FONTS, IMAGES, MASKS, PATHS, with_canvas};
use crate::types::{self, UcAffine, UcBlendMode, UcColor, UcColorStop, UcGlyph, UcRect, UcStroke};

/// # Safety
///
/// `stops` must be null or valid for reads of `count` stops.
unsafe fn stops(stops: *const UcColorStop, count: usize) -> Result<Vec<ColorStop>> {
    // SAFETY: forwarded caller contract.
    let stops = unsafe { read_slice(stops, count, "stops") }?;
    Ok(stops.iter().copied().map(ColorStop::from).collect())
}

/// # Safety
///
/// `glyphs` must be null or valid for reads of `count` glyphs.
unsafe fn glyphs(glyphs: *const UcGlyph, count: usize) -> Result<Vec<Glyph>> {
    // SAFETY: forwarded caller contract.
    let glyphs = unsafe { read_slice(glyphs, count, "glyphs") }?;
    Ok(glyphs.iter().copied().map(Glyph::from).collect())
}

/// Paint with a solid straight-alpha color.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_set_solid_color(canvas: u64, color: UcColor) -> i32 {
    status(|| with_canvas(canvas, |c| c.set_solid_color(color.into())))
}

/// Paint with a linear gradient from `(x0, y0)` to `(x1, y1)`.
///
/// # Safety
///
/// `stops` must be null or valid for reads of `count` stops.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_set_linear_gradient(
    canvas: u64,
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    stops: *const UcColorStop,
    count: usize,
    extend: u8,
) -> i32 {
    status(|| {
        // SAFETY: forwarded caller contract.
        let stops = unsafe { self::stops(stops, count) }?;
        let gradient = LinearGradient::new(
            types::point(x0, y0),
            types::point(x1, y1),
            stops,
            types::extend(extend)?,
        )?;
        with_canvas(canvas, |c| c.set_linear_gradient(gradient))
    })
}

/// Paint with a radial gradient around `(cx, cy)`.
///
/// # Safety
///
/// `stops` must be null or valid for reads of `count` stops.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_set_radial_gradient(
    canvas: u64,
    cx: f64,
    cy: f64,
    radius: f32,
    stops: *const UcColorStop,
    count: usize,
    extend: u8,
) -> i32 {
    status(|| {
        // SAFETY: forwarded caller contract.
        let stops = unsafe { self::stops(stops, count) }?;
        let gradient =
            RadialGradient::new(types::point(cx, cy), radius, stops, types::extend(extend)?)?;
        with_canvas(canvas, |c| c.set_radial_gradient(gradient))
    })
}

/// Paint with a sweep gradient around `(cx, cy)`. Angles are in radians.
///
/// # Safety
///
/// `stops` must be null or valid for reads of `count` stops.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_set_sweep_gradient(
    canvas: u64,
    cx: f64,
    cy: f64,
    start_angle: f32,
    end_angle: f32,
    stops: *const UcColorStop,
    count: usize,
    extend: u8,
) -> i32 {
    status(|| {
        // SAFETY: forwarded caller contract.
        let stops = unsafe { self::stops(stops, count) }?;
        let gradient = SweepGradient::new(
            types::point(cx, cy),
            start_angle,
            end_angle,
            stops,
            types::extend(extend)?,
        )?;
        with_canvas(canvas, |c| c.set_sweep_gradient(gradient))
    })
}

/// Paint with an image created by `ucanvas_image_new`.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_set_image(canvas: u64, image: u64) -> i32 {
    status(|| {
        let image = IMAGES.cloned(image)?;
        with_canvas(canvas, |c| c.set_image(image))
    })
}

/// Set the stroke style.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_set_stroke(canvas: u64, stroke: UcStroke) -> i32 {
    status(|| {
        let stroke = Stroke::try_from(stroke)?;
        with_canvas(canvas, |c| c.set_stroke(stroke))
    })
}

/// Set the geometry transform.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_set_transform(canvas: u64, transform: UcAffine) -> i32 {
    status(|| with_canvas(canvas, |c| c.set_transform(transform.into())))
}

/// Reset the geometry transform to identity.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_reset_transform(canvas: u64) -> i32 {
    status(|| with_canvas(canvas, |c| c.reset_transform()))
}

/// Set the paint transform.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_set_paint_transform(canvas: u64, transform: UcAffine) -> i32 {
    status(|| with_canvas(canvas, |c| c.set_paint_transform(transform.into())))
}

/// Reset the paint transform to identity.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_reset_paint_transform(canvas: u64) -> i32 {
    status(|| with_canvas(canvas, |c| c.reset_paint_transform()))
}

/// Set the fill rule: non-zero 0, even-odd 1.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_set_fill_rule(canvas: u64, fill_rule: u8) -> i32 {
    status(|| {
        let rule = types::fill_rule(fill_rule)?;
        with_canvas(canvas, |c| c.set_fill_rule(rule))
    })
}

/// Set the aliasing threshold in `0..=255`, or a negative value to restore
/// anti-aliasing.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_set_aliasing_threshold(canvas: u64, threshold: i16) -> i32 {
    status(|| {
        let threshold = if threshold < 0 {
            None
        } else {
            Some(u8::try_from(threshold).map_err(|_| {
                CanvasError::InvalidParameter(format!(
                    "aliasing threshold {threshold} exceeds 255"
                ))
            })?)
        };
        with_canvas(canvas, |c| c.set_aliasing_threshold(threshold))
    })
}

/// Open a layer clipped to `path`.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_push_clip_layer(canvas: u64, path: u64) -> i32 {
    status(|| {
        let path = PATHS.cloned(path)?;
        with_canvas(canvas, |c| c.push_clip_layer(&path))
    })
}

/// Open a layer composited with `opacity`.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_push_opacity_layer(canvas: u64, opacity: f32) -> i32 {
    status(|| with_canvas(canvas, |c| c.push_opacity_layer(opacity)))
}

/// Open a layer composited with a blend mode.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_push_blend_layer(canvas: u64, blend: UcBlendMode) -> i32 {
    status(|| {
        let blend = BlendMode::try_from(blend)?;
        with_canvas(canvas, |c| c.push_blend_layer(blend))
    })
}

/// Open a layer masked by `mask`.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_push_mask_layer(canvas: u64, mask: u64) -> i32 {
    status(|| {
        let mask = MASKS.cloned(mask)?;
        with_canvas(canvas, |c| c.push_mask_layer(&mask))
    })
}

/// Open a layer with any subset of clip, blend, opacity, and mask.
///
/// A `0` path or mask handle and a null `blend` or `opacity` leave that
/// component out.
///
/// # Safety
///
/// `blend` and `opacity` must each be null or valid for a read.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_push_layer(
    canvas: u64,
    path: u64,
    blend: *const UcBlendMode,
    opacity: *const f32,
    mask: u64,
) -> i32 {
    status(|| {
        let path = (path != 0).then(|| PATHS.cloned(path)).transpose()?;
        let mask = (mask != 0).then(|| MASKS.cloned(mask)).transpose()?;
        // SAFETY: null or valid for a read per the caller contract.
        let blend = unsafe { blend.as_ref() }
            .map(|b| BlendMode::try_from(*b))
            .transpose()?;
        // SAFETY: null or valid for a read per the caller contract.
        let opacity = unsafe { opacity.as_ref() }.copied();
        with_canvas(canvas, |c| {
            c.push_layer(path.as_ref(), blend, opacity, mask.as_ref())
        })
    })
}

/// Close the most recently opened layer.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_pop_layer(canvas: u64) -> i32 {
    status(|| with_canvas(canvas, |c| c.pop_layer()))
}

/// Fill `rect` with the current paint.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_fill_rect(canvas: u64, rect: UcRect) -> i32 {
    status(|| with_canvas(canvas, |c| c.fill_rect(rect.into())))
}

/// Stroke the outline of `rect`.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_stroke_rect(canvas: u64, rect: UcRect) -> i32 {
    status(|| with_canvas(canvas, |c| c.stroke_rect(rect.into())))
}

/// Fill `rect` with corner `radius`, blurred with a Gaussian of `std_dev`.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_fill_blurred_rounded_rect(
    canvas: u64,
    rect: UcRect,
    radius: f32,
    std_dev: f32,
) -> i32 {
    status(|| with_canvas(canvas, |c| c.fill_blurred_rounded_rect(rect.into(), radius, std_dev)))
}

/// Fill `path` using the current fill rule.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_fill_path(canvas: u64, path: u64) -> i32 {
    status(|| {
        let path = PATHS.cloned(path)?;
        with_canvas(canvas, |c| c.fill_path(&path))
    })
}

/// Stroke `path` with the current stroke style.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_stroke_path(canvas: u64, path: u64) -> i32 {
    status(|| {
        let path = PATHS.cloned(path)?;
        with_canvas(canvas, |c| c.stroke_path(&path))
    })
}

/// Fill glyph outlines of `font` at `font_size`.
///
/// # Safety
///
/// `glyphs` must be null or valid for reads of `count` glyphs.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_fill_glyphs(
    canvas: u64,
    font: u64,
    font_size: f32,
    glyphs: *const UcGlyph,
    count: usize,
) -> i32 {
    status(|| {
        let font = FONTS.cloned(font)?;
        // SAFETY: forwarded caller contract.
        let glyphs = unsafe { self::glyphs(glyphs, count) }?;
        with_canvas(canvas, |c| c.fill_glyphs(&font, font_size, &glyphs))
    })
}

/// Stroke glyph outlines of `font` at `font_size`.
///
/// # Safety
///
/// `glyphs` must be null or valid for reads of `count` glyphs.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_stroke_glyphs(
    canvas: u64,
    font: u64,
    font_size: f32,
    glyphs: *const UcGlyph,
    count: usize,
) -> i32 {
    status(|| {
        let font = FONTS.cloned(font)?;
        // SAFETY: forwarded caller contract.
        let glyphs = unsafe { self::glyphs(glyphs, count) }?;
        with_canvas(canvas, |c| c.stroke_glyphs(&font, font_size, &glyphs))
    })
}
