// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The drawing vocabulary shared by surfaces and recorders.

use alloc::vec::Vec;

use kurbo::{Affine, BezPath, Rect, Stroke};
use peniko::BlendMode;
use peniko::color::Rgba8;

use crate::font::{Font, Glyph, GlyphRun};
use crate::layer::{CompositeLayer, Layer};
use crate::op::{CanvasOp, DrawOp, StateOp};
use crate::paint::{LinearGradient, Paint, RadialGradient, SweepGradient};
use crate::pixmap::{Image, Mask};
use crate::state::FillRule;
use crate::{CanvasError, Result};

/// A sink for canvas operations.
///
/// Implementors provide [`Canvas::submit`]; every other method validates its
/// arguments locally, builds the matching [`CanvasOp`], and submits it.
/// Invalid arguments fail before anything is submitted.
pub trait Canvas {
    /// Accept a single operation.
    fn submit(&mut self, op: CanvasOp) -> Result<()>;

    /// Replace the current paint.
    fn set_paint(&mut self, paint: Paint) -> Result<()> {
        paint.validate()?;
        self.submit(StateOp::SetPaint(paint).into())
    }

    /// Paint with a single straight-alpha color.
    fn set_solid_color(&mut self, color: Rgba8) -> Result<()> {
        self.set_paint(Paint::Solid(color))
    }

    /// Paint with a linear gradient.
    fn set_linear_gradient(&mut self, gradient: LinearGradient) -> Result<()> {
        self.set_paint(Paint::LinearGradient(gradient))
    }

    /// Paint with a radial gradient.
    fn set_radial_gradient(&mut self, gradient: RadialGradient) -> Result<()> {
        self.set_paint(Paint::RadialGradient(gradient))
    }

    /// Paint with a sweep gradient.
    fn set_sweep_gradient(&mut self, gradient: SweepGradient) -> Result<()> {
        self.set_paint(Paint::SweepGradient(gradient))
    }

    /// Paint with an image pattern.
    fn set_image(&mut self, image: Image) -> Result<()> {
        self.set_paint(Paint::Image(image))
    }

    /// Replace the stroke style. The width must be finite and non-negative.
    fn set_stroke(&mut self, stroke: Stroke) -> Result<()> {
        if !stroke.width.is_finite() || stroke.width < 0.0 {
            return Err(CanvasError::invalid(
                "stroke width must be finite and non-negative",
            ));
        }
        if !stroke.miter_limit.is_finite() {
            return Err(CanvasError::invalid("miter limit must be finite"));
        }
        self.submit(StateOp::SetStroke(stroke).into())
    }

    /// Replace the geometry transform.
    fn set_transform(&mut self, transform: Affine) -> Result<()> {
        check_affine(transform)?;
        self.submit(StateOp::SetTransform(transform).into())
    }

    /// Restore the identity geometry transform.
    fn reset_transform(&mut self) -> Result<()> {
        self.set_transform(Affine::IDENTITY)
    }

    /// Replace the paint-space transform.
    fn set_paint_transform(&mut self, transform: Affine) -> Result<()> {
        check_affine(transform)?;
        self.submit(StateOp::SetPaintTransform(transform).into())
    }

    /// Restore the identity paint-space transform.
    fn reset_paint_transform(&mut self) -> Result<()> {
        self.set_paint_transform(Affine::IDENTITY)
    }

    /// Replace the fill rule.
    fn set_fill_rule(&mut self, fill_rule: FillRule) -> Result<()> {
        self.submit(StateOp::SetFillRule(fill_rule).into())
    }

    /// Replace the anti-aliasing threshold; `None` restores the default.
    fn set_aliasing_threshold(&mut self, threshold: Option<u8>) -> Result<()> {
        self.submit(StateOp::SetAliasingThreshold(threshold).into())
    }

    /// Open a layer described by `layer`.
    fn push(&mut self, layer: Layer) -> Result<()> {
        layer.validate()?;
        self.submit(StateOp::PushLayer(layer).into())
    }

    /// Open a layer clipped to `path`.
    fn push_clip_layer(&mut self, path: &BezPath) -> Result<()> {
        self.push(Layer::Clip(path.clone()))
    }

    /// Open a layer whose contents are scaled by `opacity` in `[0, 1]`.
    fn push_opacity_layer(&mut self, opacity: f32) -> Result<()> {
        self.push(Layer::Opacity(opacity))
    }

    /// Open a layer composited with `blend`.
    fn push_blend_layer(&mut self, blend: BlendMode) -> Result<()> {
        self.push(Layer::Blend(blend))
    }

    /// Open a layer whose alpha is multiplied by `mask`.
    fn push_mask_layer(&mut self, mask: &Mask) -> Result<()> {
        self.push(Layer::Mask(mask.clone()))
    }

    /// Open a layer combining any subset of clip, blend, opacity, and mask.
    fn push_layer(
        &mut self,
        clip: Option<&BezPath>,
        blend: Option<BlendMode>,
        opacity: Option<f32>,
        mask: Option<&Mask>,
    ) -> Result<()> {
        self.push(Layer::Composite(CompositeLayer {
            clip: clip.cloned(),
            blend,
            opacity,
            mask: mask.cloned(),
        }))
    }

    /// Close the most recently opened layer.
    fn pop_layer(&mut self) -> Result<()> {
        self.submit(StateOp::PopLayer.into())
    }

    /// Fill `rect` with the current paint.
    fn fill_rect(&mut self, rect: Rect) -> Result<()> {
        check_rect(rect)?;
        self.submit(DrawOp::FillRect(rect).into())
    }

    /// Stroke the outline of `rect`.
    fn stroke_rect(&mut self, rect: Rect) -> Result<()> {
        check_rect(rect)?;
        self.submit(DrawOp::StrokeRect(rect).into())
    }

    /// Fill a rounded rectangle blurred with standard deviation `std_dev`.
    fn fill_blurred_rounded_rect(&mut self, rect: Rect, radius: f32, std_dev: f32) -> Result<()> {
        check_rect(rect)?;
        if !radius.is_finite() || radius < 0.0 {
            return Err(CanvasError::invalid(
                "corner radius must be finite and non-negative",
            ));
        }
        if !std_dev.is_finite() || std_dev < 0.0 {
            return Err(CanvasError::invalid(
                "blur standard deviation must be finite and non-negative",
            ));
        }
        self.submit(
            DrawOp::FillBlurredRoundedRect {
                rect,
                radius,
                std_dev,
            }
            .into(),
        )
    }

    /// Fill `path` with the current paint and fill rule.
    fn fill_path(&mut self, path: &BezPath) -> Result<()> {
        self.submit(DrawOp::FillPath(path.clone()).into())
    }

    /// Stroke `path` with the current paint and stroke style.
    fn stroke_path(&mut self, path: &BezPath) -> Result<()> {
        self.submit(DrawOp::StrokePath(path.clone()).into())
    }

    /// Fill positioned glyphs from `font` at `font_size`.
    fn fill_glyphs(&mut self, font: &Font, font_size: f32, glyphs: &[Glyph]) -> Result<()> {
        let run = glyph_run(font, font_size, glyphs)?;
        self.submit(DrawOp::FillGlyphs(run).into())
    }

    /// Stroke positioned glyphs from `font` at `font_size`.
    fn stroke_glyphs(&mut self, font: &Font, font_size: f32, glyphs: &[Glyph]) -> Result<()> {
        let run = glyph_run(font, font_size, glyphs)?;
        self.submit(DrawOp::StrokeGlyphs(run).into())
    }
}

fn check_affine(transform: Affine) -> Result<()> {
    if transform.as_coeffs().iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(CanvasError::invalid("transform coefficients must be finite"))
    }
}

fn check_rect(rect: Rect) -> Result<()> {
    if [rect.x0, rect.y0, rect.x1, rect.y1]
        .iter()
        .all(|c| c.is_finite())
    {
        Ok(())
    } else {
        Err(CanvasError::invalid("rectangle coordinates must be finite"))
    }
}

fn glyph_run(font: &Font, font_size: f32, glyphs: &[Glyph]) -> Result<GlyphRun> {
    if !font_size.is_finite() || font_size <= 0.0 {
        return Err(CanvasError::invalid("font size must be positive"));
    }
    Ok(GlyphRun {
        font: font.clone(),
        font_size,
        glyphs: Vec::from(glyphs),
    })
}
