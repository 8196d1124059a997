// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface lifetime, output, and drawing state getters.

use understory_canvas::{CanvasError, Paint, RenderSettings, Result};
use understory_canvas_vello_cpu::{CpuSurface, new_surface, new_surface_with_settings};

use crate::error::{status, write_out, write_slice};
use crate::registry::{PIXMAPS, SURFACES};
use crate::types::{self, UcAffine, UcColor, UcRenderSettings, UcStroke};

/// Run `get` on `surface` and write the result through `out`.
///
/// # Safety
///
/// `out` must be null or valid for a write of `T`.
unsafe fn read_surface<T>(
    surface: u64,
    out: *mut T,
    get: impl FnOnce(&CpuSurface) -> Result<T>,
) -> i32 {
    status(|| {
        let value = SURFACES.with(surface, |s| get(s))?;
        // SAFETY: forwarded caller contract.
        unsafe { write_out(out, value, "out") }
    })
}

/// Create a `width` x `height` surface with default settings.
///
/// # Safety
///
/// `out_surface` must be null or valid for a write of `u64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_surface_new(width: u16, height: u16, out_surface: *mut u64) -> i32 {
    status(|| {
        let handle = SURFACES.insert(new_surface(width, height)?)?;
        // SAFETY: forwarded caller contract.
        unsafe { write_out(out_surface, handle, "out_surface") }
    })
}

/// Create a surface with explicit render settings.
///
/// # Safety
///
/// `out_surface` must be null or valid for a write of `u64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_surface_new_with_settings(
    width: u16,
    height: u16,
    settings: UcRenderSettings,
    out_surface: *mut u64,
) -> i32 {
    status(|| {
        let settings = RenderSettings::try_from(settings)?;
        let handle = SURFACES.insert(new_surface_with_settings(width, height, settings)?)?;
        // SAFETY: forwarded caller contract.
        unsafe { write_out(out_surface, handle, "out_surface") }
    })
}

/// Free a surface. Null and already freed handles are ignored.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_surface_free(surface: u64) {
    SURFACES.remove(surface);
}

/// Clear the surface content and close every open layer. Drawing state is kept.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_surface_reset(surface: u64) -> i32 {
    status(|| SURFACES.with(surface, |s| s.reset()))
}

/// Rasterize everything drawn so far.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_surface_flush(surface: u64) -> i32 {
    status(|| SURFACES.with(surface, |s| s.flush()))
}

/// Copy the rendered pixels into `pixmap`, which must match the surface size.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_surface_render_to_pixmap(surface: u64, pixmap: u64) -> i32 {
    status(|| SURFACES.with(surface, |s| PIXMAPS.with(pixmap, |p| s.render_to_pixmap(p))))
}

/// Copy the rendered pixels into `buffer` as premultiplied RGBA8.
///
/// # Safety
///
/// `buffer` must be null or valid for writes of `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_surface_render_to_buffer(
    surface: u64,
    buffer: *mut u8,
    len: usize,
    width: u16,
    height: u16,
    render_mode: u8,
) -> i32 {
    status(|| {
        let mode = types::render_mode(render_mode)?;
        // SAFETY: forwarded caller contract.
        let buffer = unsafe { write_slice(buffer, len, "buffer") }?;
        SURFACES.with(surface, |s| s.render_to_buffer(buffer, width, height, mode))
    })
}

/// Width of the surface in pixels.
///
/// # Safety
///
/// `out_width` must be null or valid for a write of `u16`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_surface_width(surface: u64, out_width: *mut u16) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe { read_surface(surface, out_width, |s| Ok(s.width())) }
}

/// Height of the surface in pixels.
///
/// # Safety
///
/// `out_height` must be null or valid for a write of `u16`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_surface_height(surface: u64, out_height: *mut u16) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe { read_surface(surface, out_height, |s| Ok(s.height())) }
}

/// Settings the surface was created with, with the SIMD level resolved.
///
/// # Safety
///
/// `out_settings` must be null or valid for a write of [`UcRenderSettings`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_surface_render_settings(
    surface: u64,
    out_settings: *mut UcRenderSettings,
) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe { read_surface(surface, out_settings, |s| Ok(s.render_settings().into())) }
}

/// Number of currently open layers.
///
/// # Safety
///
/// `out_depth` must be null or valid for a write of `usize`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_surface_layer_depth(surface: u64, out_depth: *mut usize) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe { read_surface(surface, out_depth, |s| Ok(s.layer_depth())) }
}

/// Kind of the current paint: solid 0, linear 1, radial 2, sweep 3, image 4.
///
/// # Safety
///
/// `out_kind` must be null or valid for a write of `u8`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_surface_paint_kind(surface: u64, out_kind: *mut u8) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe { read_surface(surface, out_kind, |s| Ok(s.paint_kind() as u8)) }
}

/// Color of the current paint. Fails with `InvalidParameter` unless it is solid.
///
/// # Safety
///
/// `out_color` must be null or valid for a write of [`UcColor`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_surface_solid_color(surface: u64, out_color: *mut UcColor) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe {
        read_surface(surface, out_color, |s| match s.paint() {
            Paint::Solid(color) => Ok((*color).into()),
            _ => Err(CanvasError::InvalidParameter(
                "current paint is not a solid color".into(),
            )),
        })
    }
}

/// Current stroke style.
///
/// # Safety
///
/// `out_stroke` must be null or valid for a write of [`UcStroke`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_surface_stroke(surface: u64, out_stroke: *mut UcStroke) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe { read_surface(surface, out_stroke, |s| Ok(s.stroke().into())) }
}

/// Current geometry transform.
///
/// # Safety
///
/// `out_transform` must be null or valid for a write of [`UcAffine`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_surface_transform(
    surface: u64,
    out_transform: *mut UcAffine,
) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe { read_surface(surface, out_transform, |s| Ok(s.transform().into())) }
}

/// Current paint transform.
///
/// # Safety
///
/// `out_transform` must be null or valid for a write of [`UcAffine`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_surface_paint_transform(
    surface: u64,
    out_transform: *mut UcAffine,
) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe { read_surface(surface, out_transform, |s| Ok(s.paint_transform().into())) }
}

/// Current fill rule: non-zero 0, even-odd 1.
///
/// # Safety
///
/// `out_rule` must be null or valid for a write of `u8`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_surface_fill_rule(surface: u64, out_rule: *mut u8) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe { read_surface(surface, out_rule, |s| Ok(types::fill_rule_code(s.fill_rule()))) }
}

/// Current aliasing threshold, or `-1` when anti-aliasing is on.
///
/// # Safety
///
/// `out_threshold` must be null or valid for a write of `i16`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_surface_aliasing_threshold(
    surface: u64,
    out_threshold: *mut i16,
) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe {
        read_surface(surface, out_threshold, |s| {
            Ok(s.aliasing_threshold().map_or(-1, i16::from))
        })
    }
}
