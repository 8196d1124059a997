// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paths, pixmaps, masks, images, and fonts.

use std::ffi::{CStr, c_char};

use kurbo::BezPath;
use understory_canvas::{CanvasError, Font, Image, Mask, Pixmap, Result, decode_png, encode_png};

use crate::error::{read_slice, status, write_out, write_slice};
use crate::registry::{FONTS, IMAGES, MASKS, PATHS, PIXMAPS, Registry};
use crate::types::{self, UcGlyph, UcPremulRgba8};

/// # Safety
///
/// `out` must be null or valid for a write of `u64`.
unsafe fn insert_into<T>(
    registry: &Registry<T>,
    out: *mut u64,
    what: &'static str,
    create: impl FnOnce() -> Result<T>,
) -> i32 {
    status(|| {
        if out.is_null() {
            return Err(CanvasError::NullPointer(what));
        }
        let handle = registry.insert(create()?)?;
        // SAFETY: forwarded caller contract.
        unsafe { write_out(out, handle, what) }
    })
}

fn edit_path(path: u64, f: impl FnOnce(&mut BezPath)) -> i32 {
    status(|| {
        PATHS.with(path, |p| {
            f(p);
            Ok(())
        })
    })
}

/// Like [`edit_path`], for elements that continue the current subpath.
fn extend_path(path: u64, f: impl FnOnce(&mut BezPath)) -> i32 {
    status(|| {
        PATHS.with(path, |p| {
            if p.elements().is_empty() {
                return Err(CanvasError::InvalidParameter(
                    "path has no move_to".to_string(),
                ));
            }
            f(p);
            Ok(())
        })
    })
}

/// Create an empty path.
///
/// # Safety
///
/// `out_path` must be null or valid for a write of `u64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_path_new(out_path: *mut u64) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe { insert_into(&PATHS, out_path, "out_path", || Ok(BezPath::new())) }
}

/// Free a path. Null and already freed handles are ignored.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_path_free(path: u64) {
    PATHS.remove(path);
}

/// Start a new subpath at `(x, y)`.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_path_move_to(path: u64, x: f64, y: f64) -> i32 {
    edit_path(path, |p| p.move_to((x, y)))
}

/// Add a line to `(x, y)`.
///
/// This and the other segment calls fail with `INVALID_PARAMETER` on a
/// path that has no `move_to` yet.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_path_line_to(path: u64, x: f64, y: f64) -> i32 {
    extend_path(path, |p| p.line_to((x, y)))
}

/// Add a quadratic Bézier through control point `(x1, y1)` to `(x, y)`.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_path_quad_to(path: u64, x1: f64, y1: f64, x: f64, y: f64) -> i32 {
    extend_path(path, |p| p.quad_to((x1, y1), (x, y)))
}

/// Add a cubic Bézier through `(x1, y1)` and `(x2, y2)` to `(x, y)`.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_path_curve_to(
    path: u64,
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    x: f64,
    y: f64,
) -> i32 {
    extend_path(path, |p| p.curve_to((x1, y1), (x2, y2), (x, y)))
}

/// Close the current subpath.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_path_close(path: u64) -> i32 {
    extend_path(path, BezPath::close_path)
}

/// Remove every element from the path.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_path_clear(path: u64) -> i32 {
    edit_path(path, |p| p.truncate(0))
}

/// Create a transparent `width` x `height` pixmap.
///
/// # Safety
///
/// `out_pixmap` must be null or valid for a write of `u64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_pixmap_new(width: u16, height: u16, out_pixmap: *mut u64) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe {
        insert_into(&PIXMAPS, out_pixmap, "out_pixmap", || {
            Ok(Pixmap::new(width, height))
        })
    }
}

/// Free a pixmap. Null and already freed handles are ignored.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_pixmap_free(pixmap: u64) {
    PIXMAPS.remove(pixmap);
}

/// Width and height of a pixmap.
///
/// # Safety
///
/// `out_width` and `out_height` must each be null or valid for a write of `u16`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_pixmap_size(
    pixmap: u64,
    out_width: *mut u16,
    out_height: *mut u16,
) -> i32 {
    status(|| {
        let (width, height) = PIXMAPS.with(pixmap, |p| Ok((p.width(), p.height())))?;
        // SAFETY: forwarded caller contract.
        unsafe {
            write_out(out_width, width, "out_width")?;
            write_out(out_height, height, "out_height")
        }
    })
}

/// Borrow the premultiplied RGBA8 bytes of a pixmap.
///
/// The pointer stays valid until the pixmap is resized or freed.
///
/// # Safety
///
/// `out_data` must be null or valid for a write of a pointer, and
/// `out_len` null or valid for a write of `usize`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_pixmap_data(
    pixmap: u64,
    out_data: *mut *mut u8,
    out_len: *mut usize,
) -> i32 {
    status(|| {
        let (data, len) = PIXMAPS.with(pixmap, |p| {
            let pixels = p.data_mut();
            Ok((pixels.as_mut_ptr().cast::<u8>(), pixels.len() * 4))
        })?;
        // SAFETY: forwarded caller contract.
        unsafe {
            write_out(out_data, data, "out_data")?;
            write_out(out_len, len, "out_len")
        }
    })
}

/// Reshape a pixmap to `width` x `height`, clearing it.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_pixmap_resize(pixmap: u64, width: u16, height: u16) -> i32 {
    status(|| {
        PIXMAPS.with(pixmap, |p| {
            p.resize(width, height);
            Ok(())
        })
    })
}

/// Read the pixel at `(x, y)`.
///
/// # Safety
///
/// `out_pixel` must be null or valid for a write of [`UcPremulRgba8`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_pixmap_sample(
    pixmap: u64,
    x: u16,
    y: u16,
    out_pixel: *mut UcPremulRgba8,
) -> i32 {
    status(|| {
        let pixel = PIXMAPS.with(pixmap, |p| p.sample(x, y))?;
        // SAFETY: forwarded caller contract.
        unsafe { write_out(out_pixel, pixel.into(), "out_pixel") }
    })
}

/// Decode PNG bytes into a new pixmap.
///
/// # Safety
///
/// `data` must be null or valid for reads of `len` bytes, and
/// `out_pixmap` null or valid for a write of `u64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_pixmap_from_png(
    data: *const u8,
    len: usize,
    out_pixmap: *mut u64,
) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe {
        insert_into(&PIXMAPS, out_pixmap, "out_pixmap", || {
            decode_png(read_slice(data, len, "data")?)
        })
    }
}

/// Encode a pixmap as PNG. Release the bytes with `ucanvas_png_data_free`.
///
/// # Safety
///
/// `out_data` must be null or valid for a write of a pointer, and
/// `out_len` null or valid for a write of `usize`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_pixmap_to_png(
    pixmap: u64,
    out_data: *mut *mut u8,
    out_len: *mut usize,
) -> i32 {
    status(|| {
        if out_data.is_null() || out_len.is_null() {
            return Err(CanvasError::NullPointer("out_data"));
        }
        let bytes = PIXMAPS.with(pixmap, |p| encode_png(p))?.into_boxed_slice();
        let len = bytes.len();
        let data = Box::into_raw(bytes).cast::<u8>();
        // SAFETY: both checked non-null above, valid per the caller contract.
        unsafe {
            write_out(out_data, data, "out_data")?;
            write_out(out_len, len, "out_len")
        }
    })
}

/// Release bytes returned by `ucanvas_pixmap_to_png`. Null is ignored.
///
/// # Safety
///
/// `data` and `len` must come from one `ucanvas_pixmap_to_png` call and
/// must not be released twice.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_png_data_free(data: *mut u8, len: usize) {
    if data.is_null() {
        return;
    }
    // SAFETY: allocated by `ucanvas_pixmap_to_png` as a boxed slice of `len` bytes.
    drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(data, len)) });
}

/// Derive a mask from a pixmap: alpha 0, luminance 1.
///
/// # Safety
///
/// `out_mask` must be null or valid for a write of `u64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_mask_new(pixmap: u64, kind: u8, out_mask: *mut u64) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe {
        insert_into(&MASKS, out_mask, "out_mask", || {
            let kind = types::mask_kind(kind)?;
            PIXMAPS.with(pixmap, |p| Mask::new(p, kind))
        })
    }
}

/// Free a mask. Null and already freed handles are ignored.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_mask_free(mask: u64) {
    MASKS.remove(mask);
}

/// Width and height of a mask.
///
/// # Safety
///
/// `out_width` and `out_height` must each be null or valid for a write of `u16`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_mask_size(
    mask: u64,
    out_width: *mut u16,
    out_height: *mut u16,
) -> i32 {
    status(|| {
        let (width, height) = MASKS.with(mask, |m| Ok((m.width(), m.height())))?;
        // SAFETY: forwarded caller contract.
        unsafe {
            write_out(out_width, width, "out_width")?;
            write_out(out_height, height, "out_height")
        }
    })
}

/// Create an image paint from a snapshot of `pixmap`.
///
/// Extends: pad 0, repeat 1, reflect 2. Quality: low 0, medium 1, high 2.
///
/// # Safety
///
/// `out_image` must be null or valid for a write of `u64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_image_new(
    pixmap: u64,
    x_extend: u8,
    y_extend: u8,
    quality: u8,
    alpha: f32,
    out_image: *mut u64,
) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe {
        insert_into(&IMAGES, out_image, "out_image", || {
            let x_extend = types::extend(x_extend)?;
            let y_extend = types::extend(y_extend)?;
            let quality = types::image_quality(quality)?;
            Image::new(PIXMAPS.cloned(pixmap)?, x_extend, y_extend, quality, alpha)
        })
    }
}

/// Free an image. Null and already freed handles are ignored.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_image_free(image: u64) {
    IMAGES.remove(image);
}

/// Load face `index` of the font file in `data`. The bytes are copied.
///
/// # Safety
///
/// `data` must be null or valid for reads of `len` bytes, and
/// `out_font` null or valid for a write of `u64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_font_new(
    data: *const u8,
    len: usize,
    index: u32,
    out_font: *mut u64,
) -> i32 {
    // SAFETY: forwarded caller contract.
    unsafe {
        insert_into(&FONTS, out_font, "out_font", || {
            Font::new(read_slice(data, len, "data")?, index)
        })
    }
}

/// Free a font. Null and already freed handles are ignored.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_font_free(font: u64) {
    FONTS.remove(font);
}

/// Map UTF-8 `text` to glyphs on one line, one glyph per mapped character.
///
/// The glyph count is always written to `out_count`. Pass a null `glyphs`
/// to query it; a non-null buffer smaller than the count fails with
/// `InvalidParameter`.
///
/// # Safety
///
/// `text` must be null or a NUL-terminated string, `glyphs` null or valid
/// for writes of `capacity` glyphs, and `out_count` null or valid for a
/// write of `usize`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_font_text_to_glyphs(
    font: u64,
    text: *const c_char,
    font_size: f32,
    glyphs: *mut UcGlyph,
    capacity: usize,
    out_count: *mut usize,
) -> i32 {
    status(|| {
        if text.is_null() {
            return Err(CanvasError::NullPointer("text"));
        }
        // SAFETY: non-null and NUL-terminated per the caller contract.
        let text = unsafe { CStr::from_ptr(text) }
            .to_str()
            .map_err(|e| CanvasError::InvalidParameter(format!("text is not UTF-8: {e}")))?;
        let laid_out = FONTS.with(font, |f| f.text_to_glyphs(text, font_size))?;
        // SAFETY: forwarded caller contract.
        unsafe { write_out(out_count, laid_out.len(), "out_count") }?;
        if glyphs.is_null() {
            return Ok(());
        }
        if capacity < laid_out.len() {
            return Err(CanvasError::InvalidParameter(format!(
                "glyph buffer holds {capacity}, {} needed",
                laid_out.len()
            )));
        }
        // SAFETY: non-null and valid for `capacity` writes per the caller contract.
        let out = unsafe { write_slice(glyphs, laid_out.len(), "glyphs") }?;
        for (slot, glyph) in out.iter_mut().zip(laid_out) {
            *slot = glyph.into();
        }
        Ok(())
    })
}
