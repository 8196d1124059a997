// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! PNG encoding and decoding for pixmaps.

use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;

use peniko::color::PremulRgba8;

use crate::pixmap::{Pixmap, unpremultiply};
use crate::{CanvasError, Result};

/// Encode `pixmap` as an 8-bit RGBA PNG with straight alpha.
pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(pixmap.data().len() * 4);
    for p in pixmap.data() {
        let c = unpremultiply(*p);
        bytes.extend_from_slice(&[c.r, c.g, c.b, c.a]);
    }

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(
            &mut out,
            u32::from(pixmap.width()),
            u32::from(pixmap.height()),
        );
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| CanvasError::PngEncode(e.to_string()))?;
        writer
            .write_image_data(&bytes)
            .map_err(|e| CanvasError::PngEncode(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| CanvasError::PngEncode(e.to_string()))?;
    }
    Ok(out)
}

/// Decode PNG data into a premultiplied pixmap.
///
/// Palette, grayscale, and 16-bit inputs are expanded to 8-bit RGBA.
pub fn decode_png(data: &[u8]) -> Result<Pixmap> {
    let mut decoder = png::Decoder::new(data);
    decoder.set_transformations(
        png::Transformations::EXPAND | png::Transformations::ALPHA | png::Transformations::STRIP_16,
    );
    let mut reader = decoder
        .read_info()
        .map_err(|e| CanvasError::PngDecode(e.to_string()))?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| CanvasError::PngDecode(e.to_string()))?;
    buf.truncate(info.buffer_size());

    let (Ok(width), Ok(height)) = (u16::try_from(info.width), u16::try_from(info.height)) else {
        return Err(CanvasError::PngDecode(alloc::format!(
            "{}x{} exceeds the maximum pixmap size",
            info.width,
            info.height
        )));
    };

    let pixels: Vec<PremulRgba8> = match (info.color_type, info.bit_depth) {
        (png::ColorType::Rgba, png::BitDepth::Eight) => buf
            .chunks_exact(4)
            .map(|px| premultiply(px[0], px[1], px[2], px[3]))
            .collect(),
        (png::ColorType::GrayscaleAlpha, png::BitDepth::Eight) => buf
            .chunks_exact(2)
            .map(|px| premultiply(px[0], px[0], px[0], px[1]))
            .collect(),
        (color, depth) => {
            return Err(CanvasError::PngDecode(alloc::format!(
                "unsupported output format {color:?} at {depth:?}"
            )));
        }
    };
    Pixmap::from_parts(pixels, width, height)
        .map_err(|_| CanvasError::PngDecode("truncated image data".to_string()))
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "the product of two bytes divided by 255 fits in a byte"
)]
fn premultiply(r: u8, g: u8, b: u8, a: u8) -> PremulRgba8 {
    let alpha = u16::from(a);
    let scale = |c: u8| ((u16::from(c) * alpha + 127) / 255) as u8;
    PremulRgba8 {
        r: scale(r),
        g: scale(g),
        b: scale(b),
        a,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_pixels_round_trip_exactly() {
        let mut pixmap = Pixmap::new(3, 2);
        for (i, px) in pixmap.data_mut().iter_mut().enumerate() {
            let v = (i * 40) as u8;
            *px = PremulRgba8 {
                r: v,
                g: 255 - v,
                b: v / 2,
                a: 255,
            };
        }
        let png = encode_png(&pixmap).unwrap();
        let decoded = decode_png(&png).unwrap();
        assert_eq!(decoded, pixmap);
    }

    #[test]
    fn transparent_pixels_stay_transparent() {
        let pixmap = Pixmap::new(2, 2);
        let decoded = decode_png(&encode_png(&pixmap).unwrap()).unwrap();
        assert_eq!(decoded, pixmap);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode_png(b"definitely not a png").unwrap_err();
        assert!(
            matches!(err, CanvasError::PngDecode(_)),
            "expected a decode error, got {err:?}"
        );
    }
}
