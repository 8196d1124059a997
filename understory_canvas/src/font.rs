// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fonts, positioned glyphs, and a minimal text-to-glyph mapping.

use alloc::vec::Vec;

use peniko::{Blob, FontData};
use skrifa::instance::{LocationRef, Size};
use skrifa::metrics::GlyphMetrics;
use skrifa::{FontRef, MetadataProvider};

use crate::{CanvasError, Result};

/// A parsed font face that glyph runs can reference.
///
/// Cloning is cheap: the font bytes are shared.
#[derive(Clone, Debug)]
pub struct Font {
    data: FontData,
}

impl Font {
    /// Load face `index` from `bytes`.
    ///
    /// Fails with [`CanvasError::InvalidParameter`] for empty input or data
    /// that does not parse as a font.
    pub fn new(bytes: impl Into<Vec<u8>>, index: u32) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(CanvasError::invalid("font data is empty"));
        }
        if FontRef::from_index(&bytes, index).is_err() {
            return Err(CanvasError::InvalidParameter(alloc::format!(
                "font data does not contain a face at index {index}"
            )));
        }
        Ok(Self {
            data: FontData::new(Blob::from(bytes), index),
        })
    }

    /// Shared font data in the form backends consume.
    pub fn data(&self) -> &FontData {
        &self.data
    }

    /// Face index within the font collection.
    pub fn index(&self) -> u32 {
        self.data.index
    }

    /// Map `text` to glyphs laid out on a single horizontal line.
    ///
    /// One code point maps to one glyph through the font's character map,
    /// advancing by the glyph's horizontal advance. There is no shaping,
    /// kerning, or ligature substitution. Unmapped characters are skipped.
    pub fn text_to_glyphs(&self, text: &str, font_size: f32) -> Result<Vec<Glyph>> {
        if !font_size.is_finite() || font_size <= 0.0 {
            return Err(CanvasError::invalid("font size must be positive"));
        }
        let font_ref = FontRef::from_index(self.data.data.as_ref(), self.data.index)
            .map_err(|_| CanvasError::invalid("font data no longer parses"))?;
        let charmap = font_ref.charmap();
        let metrics = GlyphMetrics::new(&font_ref, Size::new(font_size), LocationRef::default());

        let mut x = 0.0_f32;
        let mut glyphs = Vec::with_capacity(text.len());
        for gid in text.chars().filter_map(|ch| charmap.map(ch)) {
            glyphs.push(Glyph {
                id: gid.to_u32(),
                x,
                y: 0.0,
            });
            x += metrics.advance_width(gid).unwrap_or(0.0);
        }
        Ok(glyphs)
    }
}

impl PartialEq for Font {
    fn eq(&self, other: &Self) -> bool {
        self.data.data.id() == other.data.data.id() && self.data.index == other.data.index
    }
}

/// A positioned glyph.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Glyph {
    /// Glyph id within the font.
    pub id: u32,
    /// Horizontal offset in user space.
    pub x: f32,
    /// Vertical offset in user space.
    pub y: f32,
}

/// A run of glyphs sharing a font and size.
#[derive(Clone, Debug, PartialEq)]
pub struct GlyphRun {
    /// Font the glyph ids refer to.
    pub font: Font,
    /// Size in pixels per em.
    pub font_size: f32,
    /// Positioned glyphs.
    pub glyphs: Vec<Glyph>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_font_data_is_rejected_locally() {
        let err = Font::new(Vec::<u8>::new(), 0).unwrap_err();
        assert_eq!(err, CanvasError::invalid("font data is empty"));
    }

    #[test]
    fn garbage_font_data_is_rejected() {
        let err = Font::new(b"definitely not a font file".to_vec(), 0).unwrap_err();
        assert!(
            matches!(err, CanvasError::InvalidParameter(_)),
            "unparseable bytes are an invalid parameter"
        );
    }
}
