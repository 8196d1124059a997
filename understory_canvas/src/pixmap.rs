// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel buffers and the read-only views derived from them.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use peniko::color::{PremulRgba8, Rgba8};
use peniko::{Extend, ImageQuality};

use crate::{CanvasError, Result};

const TRANSPARENT: PremulRgba8 = PremulRgba8 {
    r: 0,
    g: 0,
    b: 0,
    a: 0,
};

/// A row-major buffer of premultiplied RGBA8 pixels.
///
/// The buffer always holds exactly `width * height` pixels (4 bytes each).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pixmap {
    width: u16,
    height: u16,
    data: Vec<PremulRgba8>,
}

impl Pixmap {
    /// Create a transparent pixmap.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            data: vec![TRANSPARENT; usize::from(width) * usize::from(height)],
        }
    }

    /// Wrap existing premultiplied pixels.
    ///
    /// Fails with [`CanvasError::InvalidParameter`] if `data` does not hold
    /// exactly `width * height` pixels.
    pub fn from_parts(data: Vec<PremulRgba8>, width: u16, height: u16) -> Result<Self> {
        let expected = usize::from(width) * usize::from(height);
        if data.len() != expected {
            return Err(CanvasError::InvalidParameter(alloc::format!(
                "pixmap of {width}x{height} needs {expected} pixels, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// `true` if the pixmap has no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The pixels, row-major.
    #[inline]
    pub fn data(&self) -> &[PremulRgba8] {
        &self.data
    }

    /// Mutable access to the pixels, row-major.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [PremulRgba8] {
        &mut self.data
    }

    /// Change the dimensions in place. All pixels become transparent.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data
            .resize(usize::from(width) * usize::from(height), TRANSPARENT);
    }

    /// Read a single pixel.
    pub fn sample(&self, x: u16, y: u16) -> Result<PremulRgba8> {
        if x >= self.width || y >= self.height {
            return Err(CanvasError::InvalidParameter(alloc::format!(
                "pixel ({x}, {y}) outside {}x{} pixmap",
                self.width,
                self.height
            )));
        }
        Ok(self.data[usize::from(y) * usize::from(self.width) + usize::from(x)])
    }

    /// Consume the pixmap and return straight-alpha pixels.
    pub fn take_unpremultiplied(self) -> Vec<Rgba8> {
        self.data.into_iter().map(unpremultiply).collect()
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "channels are clamped to 255 before casting"
)]
pub(crate) fn unpremultiply(p: PremulRgba8) -> Rgba8 {
    if p.a == 0 {
        return Rgba8 {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        };
    }
    let a = u16::from(p.a);
    let channel = |c: u8| ((u16::from(c) * 255 + a / 2) / a).min(255) as u8;
    Rgba8 {
        r: channel(p.r),
        g: channel(p.g),
        b: channel(p.b),
        a: p.a,
    }
}

/// How a [`Mask`] derives coverage from its source pixmap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MaskKind {
    /// Coverage is the pixel's alpha.
    Alpha = 0,
    /// Coverage is the Rec. 709 luminance of the premultiplied color.
    Luminance = 1,
}

/// A read-only coverage map derived from a pixmap.
///
/// Cloning is cheap: the coverage bytes are shared.
#[derive(Clone, Debug)]
pub struct Mask {
    kind: MaskKind,
    width: u16,
    height: u16,
    coverage: Arc<[u8]>,
}

impl Mask {
    /// Derive a mask of `kind` from `pixmap`.
    ///
    /// Fails with [`CanvasError::InvalidParameter`] for an empty pixmap.
    pub fn new(pixmap: &Pixmap, kind: MaskKind) -> Result<Self> {
        if pixmap.is_empty() {
            return Err(CanvasError::invalid("mask source pixmap is empty"));
        }
        let coverage: Arc<[u8]> = match kind {
            MaskKind::Alpha => pixmap.data().iter().map(|p| p.a).collect(),
            MaskKind::Luminance => pixmap.data().iter().map(|p| luminance(*p)).collect(),
        };
        Ok(Self {
            kind,
            width: pixmap.width(),
            height: pixmap.height(),
            coverage,
        })
    }

    /// Alpha-channel mask of `pixmap`.
    pub fn new_alpha(pixmap: &Pixmap) -> Result<Self> {
        Self::new(pixmap, MaskKind::Alpha)
    }

    /// Luminance mask of `pixmap`.
    pub fn new_luminance(pixmap: &Pixmap) -> Result<Self> {
        Self::new(pixmap, MaskKind::Luminance)
    }

    /// How coverage was derived.
    pub fn kind(&self) -> MaskKind {
        self.kind
    }

    /// Width in pixels.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// One coverage byte per pixel, row-major.
    pub fn coverage(&self) -> &[u8] {
        &self.coverage
    }
}

impl PartialEq for Mask {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.width == other.width
            && self.height == other.height
            && (Arc::ptr_eq(&self.coverage, &other.coverage) || self.coverage == other.coverage)
    }
}

/// Rec. 709 luma of a premultiplied pixel, rounded the way `vello_cpu`
/// rounds its own luminance masks.
#[allow(
    clippy::cast_possible_truncation,
    reason = "the weights sum to 1 so the value stays within a byte"
)]
fn luminance(p: PremulRgba8) -> u8 {
    let channel = |v: u8| f32::from(v) / 255.0;
    let luma = 0.2126 * channel(p.r) + 0.7152 * channel(p.g) + 0.0722 * channel(p.b);
    (luma * 255.0 + 0.5) as u8
}

/// A pixmap used as a paint source.
#[derive(Clone, Debug)]
pub struct Image {
    /// Source pixels.
    pub pixmap: Arc<Pixmap>,
    /// Horizontal extend behavior.
    pub x_extend: Extend,
    /// Vertical extend behavior.
    pub y_extend: Extend,
    /// Sampling quality.
    pub quality: ImageQuality,
    /// Global alpha multiplier in `[0, 1]`.
    pub alpha: f32,
}

impl Image {
    /// Create a validated image paint.
    pub fn new(
        pixmap: impl Into<Arc<Pixmap>>,
        x_extend: Extend,
        y_extend: Extend,
        quality: ImageQuality,
        alpha: f32,
    ) -> Result<Self> {
        let image = Self {
            pixmap: pixmap.into(),
            x_extend,
            y_extend,
            quality,
            alpha,
        };
        image.validate()?;
        Ok(image)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.pixmap.is_empty() {
            return Err(CanvasError::invalid("image pixmap is empty"));
        }
        if !self.alpha.is_finite() || !(0.0..=1.0).contains(&self.alpha) {
            return Err(CanvasError::invalid("image alpha must lie in [0, 1]"));
        }
        Ok(())
    }
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.pixmap, &other.pixmap) || self.pixmap == other.pixmap)
            && self.x_extend == other.x_extend
            && self.y_extend == other.y_extend
            && self.quality == other.quality
            && self.alpha == other.alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn premul(r: u8, g: u8, b: u8, a: u8) -> PremulRgba8 {
        PremulRgba8 { r, g, b, a }
    }

    #[test]
    fn new_pixmap_is_transparent() {
        let pixmap = Pixmap::new(3, 2);
        assert_eq!(pixmap.data().len(), 6);
        assert!(pixmap.data().iter().all(|p| *p == TRANSPARENT));
    }

    #[test]
    fn from_parts_checks_length() {
        assert!(Pixmap::from_parts(vec![TRANSPARENT; 5], 3, 2).is_err());
        assert!(Pixmap::from_parts(vec![TRANSPARENT; 6], 3, 2).is_ok());
    }

    #[test]
    fn sample_is_bounds_checked() {
        let mut pixmap = Pixmap::new(4, 4);
        pixmap.data_mut()[2 * 4 + 1] = premul(1, 2, 3, 4);
        assert_eq!(pixmap.sample(1, 2).unwrap(), premul(1, 2, 3, 4));
        assert!(pixmap.sample(4, 0).is_err());
        assert!(pixmap.sample(0, 4).is_err());
    }

    #[test]
    fn resize_clears_and_reshapes() {
        let mut pixmap = Pixmap::new(2, 2);
        pixmap.data_mut().fill(premul(9, 9, 9, 9));
        pixmap.resize(3, 1);
        assert_eq!((pixmap.width(), pixmap.height()), (3, 1));
        assert_eq!(pixmap.data(), &[TRANSPARENT; 3]);
    }

    #[test]
    fn unpremultiply_restores_straight_alpha() {
        assert_eq!(
            unpremultiply(premul(128, 0, 64, 128)),
            Rgba8 {
                r: 255,
                g: 0,
                b: 128,
                a: 128
            }
        );
        assert_eq!(
            unpremultiply(premul(10, 20, 30, 0)),
            Rgba8 {
                r: 0,
                g: 0,
                b: 0,
                a: 0
            }
        );
        let opaque = premul(12, 34, 56, 255);
        assert_eq!(
            unpremultiply(opaque),
            Rgba8 {
                r: 12,
                g: 34,
                b: 56,
                a: 255
            }
        );
    }

    #[test]
    fn mask_coverage_by_kind() {
        let pixmap = Pixmap::from_parts(
            vec![
                premul(255, 255, 255, 255),
                premul(0, 0, 0, 255),
                premul(0, 0, 0, 0),
                premul(0, 128, 0, 128),
            ],
            2,
            2,
        )
        .unwrap();

        let alpha = Mask::new_alpha(&pixmap).unwrap();
        assert_eq!(alpha.coverage(), &[255, 255, 0, 128]);

        let luma = Mask::new_luminance(&pixmap).unwrap();
        assert_eq!(luma.coverage()[0], 255, "white is full coverage");
        assert_eq!(luma.coverage()[1], 0, "opaque black is no coverage");
        assert_eq!(luma.coverage()[2], 0);
        assert_eq!(luma.coverage()[3], 92, "green weighted by 0.7152");
        assert_eq!((luma.width(), luma.height()), (2, 2));
    }

    #[test]
    fn mask_rejects_empty_pixmap() {
        assert!(Mask::new_alpha(&Pixmap::new(0, 4)).is_err());
    }

    #[test]
    fn image_validates_alpha_and_source() {
        let pixmap = Arc::new(Pixmap::new(2, 2));
        let ok = Image::new(
            pixmap.clone(),
            Extend::Repeat,
            Extend::Pad,
            ImageQuality::Low,
            0.5,
        );
        assert!(ok.is_ok());
        assert!(
            Image::new(
                pixmap,
                Extend::Pad,
                Extend::Pad,
                ImageQuality::Low,
                1.5
            )
            .is_err()
        );
        assert!(
            Image::new(
                Pixmap::new(0, 0),
                Extend::Pad,
                Extend::Pad,
                ImageQuality::Low,
                1.0
            )
            .is_err()
        );
    }
}
