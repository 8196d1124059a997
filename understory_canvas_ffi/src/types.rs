// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Plain C structs and the raw enum encodings accepted at the boundary.

use kurbo::{Affine, Cap, Join, Point, Rect, Stroke};
use peniko::color::{PremulRgba8, Rgba8};
use peniko::{BlendMode, Compose, Extend, ImageQuality, Mix};
use understory_canvas::{
    CanvasError, ColorStop, FillRule, Glyph, MaskKind, RenderMode, RenderSettings, Result,
    SimdLevel,
};

/// `UcRenderSettings::level` value that asks for SIMD detection.
pub const UCANVAS_SIMD_DETECT: u8 = 0xFF;

/// An axis-aligned rectangle.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UcRect {
    /// Left edge.
    pub x0: f64,
    /// Top edge.
    pub y0: f64,
    /// Right edge.
    pub x1: f64,
    /// Bottom edge.
    pub y1: f64,
}

impl From<UcRect> for Rect {
    fn from(r: UcRect) -> Self {
        Self::new(r.x0, r.y0, r.x1, r.y1)
    }
}

/// An affine transform `[a b c d e f]`, mapping `(x, y)` to
/// `(a*x + c*y + e, b*x + d*y + f)`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UcAffine {
    /// Coefficient `a`.
    pub a: f64,
    /// Coefficient `b`.
    pub b: f64,
    /// Coefficient `c`.
    pub c: f64,
    /// Coefficient `d`.
    pub d: f64,
    /// Translation in x.
    pub e: f64,
    /// Translation in y.
    pub f: f64,
}

impl From<UcAffine> for Affine {
    fn from(t: UcAffine) -> Self {
        Self::new([t.a, t.b, t.c, t.d, t.e, t.f])
    }
}

impl From<Affine> for UcAffine {
    fn from(t: Affine) -> Self {
        let [a, b, c, d, e, f] = t.as_coeffs();
        Self { a, b, c, d, e, f }
    }
}

/// A straight-alpha RGBA8 color.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UcColor {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl From<UcColor> for Rgba8 {
    fn from(c: UcColor) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

impl From<Rgba8> for UcColor {
    fn from(c: Rgba8) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

/// A premultiplied RGBA8 pixel, laid out like the pixmap buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UcPremulRgba8 {
    /// Red, premultiplied.
    pub r: u8,
    /// Green, premultiplied.
    pub g: u8,
    /// Blue, premultiplied.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl From<PremulRgba8> for UcPremulRgba8 {
    fn from(p: PremulRgba8) -> Self {
        Self {
            r: p.r,
            g: p.g,
            b: p.b,
            a: p.a,
        }
    }
}

/// A gradient color stop.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UcColorStop {
    /// Position in `[0, 1]`.
    pub offset: f32,
    /// Color at this position.
    pub color: UcColor,
}

impl From<UcColorStop> for ColorStop {
    fn from(stop: UcColorStop) -> Self {
        Self::new(stop.offset, stop.color.into())
    }
}

/// Stroke style. Joins: bevel 0, miter 1, round 2. Caps: butt 0, square 1, round 2.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UcStroke {
    /// Line width.
    pub width: f64,
    /// Miter limit.
    pub miter_limit: f64,
    /// Join style.
    pub join: u8,
    /// Cap at the start of open subpaths.
    pub start_cap: u8,
    /// Cap at the end of open subpaths.
    pub end_cap: u8,
}

fn join(raw: u8) -> Result<Join> {
    match raw {
        0 => Ok(Join::Bevel),
        1 => Ok(Join::Miter),
        2 => Ok(Join::Round),
        _ => Err(unknown("join", raw)),
    }
}

fn cap(raw: u8) -> Result<Cap> {
    match raw {
        0 => Ok(Cap::Butt),
        1 => Ok(Cap::Square),
        2 => Ok(Cap::Round),
        _ => Err(unknown("cap", raw)),
    }
}

impl TryFrom<UcStroke> for Stroke {
    type Error = CanvasError;

    fn try_from(s: UcStroke) -> Result<Self> {
        let mut stroke = Self::new(s.width)
            .with_join(join(s.join)?)
            .with_miter_limit(s.miter_limit);
        stroke.start_cap = cap(s.start_cap)?;
        stroke.end_cap = cap(s.end_cap)?;
        Ok(stroke)
    }
}

impl From<&Stroke> for UcStroke {
    fn from(s: &Stroke) -> Self {
        let join = match s.join {
            Join::Bevel => 0,
            Join::Miter => 1,
            Join::Round => 2,
        };
        let cap = |c: Cap| match c {
            Cap::Butt => 0,
            Cap::Square => 1,
            Cap::Round => 2,
        };
        Self {
            width: s.width,
            miter_limit: s.miter_limit,
            join,
            start_cap: cap(s.start_cap),
            end_cap: cap(s.end_cap),
        }
    }
}

/// Surface creation settings. `level` is a [`SimdLevel`] value or
/// [`UCANVAS_SIMD_DETECT`]; `render_mode` is a [`RenderMode`] value.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UcRenderSettings {
    /// Requested SIMD level.
    pub level: u8,
    /// Worker threads per flush; `0` renders on the calling thread.
    pub num_threads: u16,
    /// Speed/quality trade-off.
    pub render_mode: u8,
}

impl TryFrom<UcRenderSettings> for RenderSettings {
    type Error = CanvasError;

    fn try_from(s: UcRenderSettings) -> Result<Self> {
        let level = match s.level {
            UCANVAS_SIMD_DETECT => None,
            raw => Some(SimdLevel::from_u8(raw).ok_or_else(|| unknown("SIMD level", raw))?),
        };
        Ok(Self {
            level,
            num_threads: s.num_threads,
            render_mode: render_mode(s.render_mode)?,
        })
    }
}

impl From<RenderSettings> for UcRenderSettings {
    fn from(s: RenderSettings) -> Self {
        Self {
            level: s.level.map_or(UCANVAS_SIMD_DETECT, |level| level as u8),
            num_threads: s.num_threads,
            render_mode: s.render_mode as u8,
        }
    }
}

/// A blend mode as raw [`Mix`] and [`Compose`] values.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UcBlendMode {
    /// Mix function, `Normal = 0` through `Luminosity = 15`.
    pub mix: u8,
    /// Porter-Duff operator, `Clear = 0` through `PlusLighter = 13`.
    pub compose: u8,
}

impl TryFrom<UcBlendMode> for BlendMode {
    type Error = CanvasError;

    fn try_from(b: UcBlendMode) -> Result<Self> {
        blend_mode(b.mix, b.compose)
    }
}

/// A positioned glyph.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UcGlyph {
    /// Glyph id within the font.
    pub id: u32,
    /// Horizontal position.
    pub x: f32,
    /// Vertical position (baseline).
    pub y: f32,
}

impl From<UcGlyph> for Glyph {
    fn from(g: UcGlyph) -> Self {
        Self {
            id: g.id,
            x: g.x,
            y: g.y,
        }
    }
}

impl From<Glyph> for UcGlyph {
    fn from(g: Glyph) -> Self {
        Self {
            id: g.id,
            x: g.x,
            y: g.y,
        }
    }
}

fn unknown(what: &str, raw: u8) -> CanvasError {
    CanvasError::InvalidParameter(format!("unknown {what} value {raw}"))
}

pub(crate) fn render_mode(raw: u8) -> Result<RenderMode> {
    RenderMode::from_u8(raw).ok_or_else(|| unknown("render mode", raw))
}

pub(crate) fn fill_rule(raw: u8) -> Result<FillRule> {
    match raw {
        0 => Ok(FillRule::NonZero),
        1 => Ok(FillRule::EvenOdd),
        _ => Err(unknown("fill rule", raw)),
    }
}

pub(crate) fn fill_rule_code(rule: FillRule) -> u8 {
    match rule {
        FillRule::NonZero => 0,
        FillRule::EvenOdd => 1,
    }
}

pub(crate) fn extend(raw: u8) -> Result<Extend> {
    match raw {
        0 => Ok(Extend::Pad),
        1 => Ok(Extend::Repeat),
        2 => Ok(Extend::Reflect),
        _ => Err(unknown("extend", raw)),
    }
}

pub(crate) fn image_quality(raw: u8) -> Result<ImageQuality> {
    match raw {
        0 => Ok(ImageQuality::Low),
        1 => Ok(ImageQuality::Medium),
        2 => Ok(ImageQuality::High),
        _ => Err(unknown("image quality", raw)),
    }
}

pub(crate) fn mask_kind(raw: u8) -> Result<MaskKind> {
    match raw {
        0 => Ok(MaskKind::Alpha),
        1 => Ok(MaskKind::Luminance),
        _ => Err(unknown("mask kind", raw)),
    }
}

/// Mix modes in `peniko` order, `Normal = 0` through `Luminosity = 15`.
const MIXES: [Mix; 16] = [
    Mix::Normal,
    Mix::Multiply,
    Mix::Screen,
    Mix::Overlay,
    Mix::Darken,
    Mix::Lighten,
    Mix::ColorDodge,
    Mix::ColorBurn,
    Mix::HardLight,
    Mix::SoftLight,
    Mix::Difference,
    Mix::Exclusion,
    Mix::Hue,
    Mix::Saturation,
    Mix::Color,
    Mix::Luminosity,
];

/// Porter-Duff operators in `peniko` order, `Clear = 0` through `PlusLighter = 13`.
const COMPOSES: [Compose; 14] = [
    Compose::Clear,
    Compose::Copy,
    Compose::Dest,
    Compose::SrcOver,
    Compose::DestOver,
    Compose::SrcIn,
    Compose::DestIn,
    Compose::SrcOut,
    Compose::DestOut,
    Compose::SrcAtop,
    Compose::DestAtop,
    Compose::Xor,
    Compose::Plus,
    Compose::PlusLighter,
];

pub(crate) fn blend_mode(mix: u8, compose: u8) -> Result<BlendMode> {
    let mix = *MIXES
        .get(usize::from(mix))
        .ok_or_else(|| unknown("mix", mix))?;
    let compose = *COMPOSES
        .get(usize::from(compose))
        .ok_or_else(|| unknown("compose", compose))?;
    Ok(BlendMode::new(mix, compose))
}

pub(crate) fn point(x: f64, y: f64) -> Point {
    Point::new(x, y)
}
