// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paint sources: solid colors, gradients, and images.

use alloc::vec::Vec;

use kurbo::Point;
use peniko::Extend;
use peniko::color::Rgba8;

use crate::pixmap::Image;
use crate::{CanvasError, Result};

/// A gradient color stop.
///
/// Stops do not need to be sorted; ordering is left to the backend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorStop {
    /// Position along the gradient in `[0, 1]`.
    pub offset: f32,
    /// Straight-alpha color at this position.
    pub color: Rgba8,
}

impl ColorStop {
    /// Create a stop at `offset` with `color`.
    pub const fn new(offset: f32, color: Rgba8) -> Self {
        Self { offset, color }
    }
}

/// Linear gradient from `start` to `end`.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearGradient {
    /// Position of offset 0.
    pub start: Point,
    /// Position of offset 1.
    pub end: Point,
    /// Color stops, at least two.
    pub stops: Vec<ColorStop>,
    /// Behavior outside `[start, end]`.
    pub extend: Extend,
}

impl LinearGradient {
    /// Create a validated linear gradient.
    pub fn new(
        start: Point,
        end: Point,
        stops: impl Into<Vec<ColorStop>>,
        extend: Extend,
    ) -> Result<Self> {
        let gradient = Self {
            start,
            end,
            stops: stops.into(),
            extend,
        };
        gradient.validate()?;
        Ok(gradient)
    }

    fn validate(&self) -> Result<()> {
        check_point(self.start, "gradient start")?;
        check_point(self.end, "gradient end")?;
        check_stops(&self.stops)
    }
}

/// Radial gradient centered on `center`.
#[derive(Clone, Debug, PartialEq)]
pub struct RadialGradient {
    /// Center of the gradient.
    pub center: Point,
    /// Radius of offset 1.
    pub radius: f32,
    /// Color stops, at least two.
    pub stops: Vec<ColorStop>,
    /// Behavior outside the radius.
    pub extend: Extend,
}

impl RadialGradient {
    /// Create a validated radial gradient.
    pub fn new(
        center: Point,
        radius: f32,
        stops: impl Into<Vec<ColorStop>>,
        extend: Extend,
    ) -> Result<Self> {
        let gradient = Self {
            center,
            radius,
            stops: stops.into(),
            extend,
        };
        gradient.validate()?;
        Ok(gradient)
    }

    fn validate(&self) -> Result<()> {
        check_point(self.center, "gradient center")?;
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(CanvasError::invalid(
                "gradient radius must be finite and non-negative",
            ));
        }
        check_stops(&self.stops)
    }
}

/// Sweep (conic) gradient around `center`.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepGradient {
    /// Center of rotation.
    pub center: Point,
    /// Angle of offset 0, in radians.
    pub start_angle: f32,
    /// Angle of offset 1, in radians.
    pub end_angle: f32,
    /// Color stops, at least two.
    pub stops: Vec<ColorStop>,
    /// Behavior outside `[start_angle, end_angle]`.
    pub extend: Extend,
}

impl SweepGradient {
    /// Create a validated sweep gradient.
    pub fn new(
        center: Point,
        start_angle: f32,
        end_angle: f32,
        stops: impl Into<Vec<ColorStop>>,
        extend: Extend,
    ) -> Result<Self> {
        let gradient = Self {
            center,
            start_angle,
            end_angle,
            stops: stops.into(),
            extend,
        };
        gradient.validate()?;
        Ok(gradient)
    }

    fn validate(&self) -> Result<()> {
        check_point(self.center, "gradient center")?;
        if !self.start_angle.is_finite() || !self.end_angle.is_finite() {
            return Err(CanvasError::invalid("sweep angles must be finite"));
        }
        check_stops(&self.stops)
    }
}

/// Discriminant of a [`Paint`], as reported by paint-kind getters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PaintKind {
    /// [`Paint::Solid`].
    Solid = 0,
    /// [`Paint::LinearGradient`].
    LinearGradient = 1,
    /// [`Paint::RadialGradient`].
    RadialGradient = 2,
    /// [`Paint::SweepGradient`].
    SweepGradient = 3,
    /// [`Paint::Image`].
    Image = 4,
}

/// The current fill/stroke source.
#[derive(Clone, Debug, PartialEq)]
pub enum Paint {
    /// A single straight-alpha color.
    Solid(Rgba8),
    /// A linear gradient.
    LinearGradient(LinearGradient),
    /// A radial gradient.
    RadialGradient(RadialGradient),
    /// A sweep gradient.
    SweepGradient(SweepGradient),
    /// An image pattern.
    Image(Image),
}

impl Default for Paint {
    fn default() -> Self {
        Self::Solid(Rgba8 {
            r: 0,
            g: 0,
            b: 0,
            a: 255,
        })
    }
}

impl Paint {
    /// Discriminant of this paint.
    pub const fn kind(&self) -> PaintKind {
        match self {
            Self::Solid(_) => PaintKind::Solid,
            Self::LinearGradient(_) => PaintKind::LinearGradient,
            Self::RadialGradient(_) => PaintKind::RadialGradient,
            Self::SweepGradient(_) => PaintKind::SweepGradient,
            Self::Image(_) => PaintKind::Image,
        }
    }

    /// Check the invariants of the paint payload.
    ///
    /// Public fields can be mutated after construction, so [`Canvas::set_paint`]
    /// re-validates before submitting.
    ///
    /// [`Canvas::set_paint`]: crate::Canvas::set_paint
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Solid(_) => Ok(()),
            Self::LinearGradient(g) => g.validate(),
            Self::RadialGradient(g) => g.validate(),
            Self::SweepGradient(g) => g.validate(),
            Self::Image(image) => image.validate(),
        }
    }
}

impl From<Rgba8> for Paint {
    fn from(color: Rgba8) -> Self {
        Self::Solid(color)
    }
}

impl From<LinearGradient> for Paint {
    fn from(gradient: LinearGradient) -> Self {
        Self::LinearGradient(gradient)
    }
}

impl From<RadialGradient> for Paint {
    fn from(gradient: RadialGradient) -> Self {
        Self::RadialGradient(gradient)
    }
}

impl From<SweepGradient> for Paint {
    fn from(gradient: SweepGradient) -> Self {
        Self::SweepGradient(gradient)
    }
}

impl From<Image> for Paint {
    fn from(image: Image) -> Self {
        Self::Image(image)
    }
}

fn check_point(p: Point, what: &str) -> Result<()> {
    if p.x.is_finite() && p.y.is_finite() {
        Ok(())
    } else {
        Err(CanvasError::InvalidParameter(alloc::format!(
            "{what} must be finite"
        )))
    }
}

fn check_stops(stops: &[ColorStop]) -> Result<()> {
    if stops.len() < 2 {
        return Err(CanvasError::invalid(
            "gradient requires at least two color stops",
        ));
    }
    if stops
        .iter()
        .any(|s| !s.offset.is_finite() || !(0.0..=1.0).contains(&s.offset))
    {
        return Err(CanvasError::invalid(
            "gradient stop offsets must lie in [0, 1]",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    const RED: Rgba8 = Rgba8 {
        r: 255,
        g: 0,
        b: 0,
        a: 255,
    };
    const BLUE: Rgba8 = Rgba8 {
        r: 0,
        g: 0,
        b: 255,
        a: 255,
    };

    #[test]
    fn default_paint_is_opaque_black() {
        let paint = Paint::default();
        assert_eq!(paint.kind(), PaintKind::Solid);
        assert_eq!(
            paint,
            Paint::Solid(Rgba8 {
                r: 0,
                g: 0,
                b: 0,
                a: 255
            })
        );
    }

    #[test]
    fn gradients_need_two_stops() {
        let one = vec![ColorStop::new(0.0, RED)];
        let err = LinearGradient::new(Point::ZERO, Point::new(10.0, 0.0), one, Extend::Pad)
            .unwrap_err();
        assert!(
            matches!(err, CanvasError::InvalidParameter(_)),
            "single stop rejected"
        );

        let empty: Vec<ColorStop> = Vec::new();
        assert!(RadialGradient::new(Point::ZERO, 4.0, empty, Extend::Pad).is_err());
    }

    #[test]
    fn unsorted_stops_are_accepted() {
        let stops = vec![ColorStop::new(1.0, BLUE), ColorStop::new(0.0, RED)];
        let gradient =
            SweepGradient::new(Point::new(8.0, 8.0), 0.0, 3.0, stops, Extend::Repeat).unwrap();
        assert_eq!(Paint::from(gradient).kind(), PaintKind::SweepGradient);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let bad_offset = vec![ColorStop::new(0.0, RED), ColorStop::new(1.5, BLUE)];
        assert!(
            LinearGradient::new(Point::ZERO, Point::new(1.0, 0.0), bad_offset, Extend::Pad)
                .is_err()
        );
        let nan_offset = vec![ColorStop::new(f32::NAN, RED), ColorStop::new(1.0, BLUE)];
        assert!(
            LinearGradient::new(Point::ZERO, Point::new(1.0, 0.0), nan_offset, Extend::Pad)
                .is_err()
        );
        let stops = vec![ColorStop::new(0.0, RED), ColorStop::new(1.0, BLUE)];
        assert!(RadialGradient::new(Point::ZERO, -1.0, stops.clone(), Extend::Pad).is_err());
        assert!(
            LinearGradient::new(Point::new(f64::NAN, 0.0), Point::ZERO, stops, Extend::Pad)
                .is_err()
        );
    }

    #[test]
    fn validate_catches_mutation_after_construction() {
        let stops = vec![ColorStop::new(0.0, RED), ColorStop::new(1.0, BLUE)];
        let mut gradient =
            LinearGradient::new(Point::ZERO, Point::new(1.0, 0.0), stops, Extend::Pad).unwrap();
        gradient.stops.truncate(1);
        assert!(Paint::LinearGradient(gradient).validate().is_err());
    }
}
