// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-surface drawing state.

use kurbo::{Affine, Stroke};

use crate::op::StateOp;
use crate::paint::Paint;

pub use peniko::Fill as FillRule;

/// Everything a draw consults besides the layer stack.
///
/// State survives `flush` and `reset`; it does not survive surface
/// re-creation.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawingState {
    /// Current paint; defaults to opaque black.
    pub paint: Paint,
    /// Current stroke style; defaults to a 1px stroke.
    pub stroke: Stroke,
    /// Geometry transform.
    pub transform: Affine,
    /// Transform applied to paint space only.
    pub paint_transform: Affine,
    /// Interior test for fills and clips.
    pub fill_rule: FillRule,
    /// Anti-aliasing threshold; `None` uses the backend default.
    pub aliasing_threshold: Option<u8>,
}

impl Default for DrawingState {
    fn default() -> Self {
        Self {
            paint: Paint::default(),
            stroke: Stroke::new(1.0),
            transform: Affine::IDENTITY,
            paint_transform: Affine::IDENTITY,
            fill_rule: FillRule::NonZero,
            aliasing_threshold: None,
        }
    }
}

impl DrawingState {
    /// Fold a state operation into this state.
    ///
    /// Layer operations leave the drawing state untouched.
    pub fn apply(&mut self, op: &StateOp) {
        match op {
            StateOp::SetPaint(paint) => self.paint = paint.clone(),
            StateOp::SetStroke(stroke) => self.stroke = stroke.clone(),
            StateOp::SetTransform(xf) => self.transform = *xf,
            StateOp::SetPaintTransform(xf) => self.paint_transform = *xf,
            StateOp::SetFillRule(rule) => self.fill_rule = *rule,
            StateOp::SetAliasingThreshold(threshold) => self.aliasing_threshold = *threshold,
            StateOp::PushLayer(_) | StateOp::PopLayer => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;
    use peniko::color::Rgba8;

    #[test]
    fn apply_folds_each_setter() {
        let mut state = DrawingState::default();
        let magenta = Rgba8 {
            r: 255,
            g: 0,
            b: 255,
            a: 255,
        };
        state.apply(&StateOp::SetPaint(Paint::Solid(magenta)));
        state.apply(&StateOp::SetStroke(Stroke::new(4.0)));
        state.apply(&StateOp::SetTransform(Affine::translate((3.0, 4.0))));
        state.apply(&StateOp::SetPaintTransform(Affine::scale(2.0)));
        state.apply(&StateOp::SetFillRule(FillRule::EvenOdd));
        state.apply(&StateOp::SetAliasingThreshold(Some(128)));

        assert_eq!(state.paint, Paint::Solid(magenta));
        assert_eq!(state.stroke.width, 4.0);
        assert_eq!(state.transform, Affine::translate((3.0, 4.0)));
        assert_eq!(state.paint_transform, Affine::scale(2.0));
        assert_eq!(state.fill_rule, FillRule::EvenOdd);
        assert_eq!(state.aliasing_threshold, Some(128));
    }

    #[test]
    fn layer_ops_do_not_touch_state() {
        let mut state = DrawingState::default();
        state.apply(&StateOp::PushLayer(Layer::Opacity(0.5)));
        state.apply(&StateOp::PopLayer);
        assert_eq!(state, DrawingState::default());
    }
}
