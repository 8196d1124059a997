// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The primitive vocabulary shared by live surfaces and recordings.

use kurbo::{Affine, BezPath, Rect, Stroke};

use crate::font::GlyphRun;
use crate::layer::Layer;
use crate::paint::Paint;
use crate::state::FillRule;

/// Operations that change drawing state or the layer stack.
#[derive(Clone, Debug, PartialEq)]
pub enum StateOp {
    /// Replace the current paint.
    SetPaint(Paint),
    /// Replace the current stroke style.
    SetStroke(Stroke),
    /// Replace the geometry transform.
    SetTransform(Affine),
    /// Replace the paint-space transform.
    SetPaintTransform(Affine),
    /// Replace the fill rule.
    SetFillRule(FillRule),
    /// Replace the anti-aliasing threshold; `None` restores the default.
    SetAliasingThreshold(Option<u8>),
    /// Open a compositing layer.
    PushLayer(Layer),
    /// Close the most recently opened layer.
    PopLayer,
}

/// Operations that produce pixels.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    /// Fill a rectangle.
    FillRect(Rect),
    /// Stroke a rectangle's outline.
    StrokeRect(Rect),
    /// Fill a rounded rectangle blurred by a Gaussian.
    FillBlurredRoundedRect {
        /// Rectangle before blurring.
        rect: Rect,
        /// Corner radius.
        radius: f32,
        /// Standard deviation of the blur.
        std_dev: f32,
    },
    /// Fill a path with the current fill rule.
    FillPath(BezPath),
    /// Stroke a path.
    StrokePath(BezPath),
    /// Fill a glyph run.
    FillGlyphs(GlyphRun),
    /// Stroke a glyph run.
    StrokeGlyphs(GlyphRun),
}

/// A single state or draw operation.
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasOp {
    /// A state or layer change.
    State(StateOp),
    /// A draw.
    Draw(DrawOp),
}

impl From<StateOp> for CanvasOp {
    fn from(op: StateOp) -> Self {
        Self::State(op)
    }
}

impl From<DrawOp> for CanvasOp {
    fn from(op: DrawOp) -> Self {
        Self::Draw(op)
    }
}
