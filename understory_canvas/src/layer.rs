// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositing layers and the per-surface layer stack.

use alloc::vec::Vec;

use kurbo::BezPath;
use peniko::BlendMode;

use crate::op::{CanvasOp, StateOp};
use crate::pixmap::Mask;
use crate::{CanvasError, Result};

/// A layer combining any subset of clip, blend, opacity, and mask.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompositeLayer {
    /// Restrict drawing to this path, filled with the current fill rule.
    pub clip: Option<BezPath>,
    /// Blend the layer with its backdrop using this mode.
    pub blend: Option<BlendMode>,
    /// Scale the layer's alpha by this factor in `[0, 1]`.
    pub opacity: Option<f32>,
    /// Multiply the layer's alpha by this mask's coverage.
    pub mask: Option<Mask>,
}

/// A compositing scope pushed onto a surface.
#[derive(Clone, Debug, PartialEq)]
pub enum Layer {
    /// Restrict subsequent draws to the filled region of a path.
    Clip(BezPath),
    /// Scale the effective alpha of the layer contents.
    Opacity(f32),
    /// Combine the layer with its backdrop using a mix/compose pair.
    Blend(BlendMode),
    /// Multiply the layer's alpha by a mask.
    Mask(Mask),
    /// Any combination of the above.
    Composite(CompositeLayer),
}

impl Layer {
    /// Discriminant of this layer.
    pub const fn kind(&self) -> LayerKind {
        match self {
            Self::Clip(_) => LayerKind::Clip,
            Self::Opacity(_) => LayerKind::Opacity,
            Self::Blend(_) => LayerKind::Blend,
            Self::Mask(_) => LayerKind::Mask,
            Self::Composite(_) => LayerKind::Composite,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Self::Opacity(opacity) => check_opacity(*opacity),
            Self::Composite(CompositeLayer {
                opacity: Some(opacity),
                ..
            }) => check_opacity(*opacity),
            _ => Ok(()),
        }
    }
}

fn check_opacity(opacity: f32) -> Result<()> {
    if opacity.is_finite() && (0.0..=1.0).contains(&opacity) {
        Ok(())
    } else {
        Err(CanvasError::invalid("layer opacity must lie in [0, 1]"))
    }
}

/// Discriminant of a [`Layer`], as tracked by [`LayerStack`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// [`Layer::Clip`].
    Clip,
    /// [`Layer::Opacity`].
    Opacity,
    /// [`Layer::Blend`].
    Blend,
    /// [`Layer::Mask`].
    Mask,
    /// [`Layer::Composite`].
    Composite,
}

/// LIFO stack of open layers.
///
/// The stack only tracks what is open; the layer payloads live with the
/// backend that composites them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LayerStack {
    entries: Vec<LayerKind>,
}

impl LayerStack {
    /// An empty stack.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of open layers.
    #[inline]
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no layer is open.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recently pushed layer, if any.
    pub fn top(&self) -> Option<LayerKind> {
        self.entries.last().copied()
    }

    /// Record that a layer of `kind` was opened.
    pub fn push(&mut self, kind: LayerKind) {
        self.entries.push(kind);
    }

    /// Close the most recently opened layer.
    ///
    /// Fails with [`CanvasError::LayerStackEmpty`] at depth 0.
    pub fn pop(&mut self) -> Result<LayerKind> {
        self.entries.pop().ok_or(CanvasError::LayerStackEmpty)
    }

    /// Follow the layer effect of `op`, for canvases that store ops instead
    /// of rendering them.
    ///
    /// Pushes open a layer and pops close one; other ops leave the stack
    /// alone. A pop at depth 0 fails with [`CanvasError::LayerStackEmpty`]
    /// and changes nothing.
    pub fn track(&mut self, op: &CanvasOp) -> Result<()> {
        match op {
            CanvasOp::State(StateOp::PushLayer(layer)) => self.push(layer.kind()),
            CanvasOp::State(StateOp::PopLayer) => {
                self.pop()?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Drop every open layer.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Fail with [`CanvasError::UnbalancedLayers`] unless the stack is empty.
    pub fn ensure_balanced(&self) -> Result<()> {
        match self.depth() {
            0 => Ok(()),
            depth => Err(CanvasError::UnbalancedLayers { depth }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_on_empty_stack_fails() {
        let mut stack = LayerStack::new();
        assert_eq!(stack.pop(), Err(CanvasError::LayerStackEmpty));
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn n_pushes_need_n_pops() {
        let mut stack = LayerStack::new();
        let kinds = [
            LayerKind::Clip,
            LayerKind::Opacity,
            LayerKind::Blend,
            LayerKind::Mask,
            LayerKind::Composite,
        ];
        for kind in kinds {
            stack.push(kind);
        }
        assert_eq!(stack.depth(), kinds.len());
        assert_eq!(
            stack.ensure_balanced(),
            Err(CanvasError::UnbalancedLayers { depth: 5 })
        );
        for kind in kinds.iter().rev() {
            assert_eq!(stack.pop(), Ok(*kind), "pop returns the latest push");
        }
        assert!(stack.is_empty());
        assert_eq!(stack.ensure_balanced(), Ok(()));
        assert_eq!(stack.pop(), Err(CanvasError::LayerStackEmpty));
    }

    #[test]
    fn opacity_is_range_checked() {
        assert!(Layer::Opacity(0.0).validate().is_ok());
        assert!(Layer::Opacity(1.0).validate().is_ok());
        assert!(Layer::Opacity(-0.1).validate().is_err());
        assert!(Layer::Opacity(f32::NAN).validate().is_err());
        let composite = CompositeLayer {
            opacity: Some(2.0),
            ..CompositeLayer::default()
        };
        assert!(Layer::Composite(composite).validate().is_err());
    }

    #[test]
    fn tracking_follows_pushes_and_pops() {
        let mut stack = LayerStack::new();
        let ops: [CanvasOp; 3] = [
            StateOp::PushLayer(Layer::Opacity(0.5)).into(),
            StateOp::SetFillRule(crate::FillRule::EvenOdd).into(),
            StateOp::PushLayer(Layer::Blend(BlendMode::default())).into(),
        ];
        for op in &ops {
            stack.track(op).unwrap();
        }
        assert_eq!(stack.top(), Some(LayerKind::Blend));
        assert_eq!(stack.depth(), 2);

        let pop = CanvasOp::from(StateOp::PopLayer);
        stack.track(&pop).unwrap();
        stack.track(&pop).unwrap();
        assert_eq!(stack.track(&pop), Err(CanvasError::LayerStackEmpty));
        assert!(stack.is_empty());
    }
}
