// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Canvas reference backend.
//!
//! [`RefBackend`] implements [`CanvasBackend`] for **op and state tracing**.
//! It records every call the orchestration layer makes, together with the
//! drawing state and layer stack the backend sees at that moment.
//!
//! It is not a renderer:
//! - It does **not** rasterize. Rendering produces transparent pixels.
//! - Its prepared artifacts only count draws; they are not real strips.
//! - It exists for tests that assert on what reaches a backend and when.

#![no_std]

extern crate alloc;

use alloc::vec::Vec;

use understory_canvas::{
    CacheStats, CanvasBackend, CanvasError, CanvasOp, DrawingState, Layer, Pixmap,
    PreparedArtifacts, RenderMode, RenderSettings, Result, StateOp,
};

/// What the backend saw when an op arrived.
#[derive(Clone, Debug, PartialEq)]
pub struct StateSnapshot {
    /// Drawing state passed with the op.
    pub drawing: DrawingState,
    /// Open layers after the op.
    pub layer_depth: usize,
    /// The innermost open layer after the op, if any.
    pub layer_top: Option<Layer>,
}

/// A call recorded by [`RefBackend`].
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// An op, live or replayed from a recording.
    Op {
        /// The op.
        op: CanvasOp,
        /// Backend view after the op.
        state: StateSnapshot,
        /// `true` if the op was replayed through [`CanvasBackend::execute`].
        replayed: bool,
    },
    /// The backend state was overwritten.
    Sync(DrawingState),
    /// Content and layers were discarded.
    Reset,
    /// Pending work was resolved.
    Flush,
    /// Pixels were copied out.
    Render,
    /// A recording was prepared.
    Prepare {
        /// Number of ops in the recording.
        ops: usize,
    },
}

/// Artifacts produced by [`RefBackend::prepare`](CanvasBackend::prepare).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefPrepared {
    /// Draw ops in the prepared recording.
    pub draws: usize,
}

impl PreparedArtifacts for RefPrepared {
    fn stats(&self) -> CacheStats {
        CacheStats {
            has_cached_strips: self.draws > 0,
            strip_count: self.draws,
            alpha_count: 0,
        }
    }
}

/// Backend that logs [`Event`]s instead of rendering.
#[derive(Clone, Debug)]
pub struct RefBackend {
    width: u16,
    height: u16,
    settings: RenderSettings,
    events: Vec<Event>,
    drawing: DrawingState,
    layers: Vec<Layer>,
}

impl RefBackend {
    /// A backend reporting the given target size.
    pub fn new(width: u16, height: u16) -> Self {
        Self::with_settings(width, height, RenderSettings::default())
    }

    /// A backend reporting the given target size and settings.
    pub fn with_settings(width: u16, height: u16, settings: RenderSettings) -> Self {
        Self {
            width,
            height,
            settings,
            events: Vec::new(),
            drawing: DrawingState::default(),
            layers: Vec::new(),
        }
    }

    /// Recorded events, oldest first.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// The ops among the recorded events, oldest first.
    pub fn ops(&self) -> impl Iterator<Item = &CanvasOp> + '_ {
        self.events.iter().filter_map(|event| match event {
            Event::Op { op, .. } => Some(op),
            _ => None,
        })
    }

    /// Forget recorded events; state and layers are kept.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Open layers as the backend sees them.
    pub fn layer_depth(&self) -> usize {
        self.layers.len()
    }

    /// Drawing state as the backend sees it.
    pub fn drawing_state(&self) -> &DrawingState {
        &self.drawing
    }

    fn record(&mut self, op: &CanvasOp, state: &DrawingState, replayed: bool) -> Result<()> {
        match op {
            CanvasOp::State(StateOp::PushLayer(layer)) => self.layers.push(layer.clone()),
            CanvasOp::State(StateOp::PopLayer) => {
                self.layers.pop().ok_or(CanvasError::LayerStackEmpty)?;
            }
            _ => {}
        }
        self.drawing = state.clone();
        self.events.push(Event::Op {
            op: op.clone(),
            state: StateSnapshot {
                drawing: state.clone(),
                layer_depth: self.layers.len(),
                layer_top: self.layers.last().cloned(),
            },
            replayed,
        });
        Ok(())
    }
}

impl CanvasBackend for RefBackend {
    type Prepared = RefPrepared;

    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn render_settings(&self) -> RenderSettings {
        self.settings
    }

    fn apply(&mut self, op: &CanvasOp, state: &DrawingState) -> Result<()> {
        self.record(op, state, false)
    }

    fn sync_state(&mut self, state: &DrawingState) -> Result<()> {
        self.drawing = state.clone();
        self.events.push(Event::Sync(state.clone()));
        Ok(())
    }

    fn reset(&mut self) {
        self.layers.clear();
        self.events.push(Event::Reset);
    }

    fn flush(&mut self) -> Result<()> {
        self.events.push(Event::Flush);
        Ok(())
    }

    fn render_to_pixmap(&mut self, target: &mut Pixmap) -> Result<()> {
        target.resize(self.width, self.height);
        self.events.push(Event::Render);
        Ok(())
    }

    fn render_to_buffer(
        &mut self,
        buffer: &mut [u8],
        width: u16,
        height: u16,
        _mode: RenderMode,
    ) -> Result<()> {
        let len = usize::from(width) * usize::from(height) * 4;
        buffer[..len].fill(0);
        self.events.push(Event::Render);
        Ok(())
    }

    fn prepare(&mut self, ops: &[CanvasOp], _state: &DrawingState) -> Result<RefPrepared> {
        self.events.push(Event::Prepare { ops: ops.len() });
        Ok(RefPrepared {
            draws: ops
                .iter()
                .filter(|op| matches!(op, CanvasOp::Draw(_)))
                .count(),
        })
    }

    fn execute(
        &mut self,
        _prepared: &RefPrepared,
        ops: &[CanvasOp],
        state: &DrawingState,
    ) -> Result<()> {
        let depth = self.layers.len();
        let mut state = state.clone();
        let replayed = ops.iter().try_for_each(|op| {
            if let CanvasOp::State(state_op) = op {
                state.apply(state_op);
            }
            self.record(op, &state, true)
        });
        if replayed.is_err() {
            self.layers.truncate(depth);
        }
        replayed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use understory_canvas::kurbo::{Affine, Rect};
    use understory_canvas::{DrawOp, Surface};

    #[test]
    fn backend_tracks_layers_and_state_per_op() {
        let mut backend = RefBackend::new(16, 16);
        let mut state = DrawingState::default();
        state.transform = Affine::scale(2.0);
        backend
            .apply(&StateOp::SetTransform(state.transform).into(), &state)
            .unwrap();
        backend
            .apply(&StateOp::PushLayer(Layer::Opacity(0.25)).into(), &state)
            .unwrap();

        let Some(Event::Op { state: snap, .. }) = backend.events().last() else {
            panic!("expected an op event");
        };
        assert_eq!(snap.drawing.transform, Affine::scale(2.0));
        assert_eq!(snap.layer_depth, 1);
        assert_eq!(snap.layer_top, Some(Layer::Opacity(0.25)));
    }

    #[test]
    fn prepared_stats_count_draws() {
        let mut backend = RefBackend::new(4, 4);
        let rect = Rect::new(0.0, 0.0, 1.0, 1.0);
        let ops = [
            CanvasOp::Draw(DrawOp::FillRect(rect)),
            CanvasOp::State(StateOp::SetFillRule(understory_canvas::FillRule::EvenOdd)),
            CanvasOp::Draw(DrawOp::StrokeRect(rect)),
        ];
        let prepared = backend.prepare(&ops, &DrawingState::default()).unwrap();
        assert_eq!(prepared.stats().strip_count, 2);
        assert!(prepared.stats().has_cached_strips);
    }

    #[test]
    fn surface_creation_syncs_default_state() {
        let surface = Surface::new(RefBackend::new(8, 8)).unwrap();
        assert_eq!(
            surface.backend().events(),
            &[Event::Sync(DrawingState::default())]
        );
    }
}
