// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Live drawing surfaces.

use kurbo::{Affine, Stroke};

use crate::backend::{CacheStats, CanvasBackend, PreparedArtifacts};
use crate::canvas::Canvas;
use crate::layer::LayerStack;
use crate::op::{CanvasOp, StateOp};
use crate::paint::{Paint, PaintKind};
use crate::pixmap::Pixmap;
use crate::recording::Recording;
use crate::settings::{RenderMode, RenderSettings};
use crate::state::{DrawingState, FillRule};
use crate::{CanvasError, Result};

/// A drawing surface: drawing state and layer stack in front of a backend.
///
/// Every op passes through [`Canvas::submit`], which commits it to the
/// state machine only after the backend accepted it.
#[derive(Debug)]
pub struct Surface<B> {
    backend: B,
    state: DrawingState,
    layers: LayerStack,
}

impl<B: CanvasBackend> Surface<B> {
    /// Wrap `backend` with default drawing state and an empty layer stack.
    pub fn new(mut backend: B) -> Result<Self> {
        let state = DrawingState::default();
        backend.sync_state(&state)?;
        tracing::debug!(
            width = backend.width(),
            height = backend.height(),
            "surface created"
        );
        Ok(Self {
            backend,
            state,
            layers: LayerStack::new(),
        })
    }

    /// The backend this surface drives.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend.
    ///
    /// Calls made through this reference bypass the surface's state and
    /// layer tracking.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Width in pixels.
    pub fn width(&self) -> u16 {
        self.backend.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u16 {
        self.backend.height()
    }

    /// Settings the surface was created with.
    pub fn render_settings(&self) -> RenderSettings {
        self.backend.render_settings()
    }

    /// The full drawing state.
    pub fn state(&self) -> &DrawingState {
        &self.state
    }

    /// Current paint.
    pub fn paint(&self) -> &Paint {
        &self.state.paint
    }

    /// Discriminant of the current paint.
    pub fn paint_kind(&self) -> PaintKind {
        self.state.paint.kind()
    }

    /// Current stroke style.
    pub fn stroke(&self) -> &Stroke {
        &self.state.stroke
    }

    /// Current geometry transform.
    pub fn transform(&self) -> Affine {
        self.state.transform
    }

    /// Current paint-space transform.
    pub fn paint_transform(&self) -> Affine {
        self.state.paint_transform
    }

    /// Current fill rule.
    pub fn fill_rule(&self) -> FillRule {
        self.state.fill_rule
    }

    /// Current anti-aliasing threshold.
    pub fn aliasing_threshold(&self) -> Option<u8> {
        self.state.aliasing_threshold
    }

    /// Number of open layers.
    pub fn layer_depth(&self) -> usize {
        self.layers.depth()
    }

    /// Clear accumulated content and close every layer.
    ///
    /// The drawing state is kept and re-applied to the backend.
    pub fn reset(&mut self) -> Result<()> {
        self.backend.reset();
        self.layers.clear();
        self.backend.sync_state(&self.state)?;
        tracing::debug!("surface reset");
        Ok(())
    }

    /// Resolve pending work. Fails if layers are still open.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_balanced("flush")?;
        self.backend.flush()
    }

    /// Copy the rendered pixels into `target`.
    ///
    /// `target` must have the surface's dimensions and no layer may be open.
    pub fn render_to_pixmap(&mut self, target: &mut Pixmap) -> Result<()> {
        self.ensure_balanced("render_to_pixmap")?;
        if (target.width(), target.height()) != (self.width(), self.height()) {
            return Err(CanvasError::InvalidParameter(alloc::format!(
                "target pixmap is {}x{}, surface is {}x{}",
                target.width(),
                target.height(),
                self.width(),
                self.height()
            )));
        }
        self.backend.render_to_pixmap(target)
    }

    /// Copy the rendered pixels into `buffer` as premultiplied RGBA8.
    ///
    /// `width` and `height` must match the surface and `buffer` must hold at
    /// least `width * height * 4` bytes.
    pub fn render_to_buffer(
        &mut self,
        buffer: &mut [u8],
        width: u16,
        height: u16,
        mode: RenderMode,
    ) -> Result<()> {
        self.ensure_balanced("render_to_buffer")?;
        if (width, height) != (self.width(), self.height()) {
            return Err(CanvasError::InvalidParameter(alloc::format!(
                "buffer is described as {width}x{height}, surface is {}x{}",
                self.width(),
                self.height()
            )));
        }
        let needed = usize::from(width) * usize::from(height) * 4;
        if buffer.len() < needed {
            return Err(CanvasError::InvalidParameter(alloc::format!(
                "buffer holds {} bytes, {needed} needed",
                buffer.len()
            )));
        }
        self.backend.render_to_buffer(buffer, width, height, mode)
    }

    /// Derive cacheable artifacts for `recording` under the current drawing state.
    ///
    /// Idempotent: a recording already prepared for an equal state is left
    /// untouched, and the recorded ops are never modified.
    pub fn prepare(&mut self, recording: &mut Recording<B::Prepared>) -> Result<()> {
        if recording.is_empty() || recording.prepared_for(&self.state).is_some() {
            return Ok(());
        }
        let prepared = self.backend.prepare(recording.ops(), &self.state);
        self.backend.sync_state(&self.state)?;
        let prepared = prepared?;
        let CacheStats {
            strip_count,
            alpha_count,
            ..
        } = prepared.stats();
        tracing::debug!(
            ops = recording.len(),
            strip_count,
            alpha_count,
            "recording prepared"
        );
        recording.insert_prepared(self.state.clone(), prepared);
        Ok(())
    }

    /// Replay `recording` into the current drawing state and layer stack.
    ///
    /// Uses the artifacts prepared for the current state when there are
    /// any, and otherwise submits the recorded ops one by one. Either way
    /// the recording's state changes carry over to the surface, exactly as
    /// if they had been issued directly.
    ///
    /// On failure the surface is left as it was before the call: layers the
    /// recording opened are closed and the drawing state is restored.
    /// Content drawn before the failing op stays.
    pub fn execute(&mut self, recording: &Recording<B::Prepared>) -> Result<()> {
        let depth = self.layers.depth();
        let saved = self.state.clone();
        let executed = match recording.prepared_for(&self.state) {
            Some(prepared) => {
                let executed = self
                    .backend
                    .execute(prepared, recording.ops(), &self.state);
                if executed.is_ok() {
                    for op in recording.ops() {
                        if let CanvasOp::State(op) = op {
                            self.state.apply(op);
                        }
                    }
                }
                executed
            }
            None => {
                tracing::trace!(ops = recording.len(), "replaying unprepared recording");
                recording
                    .ops()
                    .iter()
                    .try_for_each(|op| self.submit(op.clone()))
            }
        };
        if let Err(err) = &executed {
            tracing::debug!(%err, opened = self.layers.depth().saturating_sub(depth), "execute rolled back");
            self.unwind_to(depth)?;
            self.state = saved;
        }
        self.backend.sync_state(&self.state)?;
        executed
    }

    /// Close layers until `depth` remain open.
    fn unwind_to(&mut self, depth: usize) -> Result<()> {
        let pop = CanvasOp::from(StateOp::PopLayer);
        while self.layers.depth() > depth {
            self.backend.apply(&pop, &self.state)?;
            self.layers.pop()?;
        }
        Ok(())
    }

    fn ensure_balanced(&self, operation: &'static str) -> Result<()> {
        self.layers.ensure_balanced().inspect_err(|_| {
            tracing::warn!(
                operation,
                depth = self.layers.depth(),
                "refused with open layers"
            );
        })
    }
}

impl<B: CanvasBackend> Canvas for Surface<B> {
    fn submit(&mut self, op: CanvasOp) -> Result<()> {
        match &op {
            CanvasOp::State(StateOp::PushLayer(layer)) => {
                let kind = layer.kind();
                self.backend.apply(&op, &self.state)?;
                self.layers.push(kind);
            }
            CanvasOp::State(StateOp::PopLayer) => {
                if self.layers.is_empty() {
                    return Err(CanvasError::LayerStackEmpty);
                }
                self.backend.apply(&op, &self.state)?;
                self.layers.pop()?;
            }
            CanvasOp::State(state_op) => {
                let mut next = self.state.clone();
                next.apply(state_op);
                self.backend.apply(&op, &next)?;
                self.state = next;
            }
            CanvasOp::Draw(_) => self.backend.apply(&op, &self.state)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use kurbo::{Rect, Shape};
    use peniko::color::Rgba8;

    /// Counts backend calls without rendering anything.
    #[derive(Default)]
    struct Counting {
        applied: Vec<CanvasOp>,
        synced: usize,
        resets: usize,
        prepares: usize,
        executes: usize,
        fail_draws: bool,
        fail_executes: bool,
    }

    struct Prepared(usize);

    impl PreparedArtifacts for Prepared {
        fn stats(&self) -> CacheStats {
            CacheStats {
                has_cached_strips: self.0 > 0,
                strip_count: self.0,
                alpha_count: self.0 * 16,
            }
        }
    }

    impl CanvasBackend for Counting {
        type Prepared = Prepared;

        fn width(&self) -> u16 {
            8
        }

        fn height(&self) -> u16 {
            8
        }

        fn render_settings(&self) -> RenderSettings {
            RenderSettings::default()
        }

        fn apply(&mut self, op: &CanvasOp, _state: &DrawingState) -> Result<()> {
            if self.fail_draws && matches!(op, CanvasOp::Draw(_)) {
                return Err(CanvasError::RenderFailed("draw refused".into()));
            }
            self.applied.push(op.clone());
            Ok(())
        }

        fn sync_state(&mut self, _state: &DrawingState) -> Result<()> {
            self.synced += 1;
            Ok(())
        }

        fn reset(&mut self) {
            self.resets += 1;
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn render_to_pixmap(&mut self, _target: &mut Pixmap) -> Result<()> {
            Ok(())
        }

        fn render_to_buffer(
            &mut self,
            _buffer: &mut [u8],
            _width: u16,
            _height: u16,
            _mode: RenderMode,
        ) -> Result<()> {
            Ok(())
        }

        fn prepare(&mut self, ops: &[CanvasOp], _state: &DrawingState) -> Result<Prepared> {
            self.prepares += 1;
            Ok(Prepared(
                ops.iter().filter(|op| matches!(op, CanvasOp::Draw(_))).count(),
            ))
        }

        fn execute(
            &mut self,
            _prepared: &Prepared,
            _ops: &[CanvasOp],
            _state: &DrawingState,
        ) -> Result<()> {
            self.executes += 1;
            if self.fail_executes {
                return Err(CanvasError::RenderFailed("execute refused".into()));
            }
            Ok(())
        }
    }

    const RECT: Rect = Rect::new(1.0, 1.0, 4.0, 4.0);
    const RED: Rgba8 = Rgba8 {
        r: 255,
        g: 0,
        b: 0,
        a: 255,
    };

    fn surface() -> Surface<Counting> {
        Surface::new(Counting::default()).unwrap()
    }

    #[test]
    fn pop_on_empty_stack_never_reaches_backend() {
        let mut s = surface();
        assert_eq!(s.pop_layer(), Err(CanvasError::LayerStackEmpty));
        assert!(s.backend().applied.is_empty());
    }

    #[test]
    fn flush_and_render_refuse_open_layers() {
        let mut s = surface();
        s.push_opacity_layer(0.5).unwrap();
        s.push_clip_layer(&Rect::new(0.0, 0.0, 2.0, 2.0).to_path(0.1))
            .unwrap();
        assert_eq!(s.flush(), Err(CanvasError::UnbalancedLayers { depth: 2 }));
        let mut target = Pixmap::new(8, 8);
        assert!(s.render_to_pixmap(&mut target).is_err());
        s.pop_layer().unwrap();
        s.pop_layer().unwrap();
        assert_eq!(s.flush(), Ok(()));
    }

    #[test]
    fn render_checks_dimensions_and_buffer_length() {
        let mut s = surface();
        let mut wrong = Pixmap::new(4, 8);
        assert!(matches!(
            s.render_to_pixmap(&mut wrong),
            Err(CanvasError::InvalidParameter(_))
        ));
        let mut short = [0_u8; 8 * 8 * 4 - 1];
        assert!(
            s.render_to_buffer(&mut short, 8, 8, RenderMode::OptimizeSpeed)
                .is_err()
        );
        let mut exact = [0_u8; 8 * 8 * 4];
        assert_eq!(
            s.render_to_buffer(&mut exact, 8, 8, RenderMode::OptimizeSpeed),
            Ok(())
        );
    }

    #[test]
    fn reset_keeps_state_and_closes_layers() {
        let mut s = surface();
        s.set_solid_color(RED).unwrap();
        s.set_stroke(Stroke::new(3.0)).unwrap();
        s.set_transform(Affine::translate((2.0, 0.0))).unwrap();
        s.push_opacity_layer(0.5).unwrap();
        let synced = s.backend().synced;

        s.reset().unwrap();
        assert_eq!(s.layer_depth(), 0);
        assert_eq!(s.paint(), &Paint::Solid(RED));
        assert_eq!(s.stroke().width, 3.0);
        assert_eq!(s.transform(), Affine::translate((2.0, 0.0)));
        assert_eq!(s.backend().resets, 1);
        assert_eq!(s.backend().synced, synced + 1, "state re-applied");
    }

    #[test]
    fn failed_calls_leave_state_consistent() {
        let mut s = surface();
        s.backend.fail_draws = true;
        s.set_fill_rule(FillRule::EvenOdd).unwrap();
        assert!(s.fill_rect(RECT).is_err());
        assert_eq!(s.fill_rule(), FillRule::EvenOdd);
        assert!(s.set_stroke(Stroke::new(f64::NAN)).is_err());
        assert_eq!(s.stroke().width, 1.0);
    }

    #[test]
    fn prepare_is_idempotent_per_state() {
        let mut s = surface();
        let mut recording = Recording::new();
        recording
            .record(|rec| {
                rec.fill_rect(RECT)?;
                rec.stroke_rect(RECT)
            })
            .unwrap();

        s.prepare(&mut recording).unwrap();
        let first = recording.stats();
        s.prepare(&mut recording).unwrap();
        assert_eq!(s.backend().prepares, 1);
        assert_eq!(recording.stats(), first);
        assert_eq!(recording.len(), 2, "ops untouched");

        s.set_transform(Affine::scale(2.0)).unwrap();
        s.prepare(&mut recording).unwrap();
        assert_eq!(s.backend().prepares, 2);
        assert!(recording.strip_count() >= first.strip_count);
        assert!(recording.alpha_count() >= first.alpha_count);
    }

    #[test]
    fn empty_recording_prepares_nothing() {
        let mut s = surface();
        let mut recording = Recording::new();
        s.prepare(&mut recording).unwrap();
        assert_eq!(s.backend().prepares, 0);
        assert!(!recording.has_cached_strips());
    }

    #[test]
    fn execute_uses_artifacts_only_for_matching_state() {
        let mut s = surface();
        let mut recording = Recording::new();
        recording
            .record(|rec| {
                rec.set_solid_color(RED)?;
                rec.fill_rect(RECT)
            })
            .unwrap();
        s.prepare(&mut recording).unwrap();

        s.execute(&recording).unwrap();
        assert_eq!(s.backend().executes, 1);
        assert!(s.backend().applied.is_empty(), "no per-op replay");
        assert_eq!(s.paint(), &Paint::Solid(RED), "state carried over");

        // The paint changed, so the cached key no longer matches.
        s.execute(&recording).unwrap();
        assert_eq!(s.backend().executes, 1);
        assert_eq!(s.backend().applied.len(), 2);
    }

    #[test]
    fn execute_composes_with_open_layers() {
        let mut s = surface();
        let mut recording = Recording::new();
        recording
            .record(|rec| {
                rec.push_opacity_layer(0.5)?;
                rec.fill_rect(RECT)?;
                rec.pop_layer()
            })
            .unwrap();
        s.push_opacity_layer(0.25).unwrap();
        s.execute(&recording).unwrap();
        assert_eq!(s.layer_depth(), 1, "recording leaves the stack as it found it");
        s.pop_layer().unwrap();
    }

    fn layered_recording() -> Recording<Prepared> {
        let mut recording = Recording::new();
        recording
            .record(|rec| {
                rec.set_solid_color(RED)?;
                rec.push_opacity_layer(0.5)?;
                rec.fill_rect(RECT)?;
                rec.pop_layer()
            })
            .unwrap();
        recording
    }

    #[test]
    fn failed_replay_closes_its_layers() {
        let mut s = surface();
        s.push_opacity_layer(0.25).unwrap();
        s.backend.fail_draws = true;
        let recording = layered_recording();

        assert!(s.execute(&recording).is_err());
        assert_eq!(s.layer_depth(), 1, "only the caller's layer is open");
        assert_eq!(s.paint(), &Paint::default(), "paint restored");
        let pops = s
            .backend()
            .applied
            .iter()
            .filter(|op| matches!(op, CanvasOp::State(StateOp::PopLayer)))
            .count();
        assert_eq!(pops, 1, "recording's layer closed in the backend");

        s.pop_layer().unwrap();
        assert_eq!(s.flush(), Ok(()));
    }

    #[test]
    fn failed_prepared_execute_keeps_state() {
        let mut s = surface();
        let mut recording = layered_recording();
        s.prepare(&mut recording).unwrap();
        s.backend.fail_executes = true;

        assert!(s.execute(&recording).is_err());
        assert_eq!(s.backend().executes, 1);
        assert_eq!(s.layer_depth(), 0);
        assert_eq!(s.paint(), &Paint::default());
        assert_eq!(s.flush(), Ok(()));
    }
}
