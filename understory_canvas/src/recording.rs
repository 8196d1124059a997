// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recorded op streams and the scoped recorder that fills them.

use alloc::vec::Vec;

use crate::backend::{CacheStats, PreparedArtifacts};
use crate::canvas::Canvas;
use crate::layer::LayerStack;
use crate::op::CanvasOp;
use crate::state::DrawingState;
use crate::Result;

/// An ordered log of canvas ops plus backend artifacts derived from it.
///
/// `P` is the backend's [`PreparedArtifacts`] type. Artifacts are keyed by
/// the drawing state they were prepared under, since the same ops starting
/// from a different transform or paint rasterize differently.
///
/// A recording owns no surface state. It is replayed into whatever state
/// and layers the target surface has when it is executed.
#[derive(Clone, Debug)]
pub struct Recording<P> {
    ops: Vec<CanvasOp>,
    prepared: Vec<(DrawingState, P)>,
}

impl<P> Default for Recording<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Recording<P> {
    /// An empty recording.
    pub const fn new() -> Self {
        Self {
            ops: Vec::new(),
            prepared: Vec::new(),
        }
    }

    /// Number of recorded ops.
    #[inline]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// `true` if nothing has been recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The recorded ops, in order.
    #[inline]
    pub fn ops(&self) -> &[CanvasOp] {
        &self.ops
    }

    /// Drop every op and every cached artifact.
    pub fn clear(&mut self) {
        self.ops.clear();
        self.prepared.clear();
    }

    /// Append ops by drawing through a [`Recorder`].
    ///
    /// The recorder lives only for the duration of `f`. If `f` fails, or
    /// returns with layers still open, every op appended by this call is
    /// discarded and earlier ops are kept. Appending anything invalidates
    /// cached artifacts.
    pub fn record<R>(&mut self, f: impl FnOnce(&mut Recorder<'_>) -> Result<R>) -> Result<R> {
        let start = self.ops.len();
        let mut recorder = Recorder {
            ops: &mut self.ops,
            layers: LayerStack::new(),
        };
        let outcome = f(&mut recorder).and_then(|value| {
            recorder.layers.ensure_balanced()?;
            Ok(value)
        });
        match &outcome {
            Err(err) => {
                tracing::debug!(%err, discarded = self.ops.len() - start, "recording rolled back");
                self.ops.truncate(start);
            }
            Ok(_) if self.ops.len() != start => self.prepared.clear(),
            Ok(_) => {}
        }
        outcome
    }

    /// Number of distinct drawing states this recording has been prepared under.
    pub fn prepared_count(&self) -> usize {
        self.prepared.len()
    }

    pub(crate) fn prepared_for(&self, state: &DrawingState) -> Option<&P> {
        self.prepared
            .iter()
            .find(|(key, _)| key == state)
            .map(|(_, prepared)| prepared)
    }

    pub(crate) fn insert_prepared(&mut self, state: DrawingState, prepared: P) {
        self.prepared.push((state, prepared));
    }
}

impl<P: PreparedArtifacts> Recording<P> {
    /// Counters summed over every cached artifact.
    pub fn stats(&self) -> CacheStats {
        self.prepared
            .iter()
            .fold(CacheStats::default(), |acc, (_, p)| acc.merge(p.stats()))
    }

    /// Whether any coverage strips are cached.
    pub fn has_cached_strips(&self) -> bool {
        self.stats().has_cached_strips
    }

    /// Total cached strips.
    pub fn strip_count(&self) -> usize {
        self.stats().strip_count
    }

    /// Total packed alpha bytes.
    pub fn alpha_count(&self) -> usize {
        self.stats().alpha_count
    }
}

/// A [`Canvas`] that appends to a [`Recording`] instead of rendering.
///
/// Only reachable as `&mut Recorder<'_>` inside [`Recording::record`], so it
/// cannot outlive the callback.
pub struct Recorder<'a> {
    ops: &'a mut Vec<CanvasOp>,
    layers: LayerStack,
}

impl Recorder<'_> {
    /// Layers opened in this recording and not yet closed.
    pub fn layer_depth(&self) -> usize {
        self.layers.depth()
    }
}

impl core::fmt::Debug for Recorder<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Recorder")
            .field("ops", &self.ops.len())
            .field("depth", &self.layers.depth())
            .finish()
    }
}

impl Canvas for Recorder<'_> {
    fn submit(&mut self, op: CanvasOp) -> Result<()> {
        self.layers.track(&op)?;
        self.ops.push(op);
        Ok(())
    }
}
