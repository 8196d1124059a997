// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The interface the orchestration layer needs from a rasterizer.

use crate::Result;
use crate::op::CanvasOp;
use crate::pixmap::Pixmap;
use crate::settings::{RenderMode, RenderSettings};
use crate::state::DrawingState;

/// Counters describing a backend's cached rasterization artifacts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Whether any coverage strips are cached.
    pub has_cached_strips: bool,
    /// Number of cached strips.
    pub strip_count: usize,
    /// Number of packed alpha bytes backing the strips.
    pub alpha_count: usize,
}

impl CacheStats {
    /// Sum two sets of counters.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            has_cached_strips: self.has_cached_strips || other.has_cached_strips,
            strip_count: self.strip_count + other.strip_count,
            alpha_count: self.alpha_count + other.alpha_count,
        }
    }
}

/// Backend-specific artifacts derived from a recorded op stream.
pub trait PreparedArtifacts {
    /// Counters for the cached artifacts.
    fn stats(&self) -> CacheStats;
}

impl PreparedArtifacts for () {
    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// A rasterizer that a [`Surface`](crate::Surface) drives.
///
/// The surface owns drawing state and layer balance; the backend only
/// turns already-validated operations into pixels. Every `state` argument
/// is the surface's drawing state *after* the accompanying op (or op
/// sequence) took effect.
pub trait CanvasBackend {
    /// Artifacts produced by [`CanvasBackend::prepare`].
    type Prepared: PreparedArtifacts;

    /// Width of the render target in pixels.
    fn width(&self) -> u16;

    /// Height of the render target in pixels.
    fn height(&self) -> u16;

    /// Settings the backend was created with, with the SIMD level resolved.
    fn render_settings(&self) -> RenderSettings;

    /// Consume one validated op.
    fn apply(&mut self, op: &CanvasOp, state: &DrawingState) -> Result<()>;

    /// Make the backend's drawing state match `state`.
    fn sync_state(&mut self, state: &DrawingState) -> Result<()>;

    /// Discard accumulated content and open layers.
    ///
    /// The surface calls [`CanvasBackend::sync_state`] right after.
    fn reset(&mut self);

    /// Resolve pending work.
    fn flush(&mut self) -> Result<()>;

    /// Copy the rendered pixels into `target`, whose dimensions match the backend's.
    fn render_to_pixmap(&mut self, target: &mut Pixmap) -> Result<()>;

    /// Copy the rendered pixels into a premultiplied RGBA8 byte buffer of at
    /// least `width * height * 4` bytes.
    fn render_to_buffer(
        &mut self,
        buffer: &mut [u8],
        width: u16,
        height: u16,
        mode: RenderMode,
    ) -> Result<()>;

    /// Derive cacheable artifacts for `ops` as they would draw when starting
    /// from `state`.
    ///
    /// May leave the backend's drawing state changed; the surface calls
    /// [`CanvasBackend::sync_state`] afterwards.
    fn prepare(&mut self, ops: &[CanvasOp], state: &DrawingState) -> Result<Self::Prepared>;

    /// Replay `ops` using `prepared` artifacts, starting from `state`.
    ///
    /// `prepared` was produced by [`CanvasBackend::prepare`] for the same
    /// `ops` and an equal `state`. The surface re-syncs the folded drawing
    /// state afterwards.
    ///
    /// On failure, layers opened by this call must be closed again before
    /// returning.
    fn execute(
        &mut self,
        prepared: &Self::Prepared,
        ops: &[CanvasOp],
        state: &DrawingState,
    ) -> Result<()>;
}
