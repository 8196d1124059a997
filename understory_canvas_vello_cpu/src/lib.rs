// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vello CPU backend for Understory Canvas.
//!
//! [`VelloCpuBackend`] implements [`CanvasBackend`] on top of the
//! sparse-strips [`vello_cpu::RenderContext`]. Wrap it in a
//! [`Surface`](understory_canvas::Surface) to draw:
//!
//! ```
//! use understory_canvas::kurbo::Rect;
//! use understory_canvas::peniko::color::Rgba8;
//! use understory_canvas::{Canvas, Pixmap};
//!
//! let mut surface = understory_canvas_vello_cpu::new_surface(64, 64).unwrap();
//! surface.set_solid_color(Rgba8 { r: 255, g: 0, b: 255, a: 255 }).unwrap();
//! surface.fill_rect(Rect::new(8.0, 8.0, 56.0, 56.0)).unwrap();
//! surface.flush().unwrap();
//!
//! let mut pixmap = Pixmap::new(64, 64);
//! surface.render_to_pixmap(&mut pixmap).unwrap();
//! assert_eq!(pixmap.sample(32, 32).unwrap().a, 255);
//! ```
//!
//! Preparing a [`CpuRecording`] translates its ops into cached
//! `vello_common` recordings whose strips are reused on every execute.
//! Ops the recorder cannot express (blurred rounded rects, glyph runs and
//! aliasing threshold changes) stay in the command log and are replayed
//! directly between the cached parts.

#![no_std]

extern crate alloc;

use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::ops::Range;

use kurbo::{Affine, BezPath, Rect, Stroke};
use peniko::{BlendMode, Color, Fill, Gradient};
use understory_canvas::{
    CacheStats, CanvasBackend, CanvasError, CanvasOp, ColorStop, DrawOp, DrawingState, GlyphRun,
    Image, Layer, Mask, Paint, Pixmap, PreparedArtifacts, Recording, RenderMode, RenderSettings,
    Result, SimdLevel, StateOp, Surface,
};
use vello_common::paint::PaintType;
use vello_common::recording::{Recordable, Recorder, Recording as VelloRecording};
use vello_cpu::{ImageSource, Level, RenderContext};

/// A surface rendered by Vello CPU.
pub type CpuSurface = Surface<VelloCpuBackend>;

/// A recording whose prepared artifacts are Vello CPU strips.
pub type CpuRecording = Recording<CpuPrepared>;

/// Create a CPU surface with default settings.
pub fn new_surface(width: u16, height: u16) -> Result<CpuSurface> {
    Surface::new(VelloCpuBackend::new(width, height)?)
}

/// Create a CPU surface with explicit settings.
pub fn new_surface_with_settings(
    width: u16,
    height: u16,
    settings: RenderSettings,
) -> Result<CpuSurface> {
    Surface::new(VelloCpuBackend::with_settings(width, height, settings)?)
}

/// The best SIMD level Vello CPU can use on this machine.
pub fn detect_simd_level() -> SimdLevel {
    Level::try_detect().map_or(SimdLevel::Fallback, simd_level_of)
}

fn simd_level_of(level: Level) -> SimdLevel {
    let name = alloc::format!("{level:?}").to_lowercase();
    if name.contains("neon") {
        SimdLevel::Neon
    } else if name.contains("avx512") {
        SimdLevel::Avx512
    } else if name.contains("avx2") {
        SimdLevel::Avx2
    } else if name.contains("avx") {
        SimdLevel::Avx
    } else if name.contains("sse4") {
        SimdLevel::Sse42
    } else if name.contains("sse2") {
        SimdLevel::Sse2
    } else {
        SimdLevel::Fallback
    }
}

/// Vello CPU cannot be forced onto an arbitrary instruction set, so any
/// request other than `Fallback` resolves to the detected level.
fn cpu_level(requested: Option<SimdLevel>) -> Level {
    match requested {
        Some(SimdLevel::Fallback) => Level::fallback(),
        _ => Level::try_detect().unwrap_or(Level::fallback()),
    }
}

fn cpu_render_mode(mode: RenderMode) -> vello_cpu::RenderMode {
    match mode {
        RenderMode::OptimizeSpeed => vello_cpu::RenderMode::OptimizeSpeed,
        RenderMode::OptimizeQuality => vello_cpu::RenderMode::OptimizeQuality,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum StackEntry {
    /// A composite layer with no component; nothing was pushed.
    Noop,
    Pushed,
}

/// The calls shared by a live [`RenderContext`] and a [`Recorder`].
trait CpuTarget {
    fn set_paint(&mut self, paint: PaintType);
    fn set_stroke(&mut self, stroke: Stroke);
    fn set_transform(&mut self, transform: Affine);
    fn set_paint_transform(&mut self, transform: Affine);
    fn set_fill_rule(&mut self, fill_rule: Fill);
    fn push_layer(
        &mut self,
        clip: Option<&BezPath>,
        blend: Option<BlendMode>,
        opacity: Option<f32>,
        mask: Option<vello_cpu::Mask>,
    );
    fn pop_layer(&mut self);
    fn fill_rect(&mut self, rect: &Rect);
    fn stroke_rect(&mut self, rect: &Rect);
    fn fill_path(&mut self, path: &BezPath);
    fn stroke_path(&mut self, path: &BezPath);
}

impl CpuTarget for RenderContext {
    fn set_paint(&mut self, paint: PaintType) {
        Self::set_paint(self, paint);
    }
    fn set_stroke(&mut self, stroke: Stroke) {
        Self::set_stroke(self, stroke);
    }
    fn set_transform(&mut self, transform: Affine) {
        Self::set_transform(self, transform);
    }
    fn set_paint_transform(&mut self, transform: Affine) {
        Self::set_paint_transform(self, transform);
    }
    fn set_fill_rule(&mut self, fill_rule: Fill) {
        Self::set_fill_rule(self, fill_rule);
    }
    fn push_layer(
        &mut self,
        clip: Option<&BezPath>,
        blend: Option<BlendMode>,
        opacity: Option<f32>,
        mask: Option<vello_cpu::Mask>,
    ) {
        Self::push_layer(self, clip, blend, opacity, mask, None);
    }
    fn pop_layer(&mut self) {
        Self::pop_layer(self);
    }
    fn fill_rect(&mut self, rect: &Rect) {
        Self::fill_rect(self, rect);
    }
    fn stroke_rect(&mut self, rect: &Rect) {
        Self::stroke_rect(self, rect);
    }
    fn fill_path(&mut self, path: &BezPath) {
        Self::fill_path(self, path);
    }
    fn stroke_path(&mut self, path: &BezPath) {
        Self::stroke_path(self, path);
    }
}

impl CpuTarget for Recorder<'_> {
    fn set_paint(&mut self, paint: PaintType) {
        Self::set_paint(self, paint);
    }
    fn set_stroke(&mut self, stroke: Stroke) {
        Self::set_stroke(self, stroke);
    }
    fn set_transform(&mut self, transform: Affine) {
        Self::set_transform(self, transform);
    }
    fn set_paint_transform(&mut self, transform: Affine) {
        Self::set_paint_transform(self, transform);
    }
    fn set_fill_rule(&mut self, fill_rule: Fill) {
        Self::set_fill_rule(self, fill_rule);
    }
    fn push_layer(
        &mut self,
        clip: Option<&BezPath>,
        blend: Option<BlendMode>,
        opacity: Option<f32>,
        mask: Option<vello_cpu::Mask>,
    ) {
        Self::push_layer(self, clip, blend, opacity, mask, None);
    }
    fn pop_layer(&mut self) {
        Self::pop_layer(self);
    }
    fn fill_rect(&mut self, rect: &Rect) {
        Self::fill_rect(self, rect);
    }
    fn stroke_rect(&mut self, rect: &Rect) {
        Self::stroke_rect(self, rect);
    }
    fn fill_path(&mut self, path: &BezPath) {
        Self::fill_path(self, path);
    }
    fn stroke_path(&mut self, path: &BezPath) {
        Self::stroke_path(self, path);
    }
}

fn cpu_stops(stops: &[ColorStop]) -> Vec<peniko::ColorStop> {
    let mut stops: Vec<_> = stops
        .iter()
        .map(|stop| peniko::ColorStop {
            offset: stop.offset,
            color: Color::from_rgba8(stop.color.r, stop.color.g, stop.color.b, stop.color.a)
                .into(),
        })
        .collect();
    stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));
    stops
}

fn cpu_pixmap(pixmap: &Pixmap) -> vello_cpu::Pixmap {
    let mut out = vello_cpu::Pixmap::new(pixmap.width(), pixmap.height());
    out.data_mut().copy_from_slice(pixmap.data());
    out
}

fn cpu_image(image: &Image) -> vello_cpu::Image {
    vello_cpu::Image {
        image: ImageSource::Pixmap(Arc::new(cpu_pixmap(&image.pixmap))),
        sampler: peniko::ImageSampler {
            x_extend: image.x_extend,
            y_extend: image.y_extend,
            quality: image.quality,
            // Applied through an opacity layer around each draw instead.
            alpha: 1.0,
        },
    }
}

fn cpu_paint(paint: &Paint) -> PaintType {
    match paint {
        Paint::Solid(c) => Color::from_rgba8(c.r, c.g, c.b, c.a).into(),
        Paint::LinearGradient(g) => Gradient::new_linear(g.start, g.end)
            .with_stops(cpu_stops(&g.stops).as_slice())
            .with_extend(g.extend)
            .into(),
        Paint::RadialGradient(g) => Gradient::new_radial(g.center, g.radius)
            .with_stops(cpu_stops(&g.stops).as_slice())
            .with_extend(g.extend)
            .into(),
        Paint::SweepGradient(g) => Gradient::new_sweep(g.center, g.start_angle, g.end_angle)
            .with_stops(cpu_stops(&g.stops).as_slice())
            .with_extend(g.extend)
            .into(),
        Paint::Image(image) => cpu_image(image).into(),
    }
}

fn cpu_mask(mask: &Mask) -> vello_cpu::Mask {
    vello_cpu::Mask::from_parts(mask.coverage().to_vec(), mask.width(), mask.height())
}

/// Alpha an image paint asks to be drawn with, when it is not opaque.
fn image_alpha(paint: &Paint) -> Option<f32> {
    match paint {
        Paint::Image(image) if image.alpha < 1.0 => Some(image.alpha),
        _ => None,
    }
}

/// Bring `target` to `state`, except for the aliasing threshold.
fn sync_target(target: &mut impl CpuTarget, state: &DrawingState) {
    target.set_paint(cpu_paint(&state.paint));
    target.set_stroke(state.stroke.clone());
    target.set_transform(state.transform);
    target.set_paint_transform(state.paint_transform);
    target.set_fill_rule(state.fill_rule);
}

fn push_target_layer(target: &mut impl CpuTarget, layer: &Layer) -> StackEntry {
    match layer {
        Layer::Clip(path) => target.push_layer(Some(path), None, None, None),
        Layer::Opacity(opacity) => target.push_layer(None, None, Some(*opacity), None),
        Layer::Blend(blend) => target.push_layer(None, Some(*blend), None, None),
        Layer::Mask(mask) => target.push_layer(None, None, None, Some(cpu_mask(mask))),
        Layer::Composite(layer) => {
            if layer.clip.is_none()
                && layer.blend.is_none()
                && layer.opacity.is_none()
                && layer.mask.is_none()
            {
                return StackEntry::Noop;
            }
            target.push_layer(
                layer.clip.as_ref(),
                layer.blend,
                layer.opacity,
                layer.mask.as_ref().map(cpu_mask),
            );
        }
    }
    StackEntry::Pushed
}

/// Translate one op the recorder can express. `state` is the state after it.
fn apply_to_target(
    target: &mut impl CpuTarget,
    stack: &mut Vec<StackEntry>,
    op: &CanvasOp,
    state: &DrawingState,
) -> Result<()> {
    match op {
        CanvasOp::State(StateOp::SetPaint(paint)) => target.set_paint(cpu_paint(paint)),
        CanvasOp::State(StateOp::SetStroke(stroke)) => target.set_stroke(stroke.clone()),
        CanvasOp::State(StateOp::SetTransform(xf)) => target.set_transform(*xf),
        CanvasOp::State(StateOp::SetPaintTransform(xf)) => target.set_paint_transform(*xf),
        CanvasOp::State(StateOp::SetFillRule(rule)) => target.set_fill_rule(*rule),
        CanvasOp::State(StateOp::PushLayer(layer)) => {
            let entry = push_target_layer(target, layer);
            stack.push(entry);
        }
        CanvasOp::State(StateOp::PopLayer) => match stack.pop() {
            Some(StackEntry::Noop) => {}
            Some(StackEntry::Pushed) => target.pop_layer(),
            None => return Err(CanvasError::LayerStackEmpty),
        },
        CanvasOp::Draw(draw) => {
            let alpha = image_alpha(&state.paint);
            if alpha.is_some() {
                target.push_layer(None, None, alpha, None);
            }
            match draw {
                DrawOp::FillRect(rect) => target.fill_rect(rect),
                DrawOp::StrokeRect(rect) => target.stroke_rect(rect),
                DrawOp::FillPath(path) => target.fill_path(path),
                DrawOp::StrokePath(path) => target.stroke_path(path),
                DrawOp::FillBlurredRoundedRect { .. }
                | DrawOp::FillGlyphs(_)
                | DrawOp::StrokeGlyphs(_) => {
                    return Err(CanvasError::RenderFailed(
                        "draw cannot be recorded into vello_cpu".to_string(),
                    ));
                }
            }
            if alpha.is_some() {
                target.pop_layer();
            }
        }
        CanvasOp::State(StateOp::SetAliasingThreshold(_)) => {
            return Err(CanvasError::RenderFailed(
                "aliasing threshold cannot be recorded into vello_cpu".to_string(),
            ));
        }
    }
    Ok(())
}

/// Whether the `vello_common` recorder can express `op`.
fn is_recordable(op: &CanvasOp) -> bool {
    !matches!(
        op,
        CanvasOp::State(StateOp::SetAliasingThreshold(_))
            | CanvasOp::Draw(
                DrawOp::FillBlurredRoundedRect { .. }
                    | DrawOp::FillGlyphs(_)
                    | DrawOp::StrokeGlyphs(_)
            )
    )
}

/// Per-op flag: `true` if the op goes into a cached recording.
///
/// A layer pair whose scope contains a directly replayed op is replayed
/// directly as well, so every cached run is layer-balanced.
fn cacheable_ops(ops: &[CanvasOp]) -> Vec<bool> {
    let mut cacheable: Vec<bool> = ops.iter().map(is_recordable).collect();
    // (push index, scope holds a direct op)
    let mut open: Vec<(usize, bool)> = Vec::new();
    for (i, op) in ops.iter().enumerate() {
        match op {
            CanvasOp::State(StateOp::PushLayer(_)) => open.push((i, false)),
            CanvasOp::State(StateOp::PopLayer) => {
                if let Some((push, direct)) = open.pop() {
                    if direct {
                        cacheable[push] = false;
                        cacheable[i] = false;
                        if let Some(parent) = open.last_mut() {
                            parent.1 = true;
                        }
                    }
                }
            }
            _ if !cacheable[i] => {
                for scope in &mut open {
                    scope.1 = true;
                }
            }
            _ => {}
        }
    }
    cacheable
}

enum Segment {
    Cached(VelloRecording),
    Direct {
        ops: Range<usize>,
        entry: DrawingState,
    },
}

/// Prepared artifacts for one recording under one drawing state.
pub struct CpuPrepared {
    segments: Vec<Segment>,
}

impl fmt::Debug for CpuPrepared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Cached(_)))
            .count();
        f.debug_struct("CpuPrepared")
            .field("segments", &self.segments.len())
            .field("cached", &cached)
            .finish()
    }
}

impl CpuPrepared {
    /// Number of cached `vello_common` recordings.
    pub fn cached_segments(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Cached(_)))
            .count()
    }

    /// Number of op ranges replayed without a cache.
    pub fn direct_segments(&self) -> usize {
        self.segments.len() - self.cached_segments()
    }
}

impl PreparedArtifacts for CpuPrepared {
    fn stats(&self) -> CacheStats {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Cached(rec) => Some(CacheStats {
                    has_cached_strips: rec.has_cached_strips(),
                    strip_count: rec.strip_count(),
                    alpha_count: rec.alpha_count(),
                }),
                Segment::Direct { .. } => None,
            })
            .fold(CacheStats::default(), CacheStats::merge)
    }
}

/// [`CanvasBackend`] over a `vello_cpu` render context.
pub struct VelloCpuBackend {
    ctx: RenderContext,
    width: u16,
    height: u16,
    settings: RenderSettings,
    stack: Vec<StackEntry>,
}

impl fmt::Debug for VelloCpuBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VelloCpuBackend")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("settings", &self.settings)
            .field("layers", &self.stack.len())
            .finish_non_exhaustive()
    }
}

impl VelloCpuBackend {
    /// A backend with default settings.
    pub fn new(width: u16, height: u16) -> Result<Self> {
        Self::with_settings(width, height, RenderSettings::default())
    }

    /// A backend with explicit settings. Both dimensions must be non-zero.
    pub fn with_settings(width: u16, height: u16, settings: RenderSettings) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(CanvasError::InvalidParameter(alloc::format!(
                "surface size {width}x{height} is empty"
            )));
        }
        let level = cpu_level(settings.level);
        let resolved = RenderSettings {
            level: Some(simd_level_of(level)),
            ..settings
        };
        let ctx = RenderContext::new_with(
            width,
            height,
            vello_cpu::RenderSettings {
                level,
                num_threads: settings.num_threads,
                render_mode: cpu_render_mode(settings.render_mode),
            },
        );
        tracing::debug!(width, height, settings = ?resolved, "vello_cpu context created");
        Ok(Self {
            ctx,
            width,
            height,
            settings: resolved,
            stack: Vec::new(),
        })
    }

    fn check_mask(&self, mask: &Mask) -> Result<()> {
        if (mask.width(), mask.height()) == (self.width, self.height) {
            Ok(())
        } else {
            Err(CanvasError::InvalidParameter(alloc::format!(
                "mask is {}x{}, surface is {}x{}",
                mask.width(),
                mask.height(),
                self.width,
                self.height
            )))
        }
    }

    fn check_layer(&self, op: &CanvasOp) -> Result<()> {
        match op {
            CanvasOp::State(StateOp::PushLayer(Layer::Mask(mask))) => self.check_mask(mask),
            CanvasOp::State(StateOp::PushLayer(Layer::Composite(layer))) => {
                layer.mask.as_ref().map_or(Ok(()), |m| self.check_mask(m))
            }
            _ => Ok(()),
        }
    }

    fn draw_glyphs(&mut self, run: &GlyphRun, state: &DrawingState, fill: bool) {
        let alpha = image_alpha(&state.paint);
        if let Some(alpha) = alpha {
            self.ctx.push_opacity_layer(alpha);
        }
        let glyphs = run.glyphs.iter().map(|g| vello_cpu::Glyph {
            id: g.id,
            x: g.x,
            y: g.y,
        });
        let builder = self.ctx.glyph_run(run.font.data()).font_size(run.font_size);
        if fill {
            builder.fill_glyphs(glyphs);
        } else {
            builder.stroke_glyphs(glyphs);
        }
        if alpha.is_some() {
            self.ctx.pop_layer();
        }
    }

    fn execute_segments(&mut self, prepared: &CpuPrepared, ops: &[CanvasOp]) -> Result<()> {
        for segment in &prepared.segments {
            match segment {
                Segment::Cached(recording) => self.ctx.execute_recording(recording),
                Segment::Direct { ops: range, entry } => {
                    self.sync_state(entry)?;
                    let mut state = entry.clone();
                    for op in &ops[range.clone()] {
                        if let CanvasOp::State(state_op) = op {
                            state.apply(state_op);
                        }
                        self.apply(op, &state)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Pop context layers until `depth` stack entries remain.
    fn close_layers(&mut self, depth: usize) {
        while self.stack.len() > depth {
            if let Some(StackEntry::Pushed) = self.stack.pop() {
                self.ctx.pop_layer();
            }
        }
    }

    fn record_segment(&mut self, ops: &[CanvasOp], entry: &DrawingState) -> Result<Segment> {
        let mut recording = VelloRecording::new();
        let mut result = Ok(());
        self.ctx.record(&mut recording, |rec| {
            sync_target(rec, entry);
            let mut stack = Vec::new();
            let mut state = entry.clone();
            for op in ops {
                if let CanvasOp::State(state_op) = op {
                    state.apply(state_op);
                }
                if let Err(err) = apply_to_target(rec, &mut stack, op, &state) {
                    result = Err(err);
                    return;
                }
            }
        });
        result?;
        self.ctx.set_aliasing_threshold(entry.aliasing_threshold);
        self.ctx.prepare_recording(&mut recording);
        Ok(Segment::Cached(recording))
    }
}

impl CanvasBackend for VelloCpuBackend {
    type Prepared = CpuPrepared;

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
        tracing::trace!(?op, "vello_cpu op");
        self.check_layer(op)?;
        match op {
            CanvasOp::State(StateOp::SetAliasingThreshold(threshold)) => {
                self.ctx.set_aliasing_threshold(*threshold);
                Ok(())
            }
            CanvasOp::Draw(DrawOp::FillBlurredRoundedRect {
                rect,
                radius,
                std_dev,
            }) => {
                let alpha = image_alpha(&state.paint);
                if let Some(alpha) = alpha {
                    self.ctx.push_opacity_layer(alpha);
                }
                self.ctx.fill_blurred_rounded_rect(rect, *radius, *std_dev);
                if alpha.is_some() {
                    self.ctx.pop_layer();
                }
                Ok(())
            }
            CanvasOp::Draw(DrawOp::FillGlyphs(run)) => {
                self.draw_glyphs(run, state, true);
                Ok(())
            }
            CanvasOp::Draw(DrawOp::StrokeGlyphs(run)) => {
                self.draw_glyphs(run, state, false);
                Ok(())
            }
            _ => apply_to_target(&mut self.ctx, &mut self.stack, op, state),
        }
    }

    fn sync_state(&mut self, state: &DrawingState) -> Result<()> {
        sync_target(&mut self.ctx, state);
        self.ctx.set_aliasing_threshold(state.aliasing_threshold);
        Ok(())
    }

    fn reset(&mut self) {
        self.ctx.reset();
        self.stack.clear();
    }

    fn flush(&mut self) -> Result<()> {
        self.ctx.flush();
        Ok(())
    }

    fn render_to_pixmap(&mut self, target: &mut Pixmap) -> Result<()> {
        self.ctx.flush();
        let mut scratch = vello_cpu::Pixmap::new(self.width, self.height);
        self.ctx.render_to_pixmap(&mut scratch);
        target.data_mut().copy_from_slice(scratch.data());
        Ok(())
    }

    fn render_to_buffer(
        &mut self,
        buffer: &mut [u8],
        width: u16,
        height: u16,
        mode: RenderMode,
    ) -> Result<()> {
        self.ctx.flush();
        let len = usize::from(width) * usize::from(height) * 4;
        self.ctx
            .render_to_buffer(&mut buffer[..len], width, height, cpu_render_mode(mode));
        Ok(())
    }

    fn prepare(&mut self, ops: &[CanvasOp], state: &DrawingState) -> Result<CpuPrepared> {
        for op in ops {
            self.check_layer(op)?;
        }
        let cacheable = cacheable_ops(ops);
        let mut segments = Vec::new();
        let mut entry = state.clone();
        let mut start = 0;
        while start < ops.len() {
            let cached = cacheable[start];
            let end = cacheable[start..]
                .iter()
                .position(|&c| c != cached)
                .map_or(ops.len(), |n| start + n);
            let run = &ops[start..end];
            segments.push(if cached {
                self.record_segment(run, &entry)?
            } else {
                Segment::Direct {
                    ops: start..end,
                    entry: entry.clone(),
                }
            });
            for op in run {
                if let CanvasOp::State(state_op) = op {
                    entry.apply(state_op);
                }
            }
            start = end;
        }
        tracing::debug!(
            ops = ops.len(),
            segments = segments.len(),
            "vello_cpu recording prepared"
        );
        Ok(CpuPrepared { segments })
    }

    fn execute(
        &mut self,
        prepared: &CpuPrepared,
        ops: &[CanvasOp],
        _state: &DrawingState,
    ) -> Result<()> {
        let depth = self.stack.len();
        let executed = self.execute_segments(prepared, ops);
        if executed.is_err() {
            self.close_layers(depth);
        }
        executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use peniko::color::PremulRgba8;
    use understory_canvas::CompositeLayer;

    fn fill() -> CanvasOp {
        DrawOp::FillRect(Rect::new(0.0, 0.0, 4.0, 4.0)).into()
    }

    fn push() -> CanvasOp {
        StateOp::PushLayer(Layer::Opacity(0.5)).into()
    }

    fn pop() -> CanvasOp {
        StateOp::PopLayer.into()
    }

    fn blur() -> CanvasOp {
        DrawOp::FillBlurredRoundedRect {
            rect: Rect::new(0.0, 0.0, 4.0, 4.0),
            radius: 1.0,
            std_dev: 1.0,
        }
        .into()
    }

    #[test]
    fn layers_around_direct_ops_are_replayed_directly() {
        let ops = [push(), fill(), push(), blur(), pop(), pop(), fill()];
        assert_eq!(
            cacheable_ops(&ops),
            [false, true, false, false, false, false, true]
        );
    }

    #[test]
    fn layers_without_direct_ops_stay_cached() {
        let ops = [push(), fill(), pop(), blur(), push(), pop()];
        assert_eq!(cacheable_ops(&ops), [true, true, true, false, true, true]);
    }

    #[test]
    fn empty_composite_layer_pushes_nothing() {
        let mut ctx = RenderContext::new(4, 4);
        let mut stack = Vec::new();
        let op: CanvasOp = StateOp::PushLayer(Layer::Composite(CompositeLayer::default())).into();
        apply_to_target(&mut ctx, &mut stack, &op, &DrawingState::default()).unwrap();
        assert_eq!(stack, [StackEntry::Noop]);
        apply_to_target(&mut ctx, &mut stack, &pop(), &DrawingState::default()).unwrap();
        assert!(stack.is_empty());
        assert_eq!(
            apply_to_target(&mut ctx, &mut stack, &pop(), &DrawingState::default()),
            Err(CanvasError::LayerStackEmpty)
        );
    }

    #[test]
    fn zero_sized_backend_is_rejected() {
        assert!(matches!(
            VelloCpuBackend::new(0, 10),
            Err(CanvasError::InvalidParameter(_))
        ));
    }

    #[test]
    fn settings_report_a_resolved_level() {
        let backend = VelloCpuBackend::with_settings(
            4,
            4,
            RenderSettings {
                level: Some(SimdLevel::Fallback),
                ..RenderSettings::default()
            },
        )
        .unwrap();
        assert_eq!(backend.render_settings().level, Some(SimdLevel::Fallback));

        let detected = VelloCpuBackend::new(4, 4).unwrap();
        assert_eq!(
            detected.render_settings().level,
            Some(detect_simd_level())
        );
    }

    #[test]
    fn mismatched_mask_is_rejected_before_drawing() {
        let mut backend = VelloCpuBackend::new(8, 8).unwrap();
        let mask = Mask::new_alpha(&Pixmap::new(4, 4)).unwrap();
        let op: CanvasOp = StateOp::PushLayer(Layer::Mask(mask)).into();
        assert!(matches!(
            backend.apply(&op, &DrawingState::default()),
            Err(CanvasError::InvalidParameter(_))
        ));
        assert!(backend.stack.is_empty());
    }

    #[test]
    fn direct_ops_split_prepared_segments() {
        let ops = [fill(), blur(), fill()];
        let mut backend = VelloCpuBackend::new(8, 8).unwrap();
        let prepared = backend.prepare(&ops, &DrawingState::default()).unwrap();
        assert_eq!(prepared.cached_segments(), 2);
        assert_eq!(prepared.direct_segments(), 1);
        assert!(prepared.stats().strip_count > 0);
    }

    #[test]
    fn failed_execute_closes_layers_it_opened() {
        let mut backend = VelloCpuBackend::new(8, 8).unwrap();
        let mask = Mask::new_alpha(&Pixmap::new(4, 4)).unwrap();
        let ops = [
            push(),
            StateOp::PushLayer(Layer::Mask(mask)).into(),
            blur(),
            pop(),
            pop(),
        ];
        let prepared = CpuPrepared {
            segments: vec![Segment::Direct {
                ops: 0..ops.len(),
                entry: DrawingState::default(),
            }],
        };
        assert!(matches!(
            backend.execute(&prepared, &ops, &DrawingState::default()),
            Err(CanvasError::InvalidParameter(_))
        ));
        assert!(backend.stack.is_empty());
    }

    #[test]
    fn mask_coverage_matches_vello_masks() {
        let mut pixmap = Pixmap::new(4, 4);
        for (i, p) in pixmap.data_mut().iter_mut().enumerate() {
            let v = u8::try_from(i * 17).unwrap();
            *p = PremulRgba8 {
                r: v,
                g: v / 2,
                b: 255 - v,
                a: 255,
            };
        }
        let source =
            vello_cpu::Pixmap::from_parts(pixmap.data().to_vec(), pixmap.width(), pixmap.height());
        let pairs = [
            (Mask::new_alpha(&pixmap).unwrap(), vello_cpu::Mask::new_alpha(&source)),
            (
                Mask::new_luminance(&pixmap).unwrap(),
                vello_cpu::Mask::new_luminance(&source),
            ),
        ];
        for (ours, theirs) in pairs {
            let converted = cpu_mask(&ours);
            for y in 0..4 {
                for x in 0..4 {
                    let i = usize::from(y) * 4 + usize::from(x);
                    assert_eq!(
                        ours.coverage()[i],
                        theirs.sample(x, y),
                        "{:?} ({x}, {y})",
                        ours.kind()
                    );
                    assert_eq!(converted.sample(x, y), theirs.sample(x, y));
                }
            }
        }
    }

    #[test]
    fn glyph_runs_are_direct_segments() {
        let bytes = include_bytes!("../tests/assets/DejaVuSansMono.ttf");
        let font = understory_canvas::Font::new(&bytes[..], 0).unwrap();
        let glyphs = font.text_to_glyphs("ok", 12.0).unwrap();
        let run: CanvasOp = DrawOp::FillGlyphs(GlyphRun {
            font,
            font_size: 12.0,
            glyphs,
        })
        .into();
        let ops = [fill(), run, fill()];
        assert_eq!(cacheable_ops(&ops), [true, false, true]);

        let mut backend = VelloCpuBackend::new(16, 16).unwrap();
        let prepared = backend.prepare(&ops, &DrawingState::default()).unwrap();
        assert_eq!(prepared.cached_segments(), 2);
        assert_eq!(prepared.direct_segments(), 1);
        backend
            .execute(&prepared, &ops, &DrawingState::default())
            .unwrap();
        assert!(backend.stack.is_empty());
    }
}
