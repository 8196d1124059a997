// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Canvas: drawing state, layer stack, and recording orchestration
//! in front of an opaque 2D rasterizer.
//!
//! This crate is the orchestration layer. It owns everything that happens
//! *before* a command reaches a rasterizer and nothing that happens after:
//!
//! - **Drawing state** ([`DrawingState`]): current paint, stroke, transform,
//!   paint transform, fill rule and aliasing threshold.
//! - **Layer stack** ([`LayerStack`], [`Layer`]): nested clip / opacity /
//!   blend / mask scopes with strict push/pop balance.
//! - **Primitive vocabulary** ([`CanvasOp`]): state changes, layer
//!   operations and draws, expressed as plain data.
//! - **Record → prepare → execute** ([`Recording`], [`Recorder`]): capture a
//!   command stream once, let the backend derive cacheable artifacts, and
//!   replay it into a live surface.
//!
//! Rasterization is delegated to a [`CanvasBackend`]. The
//! `understory_canvas_vello_cpu` crate implements it on top of Vello CPU;
//! `understory_canvas_ref` provides a non-rasterizing tracing backend.
//!
//! # The `Canvas` trait
//!
//! Live surfaces ([`Surface`]) and recorders ([`Recorder`]) accept exactly
//! the same calls. Both implement [`Canvas`], whose provided methods
//! validate their arguments locally and then submit a [`CanvasOp`]:
//!
//! ```
//! use understory_canvas::kurbo::Rect;
//! use understory_canvas::peniko::color::Rgba8;
//! use understory_canvas::{Canvas, Recording};
//!
//! let mut recording: Recording<()> = Recording::new();
//! recording
//!     .record(|rec| {
//!         rec.set_solid_color(Rgba8 { r: 255, g: 0, b: 255, a: 255 })?;
//!         rec.push_opacity_layer(0.5)?;
//!         rec.fill_rect(Rect::new(0.0, 0.0, 16.0, 16.0))?;
//!         rec.pop_layer()
//!     })
//!     .unwrap();
//! assert_eq!(recording.len(), 4);
//! ```
//!
//! # Errors
//!
//! Every fallible operation returns [`Result`] with a [`CanvasError`]. Each
//! error maps onto one of the stable [`Status`] codes used at the C
//! boundary via [`CanvasError::status`].

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

mod backend;
mod canvas;
#[cfg(feature = "png")]
mod codec;
mod error;
mod font;
mod handle;
mod layer;
mod op;
mod paint;
mod pixmap;
mod recording;
mod settings;
mod state;
mod surface;

pub use backend::{CacheStats, CanvasBackend, PreparedArtifacts};
pub use canvas::Canvas;
#[cfg(feature = "png")]
pub use codec::{decode_png, encode_png};
pub use error::{CanvasError, Result, Status};
pub use font::{Font, Glyph, GlyphRun};
pub use handle::{Handle, HandleTable};
pub use layer::{CompositeLayer, Layer, LayerKind, LayerStack};
pub use op::{CanvasOp, DrawOp, StateOp};
pub use paint::{ColorStop, LinearGradient, Paint, PaintKind, RadialGradient, SweepGradient};
pub use pixmap::{Image, Mask, MaskKind, Pixmap};
pub use recording::{Recorder, Recording};
pub use settings::{RenderMode, RenderSettings, SimdLevel};
pub use state::{DrawingState, FillRule};
pub use surface::Surface;

pub use kurbo;
pub use peniko;
