// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Process-wide handle tables, one per resource kind.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use understory_canvas::kurbo::BezPath;
use understory_canvas::{
    Canvas, CanvasError, CanvasOp, Font, Handle, HandleTable, Image, LayerStack, Mask, Pixmap,
    Result,
};
use understory_canvas_vello_cpu::{CpuRecording, CpuSurface};

/// Live resources of one kind.
///
/// Each entry has its own lock, so a slow call on one surface never
/// blocks another. A call on an entry in use by another thread waits for
/// it.
///
/// Entries of different kinds are only ever locked surface first, then a
/// recording or pixmap. Paths, masks, images and fonts are copied out
/// before a surface is locked.
pub(crate) struct Registry<T> {
    kind: &'static str,
    table: Mutex<HandleTable<Arc<Mutex<T>>>>,
}

impl<T> Registry<T> {
    const fn new(kind: &'static str) -> Self {
        Self {
            kind,
            table: Mutex::new(HandleTable::new()),
        }
    }

    fn table(&self) -> MutexGuard<'_, HandleTable<Arc<Mutex<T>>>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, value: T) -> Result<u64> {
        let handle = self.table().insert(Arc::new(Mutex::new(value)))?;
        tracing::trace!(kind = self.kind, handle = handle.to_raw(), "resource created");
        Ok(handle.to_raw())
    }

    fn entry(&self, raw: u64) -> Result<Arc<Mutex<T>>> {
        if raw == 0 {
            return Err(CanvasError::NullPointer(self.kind));
        }
        Handle::from_raw(raw)
            .and_then(|handle| self.table().get(handle).cloned())
            .ok_or(CanvasError::InvalidHandle(self.kind))
    }

    /// Run `f` with exclusive access to the resource behind `raw`.
    pub(crate) fn with<R>(&self, raw: u64, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
        let entry = self.entry(raw)?;
        let mut guard = entry.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Free `raw`. Null, stale and already freed handles are ignored.
    pub(crate) fn remove(&self, raw: u64) {
        if let Some(handle) = Handle::from_raw(raw)
            && self.table().remove(handle).is_some()
        {
            tracing::trace!(kind = self.kind, handle = raw, "resource freed");
        }
    }
}

impl<T: Clone> Registry<T> {
    /// A copy of the resource behind `raw`.
    pub(crate) fn cloned(&self, raw: u64) -> Result<T> {
        self.with(raw, |value| Ok(value.clone()))
    }
}

pub(crate) static SURFACES: Registry<CpuSurface> = Registry::new("surface");
pub(crate) static RECORDINGS: Registry<CpuRecording> = Registry::new("recording");
pub(crate) static PIXMAPS: Registry<Pixmap> = Registry::new("pixmap");
pub(crate) static PATHS: Registry<BezPath> = Registry::new("path");
pub(crate) static MASKS: Registry<Mask> = Registry::new("mask");
pub(crate) static IMAGES: Registry<Image> = Registry::new("image");
pub(crate) static FONTS: Registry<Font> = Registry::new("font");

/// Recorder tokens set bit 63, which surface handles never do.
const TOKEN_BIT: u64 = 1 << 63;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Ops collected through a recorder token while its callback runs.
#[derive(Debug)]
struct PendingRecorder {
    token: u64,
    ops: Vec<CanvasOp>,
    layers: LayerStack,
}

impl Canvas for PendingRecorder {
    fn submit(&mut self, op: CanvasOp) -> Result<()> {
        self.layers.track(&op)?;
        self.ops.push(op);
        Ok(())
    }
}

thread_local! {
    static RECORDERS: RefCell<Vec<PendingRecorder>> = const { RefCell::new(Vec::new()) };
}

/// A recorder token, live until dropped or finished.
#[derive(Debug)]
pub(crate) struct RecorderScope {
    token: u64,
}

impl RecorderScope {
    pub(crate) fn open() -> Self {
        let token = TOKEN_BIT | NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        RECORDERS.with(|recorders| {
            recorders.borrow_mut().push(PendingRecorder {
                token,
                ops: Vec::new(),
                layers: LayerStack::new(),
            });
        });
        Self { token }
    }

    pub(crate) fn token(&self) -> u64 {
        self.token
    }

    /// Close the token and hand back what was drawn through it.
    pub(crate) fn finish(self) -> Vec<CanvasOp> {
        take_recorder(self.token).map_or_else(Vec::new, |pending| pending.ops)
    }
}

impl Drop for RecorderScope {
    fn drop(&mut self) {
        take_recorder(self.token);
    }
}

fn take_recorder(token: u64) -> Option<PendingRecorder> {
    RECORDERS.with(|recorders| {
        let mut recorders = recorders.borrow_mut();
        let index = recorders.iter().position(|r| r.token == token)?;
        Some(recorders.remove(index))
    })
}

/// Run `f` against a surface handle or a live recorder token.
pub(crate) fn with_canvas(raw: u64, f: impl FnOnce(&mut dyn Canvas) -> Result<()>) -> Result<()> {
    if raw & TOKEN_BIT == 0 {
        return SURFACES.with(raw, |surface| f(surface));
    }
    RECORDERS.with(|recorders| {
        let mut recorders = recorders.borrow_mut();
        let pending = recorders
            .iter_mut()
            .find(|r| r.token == raw)
            .ok_or(CanvasError::RecorderClosed)?;
        f(pending)
    })
}
