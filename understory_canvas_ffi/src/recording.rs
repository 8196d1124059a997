// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recordings: capture once, prepare per surface state, execute many times.

use std::ffi::c_void;

use understory_canvas::{Canvas, CanvasError};
use understory_canvas_vello_cpu::CpuRecording;

use crate::error::{status, write_out};
use crate::registry::{RECORDINGS, RecorderScope, SURFACES};

/// Callback that draws into a recording through the `recorder` canvas handle.
///
/// The handle is only valid until the callback returns.
pub type UcRecordCallback = unsafe extern "C" fn(user_data: *mut c_void, recorder: u64);

/// Create an empty recording.
///
/// # Safety
///
/// `out_recording` must be null or valid for a write of `u64`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_recording_new(out_recording: *mut u64) -> i32 {
    status(|| {
        let handle = RECORDINGS.insert(CpuRecording::new())?;
        // SAFETY: forwarded caller contract.
        unsafe { write_out(out_recording, handle, "out_recording") }
    })
}

/// Free a recording. Null and already freed handles are ignored.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_recording_free(recording: u64) {
    RECORDINGS.remove(recording);
}

/// Drop every recorded command and cached artifact.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_recording_clear(recording: u64) -> i32 {
    status(|| {
        RECORDINGS.with(recording, |r| {
            r.clear();
            Ok(())
        })
    })
}

/// Append the commands drawn by `callback` to `recording`.
///
/// `callback` receives `user_data` and a recorder handle accepted by every
/// drawing, state and layer entry point. The commands are kept only if the
/// callback leaves the layer stack balanced.
///
/// # Safety
///
/// `callback` must be safe to call with `user_data`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_recording_record(
    recording: u64,
    callback: Option<UcRecordCallback>,
    user_data: *mut c_void,
) -> i32 {
    status(|| {
        let callback = callback.ok_or(CanvasError::NullPointer("callback"))?;
        // Resolve the handle before running any user code.
        RECORDINGS.with(recording, |_| Ok(()))?;

        let scope = RecorderScope::open();
        // SAFETY: forwarded caller contract.
        unsafe { callback(user_data, scope.token()) };
        let ops = scope.finish();

        RECORDINGS.with(recording, |r| {
            r.record(|rec| ops.into_iter().try_for_each(|op| rec.submit(op)))
        })
    })
}

/// Derive cached artifacts for `recording` under the state of `surface`.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_recording_prepare(surface: u64, recording: u64) -> i32 {
    status(|| SURFACES.with(surface, |s| RECORDINGS.with(recording, |r| s.prepare(r))))
}

/// Replay `recording` onto `surface`.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_recording_execute(surface: u64, recording: u64) -> i32 {
    status(|| SURFACES.with(surface, |s| RECORDINGS.with(recording, |r| s.execute(r))))
}

/// Number of recorded commands.
///
/// # Safety
///
/// `out_len` must be null or valid for a write of `usize`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_recording_len(recording: u64, out_len: *mut usize) -> i32 {
    status(|| {
        let len = RECORDINGS.with(recording, |r| Ok(r.len()))?;
        // SAFETY: forwarded caller contract.
        unsafe { write_out(out_len, len, "out_len") }
    })
}

/// Whether any prepared artifact holds cached strips.
///
/// # Safety
///
/// `out_cached` must be null or valid for a write of `bool`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_recording_has_cached_strips(
    recording: u64,
    out_cached: *mut bool,
) -> i32 {
    status(|| {
        let cached = RECORDINGS.with(recording, |r| Ok(r.has_cached_strips()))?;
        // SAFETY: forwarded caller contract.
        unsafe { write_out(out_cached, cached, "out_cached") }
    })
}

/// Total strips over all prepared artifacts.
///
/// # Safety
///
/// `out_count` must be null or valid for a write of `usize`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_recording_strip_count(
    recording: u64,
    out_count: *mut usize,
) -> i32 {
    status(|| {
        let count = RECORDINGS.with(recording, |r| Ok(r.strip_count()))?;
        // SAFETY: forwarded caller contract.
        unsafe { write_out(out_count, count, "out_count") }
    })
}

/// Total alpha bytes over all prepared artifacts.
///
/// # Safety
///
/// `out_count` must be null or valid for a write of `usize`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ucanvas_recording_alpha_count(
    recording: u64,
    out_count: *mut usize,
) -> i32 {
    status(|| {
        let count = RECORDINGS.with(recording, |r| Ok(r.alpha_count()))?;
        // SAFETY: forwarded caller contract.
        unsafe { write_out(out_count, count, "out_count") }
    })
}
