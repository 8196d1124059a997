// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Status codes and the per-thread last error.

use std::any::Any;
use std::cell::RefCell;
use std::ffi::{CString, c_char};
use std::panic::{self, AssertUnwindSafe};

use understory_canvas::{CanvasError, Result, Status};

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(err: &CanvasError) {
    let message = err.to_string();
    tracing::debug!(status = ?err.status(), %message, "ffi call failed");
    let message = CString::new(message.replace('\0', " ")).ok();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = message);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

/// Run `f`, record its error (or panic) and return the status code.
pub(crate) fn status(f: impl FnOnce() -> Result<()>) -> i32 {
    let err = match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => return Status::Ok.code(),
        Ok(Err(err)) => err,
        Err(payload) => CanvasError::RenderFailed(panic_message(payload.as_ref())),
    };
    set_last_error(&err);
    err.status().code()
}

/// Message of the most recent failed call on this thread, or null.
///
/// The string stays valid until the next failing call or
/// [`ucanvas_clear_last_error`] on the same thread.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_get_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(std::ptr::null(), |message| message.as_ptr())
    })
}

/// Forget the last error of this thread.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Write `value` through an out pointer.
///
/// # Safety
///
/// `ptr` must be null or valid for a write of `T`.
pub(crate) unsafe fn write_out<T>(ptr: *mut T, value: T, what: &'static str) -> Result<()> {
    if ptr.is_null() {
        return Err(CanvasError::NullPointer(what));
    }
    // SAFETY: non-null, and valid for writes per the caller contract.
    unsafe { ptr.write(value) };
    Ok(())
}

/// Borrow `len` elements starting at `ptr`. An empty slice may be null.
///
/// # Safety
///
/// Unless `len` is zero, `ptr` must be null or valid for reads of `len`
/// elements for the returned lifetime.
pub(crate) unsafe fn read_slice<'a, T>(
    ptr: *const T,
    len: usize,
    what: &'static str,
) -> Result<&'a [T]> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(CanvasError::NullPointer(what));
    }
    // SAFETY: non-null, and valid for `len` reads per the caller contract.
    Ok(unsafe { std::slice::from_raw_parts(ptr, len) })
}

/// Mutably borrow `len` elements starting at `ptr`. An empty slice may be null.
///
/// # Safety
///
/// Unless `len` is zero, `ptr` must be null or valid for reads and writes
/// of `len` elements, unaliased for the returned lifetime.
pub(crate) unsafe fn write_slice<'a, T>(
    ptr: *mut T,
    len: usize,
    what: &'static str,
) -> Result<&'a mut [T]> {
    if len == 0 {
        return Ok(&mut []);
    }
    if ptr.is_null() {
        return Err(CanvasError::NullPointer(what));
    }
    // SAFETY: non-null, valid and unaliased per the caller contract.
    Ok(unsafe { std::slice::from_raw_parts_mut(ptr, len) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn errors_are_recorded_per_thread() {
        ucanvas_clear_last_error();
        let code = status(|| Err(CanvasError::InvalidHandle("surface")));
        assert_eq!(code, Status::InvalidHandle.code());
        // SAFETY: non-null pointers from the slot are valid C strings.
        let message = unsafe { CStr::from_ptr(ucanvas_get_last_error()) };
        assert_eq!(message.to_str().unwrap(), "invalid handle: surface");

        let other = std::thread::spawn(|| ucanvas_get_last_error().is_null())
            .join()
            .unwrap();
        assert!(other, "another thread has its own slot");

        ucanvas_clear_last_error();
        assert!(ucanvas_get_last_error().is_null());
    }

    #[test]
    fn success_keeps_the_previous_error() {
        status(|| Err(CanvasError::OutOfMemory));
        assert_eq!(status(|| Ok(())), 0);
        assert!(!ucanvas_get_last_error().is_null());
        ucanvas_clear_last_error();
    }

    #[test]
    fn panics_become_render_failures() {
        let code = status(|| panic!("backend exploded"));
        assert_eq!(code, Status::RenderFailed.code());
        // SAFETY: non-null pointers from the slot are valid C strings.
        let message = unsafe { CStr::from_ptr(ucanvas_get_last_error()) };
        assert!(message.to_str().unwrap().contains("backend exploded"));
        ucanvas_clear_last_error();
    }
}
