// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! C ABI for Understory Canvas surfaces rendered by Vello CPU.
//!
//! Every resource crosses the boundary as a `u64` handle. `0` is the null
//! handle; a freed handle is never valid again and reports
//! `INVALID_HANDLE`. Freeing is idempotent.
//!
//! Fallible calls return a status code:
//!
//! | Code | Meaning |
//! |---:|---|
//! | `0` | ok |
//! | `-1` | null pointer or null handle |
//! | `-2` | invalid handle |
//! | `-3` | render failed |
//! | `-4` | out of memory |
//! | `-5` | invalid parameter |
//! | `-6` | PNG decode error |
//! | `-7` | PNG encode error |
//!
//! The message of the last failure on the calling thread is available from
//! [`ucanvas_get_last_error`].
//!
//! Drawing, state and layer calls take a *canvas* handle: a surface, or the
//! recorder handle passed to a [`ucanvas_recording_record`] callback. The
//! recorder handle dies when the callback returns.
//!
//! Handles may be used from any thread. One resource serves one call at a
//! time; a call on a resource in use by another thread waits for it.

#![allow(unsafe_code, reason = "this crate is the C boundary")]

mod canvas;
mod error;
mod recording;
mod registry;
mod resources;
mod surface;
mod types;

use std::ffi::c_char;

pub use canvas::*;
pub use error::{ucanvas_clear_last_error, ucanvas_get_last_error};
pub use recording::*;
pub use resources::*;
pub use surface::*;
pub use types::{
    UCANVAS_SIMD_DETECT, UcAffine, UcBlendMode, UcColor, UcColorStop, UcGlyph, UcPremulRgba8,
    UcRect, UcRenderSettings, UcStroke,
};

static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// Library version as a static NUL-terminated string.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_version() -> *const c_char {
    VERSION.as_ptr().cast()
}

/// Best SIMD level available on this machine, as a `SimdLevel` value.
#[unsafe(no_mangle)]
pub extern "C" fn ucanvas_simd_detect() -> u8 {
    understory_canvas_vello_cpu::detect_simd_level() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn version_is_the_package_version() {
        // SAFETY: `VERSION` is NUL-terminated.
        let version = unsafe { CStr::from_ptr(ucanvas_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn detected_level_parses() {
        assert!(understory_canvas::SimdLevel::from_u8(ucanvas_simd_detect()).is_some());
    }
}
