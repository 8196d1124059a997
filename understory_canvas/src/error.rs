// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type and stable status codes.

use alloc::string::String;

/// Result alias used throughout the crate.
pub type Result<T, E = CanvasError> = core::result::Result<T, E>;

/// Stable status codes shared with the C boundary.
///
/// The numeric values are part of the public contract and never change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    /// Success.
    Ok = 0,
    /// A required pointer or handle was null.
    NullPointer = -1,
    /// A handle was stale, freed, or of the wrong kind.
    InvalidHandle = -2,
    /// The backend failed to render, or the call was refused in the current state.
    RenderFailed = -3,
    /// Allocation failed.
    OutOfMemory = -4,
    /// An argument was out of range or otherwise unusable.
    InvalidParameter = -5,
    /// PNG data could not be decoded.
    PngDecodeError = -6,
    /// A pixmap could not be encoded as PNG.
    PngEncodeError = -7,
}

impl Status {
    /// Raw integer value of this status.
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Parse a raw status code. Returns `None` for unknown values.
    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::Ok,
            -1 => Self::NullPointer,
            -2 => Self::InvalidHandle,
            -3 => Self::RenderFailed,
            -4 => Self::OutOfMemory,
            -5 => Self::InvalidParameter,
            -6 => Self::PngDecodeError,
            -7 => Self::PngEncodeError,
            _ => return None,
        })
    }

    /// `true` for [`Status::Ok`].
    #[inline]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Errors produced by canvas operations.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CanvasError {
    /// A required pointer or handle was null. Carries the argument name.
    #[error("null pointer: {0}")]
    NullPointer(&'static str),
    /// A handle did not refer to a live resource. Carries the resource kind.
    #[error("invalid handle: {0}")]
    InvalidHandle(&'static str),
    /// The backend failed, or the operation is not possible right now.
    #[error("render failed: {0}")]
    RenderFailed(String),
    /// Allocation failed.
    #[error("out of memory")]
    OutOfMemory,
    /// An argument was rejected before reaching the backend.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// PNG data could not be decoded.
    #[error("PNG decode failed: {0}")]
    PngDecode(String),
    /// A pixmap could not be encoded as PNG.
    #[error("PNG encode failed: {0}")]
    PngEncode(String),
    /// `pop_layer` was called with no open layer.
    #[error("pop_layer called with an empty layer stack")]
    LayerStackEmpty,
    /// Layers were still open where a balanced stack is required.
    #[error("{depth} layer(s) still open")]
    UnbalancedLayers {
        /// Number of layers left open.
        depth: usize,
    },
    /// A recorder was used after its recording callback returned.
    #[error("recorder used outside of its recording callback")]
    RecorderClosed,
}

impl CanvasError {
    /// Status code reported for this error at the C boundary.
    pub const fn status(&self) -> Status {
        match self {
            Self::NullPointer(_) => Status::NullPointer,
            Self::InvalidHandle(_) | Self::RecorderClosed => Status::InvalidHandle,
            Self::RenderFailed(_) | Self::UnbalancedLayers { .. } => Status::RenderFailed,
            Self::OutOfMemory => Status::OutOfMemory,
            Self::InvalidParameter(_) | Self::LayerStackEmpty => Status::InvalidParameter,
            Self::PngDecode(_) => Status::PngDecodeError,
            Self::PngEncode(_) => Status::PngEncodeError,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn status_codes_are_stable() {
        let expected = [
            (Status::Ok, 0),
            (Status::NullPointer, -1),
            (Status::InvalidHandle, -2),
            (Status::RenderFailed, -3),
            (Status::OutOfMemory, -4),
            (Status::InvalidParameter, -5),
            (Status::PngDecodeError, -6),
            (Status::PngEncodeError, -7),
        ];
        for (status, code) in expected {
            assert_eq!(status.code(), code, "{status:?} has a fixed code");
            assert_eq!(Status::from_code(code), Some(status), "code {code} parses");
        }
        assert_eq!(Status::from_code(-8), None, "unknown codes are rejected");
        assert_eq!(Status::from_code(1), None, "positive codes are rejected");
    }

    #[test]
    fn orchestration_errors_map_onto_stable_codes() {
        assert_eq!(CanvasError::LayerStackEmpty.status(), Status::InvalidParameter);
        assert_eq!(
            CanvasError::UnbalancedLayers { depth: 2 }.status(),
            Status::RenderFailed
        );
        assert_eq!(CanvasError::RecorderClosed.status(), Status::InvalidHandle);
        assert_eq!(
            CanvasError::invalid("opacity").status(),
            Status::InvalidParameter
        );
    }

    #[test]
    fn messages_name_the_problem() {
        assert_eq!(
            CanvasError::UnbalancedLayers { depth: 3 }.to_string(),
            "3 layer(s) still open"
        );
        assert_eq!(
            CanvasError::NullPointer("path").to_string(),
            "null pointer: path"
        );
    }
}
