// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface creation settings.

/// SIMD instruction set a backend may use for rasterization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SimdLevel {
    /// Portable scalar code.
    Fallback = 0,
    /// x86 SSE2.
    Sse2 = 1,
    /// x86 SSE4.2.
    Sse42 = 2,
    /// x86 AVX.
    Avx = 3,
    /// x86 AVX2.
    Avx2 = 4,
    /// x86 AVX-512.
    Avx512 = 5,
    /// Arm NEON.
    Neon = 6,
}

impl SimdLevel {
    /// Parse the raw `repr(u8)` value.
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Fallback,
            1 => Self::Sse2,
            2 => Self::Sse42,
            3 => Self::Avx,
            4 => Self::Avx2,
            5 => Self::Avx512,
            6 => Self::Neon,
            _ => return None,
        })
    }
}

/// Speed/quality trade-off for rasterization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RenderMode {
    /// Favor throughput.
    #[default]
    OptimizeSpeed = 0,
    /// Favor output quality.
    OptimizeQuality = 1,
}

impl RenderMode {
    /// Parse the raw `repr(u8)` value.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::OptimizeSpeed),
            1 => Some(Self::OptimizeQuality),
            _ => None,
        }
    }
}

/// Settings fixed at surface creation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RenderSettings {
    /// SIMD level to use; `None` lets the backend detect the best one.
    pub level: Option<SimdLevel>,
    /// Worker threads used during a single flush. `0` renders on the calling thread.
    pub num_threads: u16,
    /// Speed/quality trade-off.
    pub render_mode: RenderMode,
}
