// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants

/// Bytes per packed RGBA8 pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// Default ring buffer capacity (layers kept for aggregation)
pub const DEFAULT_MAX_LAYERS: usize = 8;

/// Floor applied to pixel distances in the weighted reduction
pub const DEFAULT_EPSILON: f32 = 0.001;

/// ROI radius fractions of `min(width, height)` seen in practice
pub mod roi {
    /// Tighter center sample (default)
    pub const TENTH: f32 = 0.1;
    /// Wider center sample
    pub const EIGHTH: f32 = 0.125;
}

/// Exposure targets per brightness metric
pub mod exposure {
    /// Top of the CIE L* scale
    pub const PERCEIVED_TARGET: f32 = 100.0;
    /// Maximum representable normalized channel value
    pub const MAX_CHANNEL_TARGET: f32 = 1.0;
    /// Exponent used by fixed-gamma tone mapping when none is given
    pub const DEFAULT_GAMMA: f32 = 0.5;
}

/// CIE L* / sRGB constants
pub mod cie {
    /// sRGB inverse-gamma threshold
    pub const SRGB_LINEAR_THRESHOLD: f64 = 0.04045;
    /// Slope of the linear sRGB segment
    pub const SRGB_LINEAR_SLOPE: f64 = 12.92;
    /// Rec. 709 luminance weights
    pub const LUMA_R: f64 = 0.2126;
    pub const LUMA_G: f64 = 0.7152;
    pub const LUMA_B: f64 = 0.0722;
    /// 216/24389, the intent behind the rounded 0.008856
    pub const EPSILON: f64 = 216.0 / 24389.0;
    /// 24389/27, the intent behind the rounded 903.3
    pub const KAPPA: f64 = 24389.0 / 27.0;
}

/// GPU dispatch constants
pub mod gpu {
    /// Workgroup edge for the per-pixel kernels (matches `@workgroup_size` in WGSL)
    pub const WORKGROUP_SIZE: u32 = 16;
}

/// Processing loop queue depth before the source blocks
pub const FRAME_QUEUE_DEPTH: usize = 4;
