// SPDX-License-Identifier: GPL-3.0-only
//! Auto-exposure: ROI brightness analysis and the gain derived from it

pub mod brightness;
pub mod gain;

pub use brightness::{BrightnessAnalyzer, Roi, max_channel, perceived_lightness};
pub use gain::{GainCompute, GainSmoother, compute_gain};
