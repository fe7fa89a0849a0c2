// SPDX-License-Identifier: GPL-3.0-only
//! Per-pixel kernels
//!
//! Each kernel is a pure function of one pixel coordinate. The CPU engine
//! maps them over scanlines with rayon; the WGSL shaders in `shaders/`
//! implement the same arithmetic for the GPU engine.

pub mod aggregate;
pub mod tonemap;

pub use aggregate::{aggregate_layers, average_pixel, weighted_pixel};
pub use tonemap::{ToneTransform, tone_map, tone_map_pixel};
