// SPDX-License-Identifier: GPL-3.0-only
//! WGSL sources and their uniform layout
//!
//! Both kernels share one `Params` struct so a single Rust type mirrors the
//! uniform block. Each shader reads only the fields it needs.

/// Layer aggregation kernel, entry point `aggregate_layers`
pub const AGGREGATE_SHADER: &str = include_str!("aggregate.wgsl");

/// Tone-map kernel, entry point `tone_map`
pub const TONEMAP_SHADER: &str = include_str!("tonemap.wgsl");

pub const AGGREGATE_ENTRY: &str = "aggregate_layers";
pub const TONEMAP_ENTRY: &str = "tone_map";

/// Uniform parameters shared by both kernels
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KernelParams {
    pub width: u32,
    pub height: u32,
    /// Active layers in the ring buffer
    pub num_layers: u32,
    /// 0 = weighted robust, 1 = plain average
    pub policy: u32,
    /// Distance floor of the weighted reduction
    pub epsilon: f32,
    /// 0 = identity, 1 = gain multiply, 2 = fixed gamma
    pub mode: u32,
    /// Gain or gamma exponent
    pub factor: f32,
    pub _padding: u32,
}

// Size assertion to catch WGSL/Rust struct mismatches at compile time
const _: () = assert!(std::mem::size_of::<KernelParams>() == 32);
