// SPDX-License-Identifier: GPL-3.0-only

//! Lowlight - temporal frame aggregation and auto-exposure for live video
//!
//! Each incoming RGBA8 frame is stored in a bounded history of recent
//! frames, fused with that history into a noise-reduced estimate, and
//! brightened according to the estimate's central region before being
//! handed back to the caller.
//!
//! # Architecture
//!
//! - [`pipeline`]: the per-frame orchestrator ([`FramePipeline`])
//! - [`engine`]: CPU (rayon) and GPU (wgpu) execution engines
//! - [`ring_buffer`]: fixed-capacity layer history
//! - [`kernels`]: aggregation and tone-map arithmetic
//! - [`exposure`]: ROI brightness and gain
//! - [`source`], [`sink`], [`processing_loop`]: frame plumbing around the pipeline
//! - [`config`]: policies and their JSON form
//!
//! # Example
//!
//! ```ignore
//! let mut pipeline = FramePipeline::new(PipelineConfig::default())?;
//! let mut output = vec![0u8; input.len()];
//! let stats = pipeline.incorporate(width, height, &input, &mut output)?;
//! ```

pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod exposure;
pub mod gpu;
pub mod kernels;
pub mod pipeline;
pub mod pixel;
pub mod processing_loop;
pub mod ring_buffer;
pub mod shaders;
pub mod sink;
pub mod source;

pub use config::{AggregationPolicy, BackendKind, BrightnessMetric, PipelineConfig, ToneMapPolicy};
pub use engine::{ComputeEngine, CpuEngine, EngineKind, GpuEngine};
pub use errors::{PipelineError, PipelineResult};
pub use pipeline::{FramePipeline, FrameStats};
pub use processing_loop::{LoopReport, ProcessingLoop};
pub use ring_buffer::LayerRingBuffer;
pub use sink::{DisplaySink, SinkSummary, StatsSink};
pub use source::{Frame, FrameSource, ImageSequenceSource, SyntheticSource};
