// SPDX-License-Identifier: GPL-3.0-only
//! Parallel execution engines
//!
//! An engine owns every resource whose size depends on the frame dimensions:
//! the layer ring buffer, the aggregate estimate, the output buffer and the
//! host-side ROI scratch copy. The orchestrator decides when to (re)allocate;
//! the engine only knows how.
//!
//! ```text
//! FramePipeline
//!     └── dyn ComputeEngine
//!             ├── CpuEngine (rayon over scanlines)
//!             └── GpuEngine (wgpu compute shaders)
//! ```

pub mod cpu;
pub mod gpu;

pub use cpu::CpuEngine;
pub use gpu::GpuEngine;

use crate::config::{AggregationPolicy, BackendKind};
use crate::errors::{PipelineError, PipelineResult};
use crate::kernels::ToneTransform;
use crate::pixel::Rgba;
use crate::ring_buffer::RingCursor;
use tracing::{info, warn};

/// Which engine is doing the per-pixel work
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineKind {
    Cpu,
    Gpu,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Cpu => write!(f, "cpu"),
            EngineKind::Gpu => write!(f, "gpu"),
        }
    }
}

/// Per-dimension resources plus the three per-frame stages that touch them
///
/// Calls arrive in frame order from a single orchestrating caller:
/// `write_layer`, `aggregate`, optionally `aggregate_snapshot`, `tone_map`.
pub trait ComputeEngine: Send {
    fn kind(&self) -> EngineKind;

    /// Drop any existing resources and allocate zeroed ones for the given shape
    ///
    /// On failure the engine is left unallocated.
    fn allocate(&mut self, width: u32, height: u32, capacity: usize) -> PipelineResult<()>;

    /// Drop all resources
    fn release(&mut self);

    /// Ring cursor of the current allocation
    fn cursor(&self) -> Option<&RingCursor>;

    /// Store one packed layer in the next ring slot
    fn write_layer(&mut self, layer: &[u8]) -> PipelineResult<usize>;

    /// Reduce the active layers into the aggregate estimate
    fn aggregate(&mut self, policy: AggregationPolicy, epsilon: f32) -> PipelineResult<()>;

    /// Host copy of the aggregate estimate, for ROI analysis
    fn aggregate_snapshot(&mut self) -> PipelineResult<&[Rgba]>;

    /// Tone-map the aggregate into the packed output buffer
    fn tone_map(&mut self, transform: ToneTransform) -> PipelineResult<&[u8]>;
}

fn unallocated() -> PipelineError {
    PipelineError::ResourceAllocation("engine resources are not allocated".to_string())
}

/// Zero-filled host vector, reporting allocation failure instead of aborting
fn zeroed<T: Clone + Default>(len: usize, what: &str) -> PipelineResult<Vec<T>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|e| {
        PipelineError::ResourceAllocation(format!("{} ({} elements): {}", what, len, e))
    })?;
    buffer.resize(len, T::default());
    Ok(buffer)
}

/// Build the engine the configuration asks for
///
/// `Auto` prefers the GPU and falls back to the CPU with a warning; an
/// explicit `Gpu` request fails if no device can be created.
pub fn create_engine(backend: BackendKind) -> PipelineResult<Box<dyn ComputeEngine>> {
    match backend {
        BackendKind::Cpu => Ok(Box::new(CpuEngine::new())),
        BackendKind::Gpu => Ok(Box::new(pollster::block_on(GpuEngine::new())?)),
        BackendKind::Auto => match pollster::block_on(GpuEngine::new()) {
            Ok(engine) => {
                info!("Using GPU engine");
                Ok(Box::new(engine))
            }
            Err(e) => {
                warn!(error = %e, "GPU engine unavailable, falling back to CPU");
                Ok(Box::new(CpuEngine::new()))
            }
        },
    }
}
