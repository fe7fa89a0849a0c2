// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the frame pipeline
//!
//! Zero denominators (pixel distance, ROI brightness) are not errors: the
//! kernels floor them and the gain stage falls back to a pass-through gain.

use thiserror::Error;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors surfaced by the pipeline and its collaborators
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input and/or output buffer length differs from `width * height * 4`
    #[error("buffer size mismatch: expected {expected} bytes, got input {input} and output {output}")]
    SizeMismatch {
        expected: usize,
        input: usize,
        output: usize,
    },

    /// A layer written to the ring buffer has the wrong length
    #[error("invalid layer size: expected {expected} bytes, got {actual}")]
    InvalidInputSize { expected: usize, actual: usize },

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No usable parallel execution engine
    #[error("compute device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Resources for the requested dimensions could not be allocated
    #[error("resource allocation failed: {0}")]
    ResourceAllocation(String),

    /// GPU submission or readback failure
    #[error("GPU error: {0}")]
    Gpu(String),

    /// Frame source failure
    #[error("frame source error: {0}")]
    Source(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl PipelineError {
    /// Whether the failure leaves the pipeline usable for a retry
    ///
    /// Size and configuration problems never touch pipeline state; device and
    /// allocation failures drop every resource so the next call starts clean.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::SizeMismatch { .. }
                | PipelineError::InvalidInputSize { .. }
                | PipelineError::ResourceAllocation(_)
                | PipelineError::Gpu(_)
        )
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Source(err.to_string())
    }
}
