// SPDX-License-Identifier: GPL-3.0-only
//! Per-frame orchestration
//!
//! # Pipeline Overview
//!
//! ```text
//! raw RGBA8 frame
//!        │
//!        ▼
//! Layer ring buffer (one slot, cyclic)
//!        │
//!        ▼
//! Aggregation (active layers + previous estimate)
//!        │
//!        ▼
//! ROI brightness -> gain   (gain-multiply tone mapping only)
//!        │
//!        ▼
//! Tone mapping -> caller's output buffer
//! ```
//!
//! Calls must be serialized by the caller; `incorporate` takes `&mut self`
//! and runs every stage to completion before returning.

use crate::config::PipelineConfig;
use crate::engine::{self, ComputeEngine, EngineKind};
use crate::errors::{PipelineError, PipelineResult};
use crate::exposure::{BrightnessAnalyzer, GainCompute};
use crate::kernels::ToneTransform;
use crate::pixel;
use crate::ring_buffer::RingCursor;
use crate::source::Frame;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Shape the engine resources were allocated for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FrameShape {
    width: u32,
    height: u32,
    capacity: usize,
}

impl FrameShape {
    fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

enum Allocation {
    /// Nothing allocated yet, or dropped after a failure or `reset`
    Empty,
    /// Zero-area frames: history is counted but there is nothing to compute
    Degenerate { shape: FrameShape, cursor: RingCursor },
    Ready { shape: FrameShape },
}

/// What happened to one frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStats {
    /// 1-based count of frames since the last reallocation
    pub frame_index: u64,
    pub active_layers: usize,
    /// ROI brightness, when the exposure stage ran
    pub brightness: Option<f32>,
    /// Gain applied by the tone-map stage (1.0 when not applicable)
    pub gain: f32,
    pub reallocated: bool,
    pub elapsed: Duration,
}

/// Temporal aggregation and auto-exposure for one stream of frames
pub struct FramePipeline {
    config: PipelineConfig,
    engine: Box<dyn ComputeEngine>,
    analyzer: BrightnessAnalyzer,
    gain: GainCompute,
    allocation: Allocation,
}

impl FramePipeline {
    /// Validate `config` and pick its engine; per-frame resources come later
    pub fn new(config: PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let engine = engine::create_engine(config.backend)?;
        Ok(Self::with_engine(config, engine))
    }

    /// Use a specific engine instead of the one `config.backend` selects
    pub fn with_engine(config: PipelineConfig, engine: Box<dyn ComputeEngine>) -> Self {
        info!(
            engine = %engine.kind(),
            max_layers = config.max_layers,
            aggregation = ?config.aggregation_policy,
            tone_map = ?config.tone_map_policy,
            metric = ?config.brightness_metric,
            "Frame pipeline created"
        );
        Self {
            analyzer: BrightnessAnalyzer::new(config.brightness_metric, config.roi_fraction),
            gain: GainCompute::new(config.effective_target(), config.gain_smoothing),
            config,
            engine,
            allocation: Allocation::Empty,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn backend(&self) -> EngineKind {
        self.engine.kind()
    }

    /// `(width, height)` of the current allocation
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match &self.allocation {
            Allocation::Empty => None,
            Allocation::Degenerate { shape, .. } | Allocation::Ready { shape } => {
                Some((shape.width, shape.height))
            }
        }
    }

    fn cursor(&self) -> Option<&RingCursor> {
        match &self.allocation {
            Allocation::Empty => None,
            Allocation::Degenerate { cursor, .. } => Some(cursor),
            Allocation::Ready { .. } => self.engine.cursor(),
        }
    }

    /// `min(total_ingested, max_layers)` for the current allocation
    pub fn active_layer_count(&self) -> usize {
        self.cursor().map(RingCursor::active_count).unwrap_or(0)
    }

    /// Frames written since the last reallocation
    pub fn total_ingested(&self) -> u64 {
        self.cursor().map(RingCursor::total_ingested).unwrap_or(0)
    }

    /// Change the ring capacity; history is dropped on the next frame
    pub fn set_max_layers(&mut self, max_layers: usize) -> PipelineResult<()> {
        if max_layers == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_layers must be at least 1".to_string(),
            ));
        }
        self.config.max_layers = max_layers;
        Ok(())
    }

    /// Drop all history and resources
    pub fn reset(&mut self) {
        self.engine.release();
        self.gain.reset();
        self.allocation = Allocation::Empty;
    }

    /// Bring resources in line with `shape`, dropping history on any change
    fn ensure_resources(&mut self, shape: FrameShape) -> PipelineResult<bool> {
        let current = match &self.allocation {
            Allocation::Empty => None,
            Allocation::Degenerate { shape, .. } | Allocation::Ready { shape } => Some(*shape),
        };
        if current == Some(shape) {
            return Ok(false);
        }

        info!(
            width = shape.width,
            height = shape.height,
            capacity = shape.capacity,
            previous = ?current,
            "Allocating pipeline resources"
        );

        self.reset();
        if shape.is_degenerate() {
            self.allocation = Allocation::Degenerate {
                shape,
                cursor: RingCursor::new(shape.capacity),
            };
            return Ok(true);
        }

        self.engine
            .allocate(shape.width, shape.height, shape.capacity)?;
        self.allocation = Allocation::Ready { shape };
        Ok(true)
    }

    /// Run every stage for one packed RGBA8 frame and write the result to `output`
    ///
    /// `input` and `output` must both be `width * height * 4` bytes. Nothing is
    /// mutated when they are not, and `output` is only written on success.
    pub fn incorporate(
        &mut self,
        width: u32,
        height: u32,
        input: &[u8],
        output: &mut [u8],
    ) -> PipelineResult<FrameStats> {
        let started = Instant::now();

        let expected = pixel::frame_len(width, height);
        if input.len() != expected || output.len() != expected {
            return Err(PipelineError::SizeMismatch {
                expected,
                input: input.len(),
                output: output.len(),
            });
        }

        let shape = FrameShape {
            width,
            height,
            capacity: self.config.max_layers,
        };

        match self.run_stages(shape, input, output) {
            Ok((reallocated, brightness, gain)) => {
                let stats = FrameStats {
                    frame_index: self.total_ingested(),
                    active_layers: self.active_layer_count(),
                    brightness,
                    gain,
                    reallocated,
                    elapsed: started.elapsed(),
                };
                debug!(
                    frame = stats.frame_index,
                    active_layers = stats.active_layers,
                    brightness = ?stats.brightness,
                    gain = stats.gain,
                    elapsed_us = stats.elapsed.as_micros() as u64,
                    "Frame incorporated"
                );
                Ok(stats)
            }
            Err(e) => {
                // Whatever was half-written is unusable; the next call starts clean
                self.reset();
                Err(e)
            }
        }
    }

    fn run_stages(
        &mut self,
        shape: FrameShape,
        input: &[u8],
        output: &mut [u8],
    ) -> PipelineResult<(bool, Option<f32>, f32)> {
        let reallocated = self.ensure_resources(shape)?;

        if let Allocation::Degenerate { cursor, .. } = &mut self.allocation {
            cursor.advance();
            return Ok((reallocated, None, 1.0));
        }

        self.engine.write_layer(input)?;
        self.engine
            .aggregate(self.config.aggregation_policy, self.config.epsilon)?;

        let (brightness, gain) = if self.config.tone_map_policy.needs_exposure() {
            let aggregate = self.engine.aggregate_snapshot()?;
            let brightness = self.analyzer.analyze(aggregate, shape.width, shape.height);
            (Some(brightness), self.gain.apply(brightness))
        } else {
            (None, 1.0)
        };

        let transform = ToneTransform::resolve(self.config.tone_map_policy, gain);
        let mapped = self.engine.tone_map(transform)?;
        output.copy_from_slice(mapped);

        Ok((reallocated, brightness, gain))
    }

    /// Incorporate a source frame, honouring its stride, into a new buffer
    pub fn incorporate_frame(&mut self, frame: &Frame) -> PipelineResult<(Vec<u8>, FrameStats)> {
        let tight = frame.packed()?;
        let mut output = vec![0u8; tight.len()];
        let stats = self.incorporate(frame.width, frame.height, &tight, &mut output)?;
        Ok((output, stats))
    }
}
