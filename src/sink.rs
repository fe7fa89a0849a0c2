// SPDX-License-Identifier: GPL-3.0-only

//! Consumers of finished frames

use crate::constants::BYTES_PER_PIXEL;
use crate::errors::PipelineResult;
use crate::pipeline::FrameStats;
use std::time::Duration;
use tracing::info;

/// Receives each tone-mapped frame in presentation order
pub trait DisplaySink: Send {
    /// `buffer` holds `height` rows of `stride` bytes
    fn present(
        &mut self,
        buffer: &[u8],
        width: u32,
        height: u32,
        stride: u32,
        stats: &FrameStats,
    ) -> PipelineResult<()>;
}

/// Running totals over presented frames
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SinkSummary {
    pub frames: u64,
    pub total_elapsed: Duration,
    pub last_gain: Option<f32>,
    pub last_brightness: Option<f32>,
    /// Mean of the output's RGB channels in the last frame, in 8-bit units
    pub last_mean_level: f32,
}

impl SinkSummary {
    /// Mean processing time per frame in milliseconds
    pub fn mean_frame_ms(&self) -> f64 {
        if self.frames == 0 {
            return 0.0;
        }
        self.total_elapsed.as_secs_f64() * 1000.0 / self.frames as f64
    }
}

/// Sink that logs per-frame statistics and keeps a summary
#[derive(Debug, Default)]
pub struct StatsSink {
    summary: SinkSummary,
    /// Emit an info line every this many frames; 0 disables
    log_every: u64,
}

impl StatsSink {
    pub fn new(log_every: u64) -> Self {
        Self {
            summary: SinkSummary::default(),
            log_every,
        }
    }

    pub fn summary(&self) -> SinkSummary {
        self.summary
    }
}

fn mean_rgb_level(buffer: &[u8], width: u32, height: u32, stride: u32) -> f32 {
    let row_bytes = width as usize * BYTES_PER_PIXEL;
    let mut sum = 0u64;
    let mut count = 0u64;
    for row in buffer.chunks(stride.max(1) as usize).take(height as usize) {
        for px in row[..row_bytes.min(row.len())].chunks_exact(BYTES_PER_PIXEL) {
            sum += px[0] as u64 + px[1] as u64 + px[2] as u64;
            count += 3;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum as f32 / count as f32
    }
}

impl DisplaySink for StatsSink {
    fn present(
        &mut self,
        buffer: &[u8],
        width: u32,
        height: u32,
        stride: u32,
        stats: &FrameStats,
    ) -> PipelineResult<()> {
        let summary = &mut self.summary;
        summary.frames += 1;
        summary.total_elapsed += stats.elapsed;
        summary.last_gain = Some(stats.gain);
        summary.last_brightness = stats.brightness;
        summary.last_mean_level = mean_rgb_level(buffer, width, height, stride);

        if self.log_every > 0 && summary.frames % self.log_every == 0 {
            info!(
                frame = summary.frames,
                active_layers = stats.active_layers,
                gain = stats.gain,
                brightness = ?stats.brightness,
                mean_level = summary.last_mean_level,
                elapsed_ms = stats.elapsed.as_secs_f64() * 1000.0,
                "Frame presented"
            );
        }
        Ok(())
    }
}
