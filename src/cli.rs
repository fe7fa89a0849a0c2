// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Running a frame source through the pipeline
//! - Reporting the GPU adapter
//! - Printing the effective configuration

use clap::{Args, ValueEnum};
use lowlight::constants::exposure::DEFAULT_GAMMA;
use lowlight::{
    AggregationPolicy, BackendKind, BrightnessMetric, FramePipeline, FrameSource,
    ImageSequenceSource, PipelineConfig, ProcessingLoop, StatsSink, SyntheticSource,
    ToneMapPolicy,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{info, warn};

/// Synthetic frames produced when `--frames` is not given
const DEFAULT_SYNTHETIC_FRAMES: u64 = 120;
/// Synthetic frame size when neither `--input` nor `--synthetic` is given
const DEFAULT_SYNTHETIC_SIZE: (u32, u32) = (640, 480);
/// Frames between per-frame log lines
const LOG_EVERY: u64 = 30;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PolicyArg {
    WeightedRobust,
    PlainAverage,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum MetricArg {
    MaxChannel,
    PerceivedLightness,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ToneMapArg {
    GainMultiply,
    FixedGamma,
    None,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum BackendArg {
    Auto,
    Cpu,
    Gpu,
}

/// Flags that override values from the configuration file
#[derive(Args, Debug, Default)]
pub struct ConfigOverrides {
    /// Ring buffer capacity (frames kept for aggregation)
    #[arg(short, long)]
    layers: Option<usize>,

    /// How layers are combined
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Brightness score used for auto-exposure
    #[arg(long, value_enum)]
    metric: Option<MetricArg>,

    /// Final transform applied to the aggregate
    #[arg(long, value_enum)]
    tone_map: Option<ToneMapArg>,

    /// Exponent for fixed-gamma tone mapping (implies --tone-map fixed-gamma)
    #[arg(long)]
    gamma: Option<f32>,

    /// ROI radius as a fraction of the shorter frame edge
    #[arg(long)]
    roi: Option<f32>,

    /// Brightness the gain aims for, in the metric's units
    #[arg(long)]
    target: Option<f32>,

    /// Gain smoothing factor in (0, 1]
    #[arg(long)]
    smoothing: Option<f32>,

    /// Execution engine
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,
}

impl ConfigOverrides {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(layers) = self.layers {
            config.max_layers = layers;
        }
        if let Some(policy) = self.policy {
            config.aggregation_policy = match policy {
                PolicyArg::WeightedRobust => AggregationPolicy::WeightedRobust,
                PolicyArg::PlainAverage => AggregationPolicy::PlainAverage,
            };
        }
        if let Some(metric) = self.metric {
            config.brightness_metric = match metric {
                MetricArg::MaxChannel => BrightnessMetric::MaxChannel,
                MetricArg::PerceivedLightness => BrightnessMetric::PerceivedLightness,
            };
        }

        let current_gamma = match config.tone_map_policy {
            ToneMapPolicy::FixedGamma { exponent } => Some(exponent),
            _ => None,
        };
        match (self.tone_map, self.gamma) {
            (Some(ToneMapArg::GainMultiply), _) => config.tone_map_policy = ToneMapPolicy::GainMultiply,
            (Some(ToneMapArg::None), _) => config.tone_map_policy = ToneMapPolicy::None,
            (Some(ToneMapArg::FixedGamma), gamma) | (None, gamma @ Some(_)) => {
                config.tone_map_policy = ToneMapPolicy::FixedGamma {
                    exponent: gamma.or(current_gamma).unwrap_or(DEFAULT_GAMMA),
                };
            }
            (None, None) => {}
        }

        if let Some(roi) = self.roi {
            config.roi_fraction = roi;
        }
        if self.target.is_some() {
            config.target_brightness = self.target;
        }
        if self.smoothing.is_some() {
            config.gain_smoothing = self.smoothing;
        }
        if let Some(backend) = self.backend {
            config.backend = match backend {
                BackendArg::Auto => BackendKind::Auto,
                BackendArg::Cpu => BackendKind::Cpu,
                BackendArg::Gpu => BackendKind::Gpu,
            };
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of still images, processed in file-name order
    #[arg(short, long, conflicts_with = "synthetic")]
    input: Option<PathBuf>,

    /// Generate a synthetic low-light scene of this size, e.g. 640x480
    #[arg(long, value_parser = parse_dimensions)]
    synthetic: Option<(u32, u32)>,

    /// Stop after this many frames
    #[arg(short, long)]
    frames: Option<u64>,

    /// Seed for the synthetic scene
    #[arg(long, default_value = "1")]
    seed: u64,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

/// Parse `WIDTHxHEIGHT`
fn parse_dimensions(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", value))?;
    let width = width
        .trim()
        .parse()
        .map_err(|e| format!("invalid width '{}': {}", width, e))?;
    let height = height
        .trim()
        .parse()
        .map_err(|e| format!("invalid height '{}': {}", height, e))?;
    Ok((width, height))
}

fn effective_config(
    path: Option<PathBuf>,
    overrides: &ConfigOverrides,
) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(&path)?,
        None => PipelineConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Process frames until the source ends, `--frames` is reached or Ctrl-C
pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = effective_config(args.config, &args.overrides)?;

    let mut source: Box<dyn FrameSource> = match args.input {
        Some(dir) => Box::new(ImageSequenceSource::open(&dir)?),
        None => {
            let (width, height) = args.synthetic.unwrap_or(DEFAULT_SYNTHETIC_SIZE);
            let frames = args.frames.unwrap_or(DEFAULT_SYNTHETIC_FRAMES);
            Box::new(SyntheticSource::new(width, height, Some(frames), args.seed))
        }
    };
    let limit = args.frames.unwrap_or(u64::MAX);

    let pipeline = FramePipeline::new(config)?;
    println!("Source:  {}", source.describe());
    println!("Engine:  {}", pipeline.backend());
    println!("Layers:  {}", pipeline.config().max_layers);
    println!("Press Ctrl+C to stop");
    println!();

    let stop_signal = Arc::new(AtomicBool::new(false));
    let handler_signal = Arc::clone(&stop_signal);
    ctrlc::set_handler(move || {
        handler_signal.store(true, Ordering::SeqCst);
    })?;

    let processing =
        ProcessingLoop::with_stop_signal(pipeline, StatsSink::new(LOG_EVERY), stop_signal);
    let started = Instant::now();
    let mut submitted = 0u64;

    while submitted < limit && processing.is_running() {
        let frame = match source.next_frame() {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                warn!(error = %e, "Frame source error, skipping");
                continue;
            }
            None => break,
        };
        if let Err(e) = processing.submit(frame) {
            info!(error = %e, "Processing loop no longer accepting frames");
            break;
        }
        submitted += 1;
    }

    let report = processing.finish()?;
    let summary = report.sink.summary();
    let wall = started.elapsed();

    println!(
        "Processed {} frames ({} skipped) in {:.2}s",
        report.processed,
        report.skipped,
        wall.as_secs_f64()
    );
    println!("Mean:       {:.2} ms/frame", summary.mean_frame_ms());
    match summary.last_gain {
        Some(gain) => println!("Last gain:  {:.3}", gain),
        None => println!("Last gain:  n/a"),
    }

    if let Some(e) = report.fatal {
        return Err(e.into());
    }
    Ok(())
}

/// Report the adapter the GPU engine would be created on
pub fn show_adapter() -> Result<(), Box<dyn std::error::Error>> {
    match pollster::block_on(lowlight::gpu::query_adapter()) {
        Ok(info) => {
            println!("Adapter: {}", info.name);
            println!("Backend: {:?}", info.backend);
            println!("Type:    {:?}", info.device_type);
            if !info.driver.is_empty() {
                println!("Driver:  {} {}", info.driver, info.driver_info);
            }
        }
        Err(e) => {
            println!("No GPU adapter available: {}", e);
            println!("The CPU engine will be used with --backend auto.");
        }
    }
    Ok(())
}

/// Print the configuration `run` would use
pub fn print_config(
    path: Option<PathBuf>,
    overrides: ConfigOverrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = effective_config(path, &overrides)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
