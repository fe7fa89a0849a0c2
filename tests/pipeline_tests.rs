// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end behaviour of the frame pipeline on the CPU engine

use lowlight::{
    AggregationPolicy, BackendKind, BrightnessMetric, CpuEngine, FramePipeline, FrameStats,
    LayerRingBuffer, PipelineConfig, PipelineError, ToneMapPolicy,
};

fn cpu_pipeline(config: PipelineConfig) -> FramePipeline {
    FramePipeline::with_engine(config, Box::new(CpuEngine::new()))
}

fn flat(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    rgba.repeat((width * height) as usize)
}

fn run(pipeline: &mut FramePipeline, width: u32, height: u32, frames: &[[u8; 4]]) -> Vec<u8> {
    let mut output = vec![0u8; (width * height * 4) as usize];
    for rgba in frames {
        pipeline
            .incorporate(width, height, &flat(width, height, *rgba), &mut output)
            .unwrap();
    }
    output
}

/// Like [`run`], also returning the stats of the last frame
fn run_with_stats(
    pipeline: &mut FramePipeline,
    width: u32,
    height: u32,
    frames: &[[u8; 4]],
) -> (Vec<u8>, FrameStats) {
    let mut output = vec![0u8; (width * height * 4) as usize];
    let mut last = None;
    for rgba in frames {
        let stats = pipeline
            .incorporate(width, height, &flat(width, height, *rgba), &mut output)
            .unwrap();
        last = Some(stats);
    }
    (output, last.expect("at least one frame"))
}

#[test]
fn test_output_length_matches_frame() {
    let mut pipeline = cpu_pipeline(PipelineConfig::default());
    for (width, height) in [(1, 1), (7, 3), (32, 18)] {
        let output = run(&mut pipeline, width, height, &[[40, 30, 20, 255]]);
        assert_eq!(output.len(), (width * height * 4) as usize);
    }
}

#[test]
fn test_size_mismatch_does_not_disturb_history() {
    let config = PipelineConfig {
        max_layers: 4,
        ..Default::default()
    };
    let mut reference = cpu_pipeline(config.clone());
    let mut interrupted = cpu_pipeline(config);

    let frames = [[20, 40, 60, 255], [22, 41, 59, 255]];
    run(&mut reference, 8, 8, &frames);
    run(&mut interrupted, 8, 8, &frames);

    let mut output = vec![0u8; 256];
    let err = interrupted
        .incorporate(8, 8, &[0u8; 255], &mut output)
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::SizeMismatch {
            expected: 256,
            input: 255,
            output: 256
        }
    ));
    assert_eq!(interrupted.active_layer_count(), 2);

    let next = [[200, 10, 10, 255]];
    assert_eq!(run(&mut reference, 8, 8, &next), run(&mut interrupted, 8, 8, &next));
}

#[test]
fn test_ring_keeps_only_last_k_layers() {
    const K: usize = 4;
    let mut ring = LayerRingBuffer::new(2, 2, K).unwrap();
    assert_eq!(ring.capacity(), K);

    for marker in 1..=(K as u8 + 2) {
        ring.write(&flat(2, 2, [marker; 4])).unwrap();
        assert_eq!(ring.active_layer_count(), (marker as usize).min(K));
    }

    let markers: Vec<u8> = ring.active_layers().map(|layer| layer[0]).collect();
    assert_eq!(markers, vec![3, 4, 5, 6]);
}

#[test]
fn test_active_layer_count_saturates() {
    let mut pipeline = cpu_pipeline(PipelineConfig {
        max_layers: 3,
        ..Default::default()
    });
    let mut counts = Vec::new();
    for _ in 0..5 {
        run(&mut pipeline, 4, 4, &[[10, 10, 10, 255]]);
        counts.push(pipeline.active_layer_count());
    }
    assert_eq!(counts, vec![1, 2, 3, 3, 3]);
    assert_eq!(pipeline.total_ingested(), 5);
}

#[test]
fn test_constant_input_is_a_fixed_point() {
    let mut pipeline = cpu_pipeline(PipelineConfig {
        tone_map_policy: ToneMapPolicy::None,
        ..Default::default()
    });
    let color = [90, 140, 30, 255];
    let expected = flat(6, 6, color);

    for _ in 0..12 {
        let output = run(&mut pipeline, 6, 6, &[color]);
        assert_eq!(output, expected);
    }
}

#[test]
fn test_weighted_policy_suppresses_outlier() {
    let a = [20, 20, 20, 255];
    let b = [255, 255, 255, 255];
    let sequence = [a, a, a, b];

    let weighted = run(
        &mut cpu_pipeline(PipelineConfig {
            max_layers: 4,
            aggregation_policy: AggregationPolicy::WeightedRobust,
            tone_map_policy: ToneMapPolicy::None,
            ..Default::default()
        }),
        4,
        4,
        &sequence,
    );
    let average = run(
        &mut cpu_pipeline(PipelineConfig {
            max_layers: 4,
            aggregation_policy: AggregationPolicy::PlainAverage,
            tone_map_policy: ToneMapPolicy::None,
            ..Default::default()
        }),
        4,
        4,
        &sequence,
    );

    // (3 * 20 + 255) / 4 = 78.75
    assert_eq!(average[0], 79);
    assert!(weighted[0] <= 21, "weighted moved to {}", weighted[0]);
    assert!(weighted[0].abs_diff(a[0]) < average[0].abs_diff(a[0]));
}

#[test]
fn test_black_roi_yields_unit_gain() {
    for metric in [BrightnessMetric::MaxChannel, BrightnessMetric::PerceivedLightness] {
        let mut pipeline = cpu_pipeline(PipelineConfig {
            brightness_metric: metric,
            ..Default::default()
        });
        let input = flat(8, 8, [0, 0, 0, 255]);
        let mut output = vec![0u8; input.len()];
        let stats = pipeline.incorporate(8, 8, &input, &mut output).unwrap();

        assert_eq!(stats.gain, 1.0);
        assert!(stats.gain.is_finite());
        assert_eq!(output, input);
    }
}

#[test]
fn test_resize_resets_history() {
    const K: usize = 4;
    let mut pipeline = cpu_pipeline(PipelineConfig {
        max_layers: K,
        ..Default::default()
    });
    for _ in 0..K {
        run(&mut pipeline, 8, 8, &[[50, 50, 50, 255]]);
    }
    assert_eq!(pipeline.active_layer_count(), K);

    run(&mut pipeline, 10, 6, &[[50, 50, 50, 255]]);
    assert_eq!(pipeline.active_layer_count(), 1);
    assert_eq!(pipeline.dimensions(), Some((10, 6)));
}

#[test]
fn test_plain_average_of_primaries() {
    let mut pipeline = cpu_pipeline(PipelineConfig {
        max_layers: 4,
        aggregation_policy: AggregationPolicy::PlainAverage,
        tone_map_policy: ToneMapPolicy::None,
        ..Default::default()
    });
    let output = run(
        &mut pipeline,
        8,
        8,
        &[
            [255, 0, 0, 255],
            [0, 255, 0, 255],
            [0, 0, 255, 255],
            [0, 0, 0, 255],
        ],
    );

    // 63.75 rounds to 64
    assert_eq!(output, flat(8, 8, [64, 64, 64, 255]));
}

#[test]
fn test_gain_brightens_dim_scene() {
    let mut pipeline = cpu_pipeline(PipelineConfig {
        brightness_metric: BrightnessMetric::MaxChannel,
        ..Default::default()
    });
    let input = flat(16, 16, [32, 24, 8, 255]);
    let mut output = vec![0u8; input.len()];
    let stats = pipeline.incorporate(16, 16, &input, &mut output).unwrap();

    // 255 / 32 in normalized units brings red to full scale
    assert!((stats.gain - 255.0 / 32.0).abs() < 1e-3);
    assert_eq!(&output[..4], &[255, 191, 64, 255]);
}

#[test]
fn test_resize_resets_gain_smoothing() {
    let mut pipeline = cpu_pipeline(PipelineConfig {
        brightness_metric: BrightnessMetric::MaxChannel,
        gain_smoothing: Some(0.5),
        ..Default::default()
    });

    let (_, first) = run_with_stats(&mut pipeline, 8, 8, &[[51, 0, 0, 255]]);
    assert!((first.gain - 5.0).abs() < 1e-3, "first gain {}", first.gain);

    // Blending with the old size's history would give 3.0
    let (_, resized) = run_with_stats(&mut pipeline, 10, 10, &[[255, 0, 0, 255]]);
    assert!(resized.reallocated);
    assert!((resized.gain - 1.0).abs() < 1e-3, "resized gain {}", resized.gain);
}

#[test]
fn test_reset_clears_gain_smoothing() {
    let mut pipeline = cpu_pipeline(PipelineConfig {
        brightness_metric: BrightnessMetric::MaxChannel,
        gain_smoothing: Some(0.5),
        ..Default::default()
    });

    run_with_stats(&mut pipeline, 8, 8, &[[51, 0, 0, 255]]);
    pipeline.reset();
    assert_eq!(pipeline.active_layer_count(), 0);

    let (_, after) = run_with_stats(&mut pipeline, 8, 8, &[[255, 0, 0, 255]]);
    assert!((after.gain - 1.0).abs() < 1e-3, "gain after reset {}", after.gain);
}

#[test]
fn test_gpu_engine_matches_cpu() {
    let cases = [
        (AggregationPolicy::WeightedRobust, ToneMapPolicy::GainMultiply),
        (
            AggregationPolicy::WeightedRobust,
            ToneMapPolicy::FixedGamma { exponent: 0.5 },
        ),
        (AggregationPolicy::PlainAverage, ToneMapPolicy::None),
    ];
    let frames = [
        [40, 30, 20, 255],
        [42, 31, 19, 255],
        [38, 29, 21, 255],
        [200, 10, 10, 255],
    ];

    for (policy, tone_map) in cases {
        let config = PipelineConfig {
            max_layers: 4,
            aggregation_policy: policy,
            tone_map_policy: tone_map,
            backend: BackendKind::Gpu,
            ..Default::default()
        };
        let mut gpu = match FramePipeline::new(config.clone()) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                eprintln!("Skipping GPU comparison: {}", e);
                return;
            }
        };
        let mut cpu = cpu_pipeline(config);

        let (from_gpu, gpu_stats) = run_with_stats(&mut gpu, 17, 9, &frames);
        let (from_cpu, cpu_stats) = run_with_stats(&mut cpu, 17, 9, &frames);

        assert!(
            (gpu_stats.gain - cpu_stats.gain).abs() <= 1e-3 * cpu_stats.gain.max(1.0),
            "{:?}/{:?}: gpu gain {} vs cpu gain {}",
            policy,
            tone_map,
            gpu_stats.gain,
            cpu_stats.gain
        );
        for (g, c) in from_gpu.iter().zip(&from_cpu) {
            assert!(
                g.abs_diff(*c) <= 1,
                "{:?}/{:?}: gpu {} vs cpu {}",
                policy,
                tone_map,
                g,
                c
            );
        }
    }
}
