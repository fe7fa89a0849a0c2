// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration loading

use lowlight::{
    AggregationPolicy, BackendKind, BrightnessMetric, PipelineConfig, PipelineError, ToneMapPolicy,
};
use std::io::Write;

fn write_config(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_default() {
    let config = PipelineConfig::default();

    assert_eq!(config.max_layers, 8);
    assert_eq!(config.aggregation_policy, AggregationPolicy::WeightedRobust);
    assert_eq!(config.brightness_metric, BrightnessMetric::PerceivedLightness);
    assert_eq!(config.tone_map_policy, ToneMapPolicy::GainMultiply);
    assert_eq!(config.backend, BackendKind::Auto);
    assert_eq!(config.gain_smoothing, None);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_file_takes_defaults() {
    let file = write_config(
        r#"{
            "max_layers": 4,
            "aggregation_policy": "plain-average",
            "tone_map_policy": { "kind": "fixed-gamma", "exponent": 0.5 }
        }"#,
    );

    let config = PipelineConfig::load(file.path()).unwrap();
    assert_eq!(config.max_layers, 4);
    assert_eq!(config.aggregation_policy, AggregationPolicy::PlainAverage);
    assert_eq!(
        config.tone_map_policy,
        ToneMapPolicy::FixedGamma { exponent: 0.5 }
    );
    assert_eq!(config.brightness_metric, BrightnessMetric::PerceivedLightness);
    assert!((config.roi_fraction - 0.1).abs() < f32::EPSILON);
}

#[test]
fn test_file_values_are_validated() {
    let file = write_config(r#"{ "max_layers": 0 }"#);
    assert!(matches!(
        PipelineConfig::load(file.path()),
        Err(PipelineError::InvalidConfig(_))
    ));

    let file = write_config(r#"{ "gain_smoothing": 1.5 }"#);
    assert!(matches!(
        PipelineConfig::load(file.path()),
        Err(PipelineError::InvalidConfig(_))
    ));
}

#[test]
fn test_malformed_file_is_a_parse_error() {
    let file = write_config(r#"{ "max_layers": "many" }"#);
    assert!(matches!(
        PipelineConfig::load(file.path()),
        Err(PipelineError::Parse(_))
    ));
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        PipelineConfig::load(&dir.path().join("absent.json")),
        Err(PipelineError::Io(_))
    ));
}

#[test]
fn test_serialized_config_loads_back() {
    let config = PipelineConfig {
        max_layers: 6,
        brightness_metric: BrightnessMetric::MaxChannel,
        tone_map_policy: ToneMapPolicy::None,
        target_brightness: Some(0.8),
        gain_smoothing: Some(0.3),
        backend: BackendKind::Cpu,
        ..Default::default()
    };
    let file = write_config(&serde_json::to_string(&config).unwrap());
    assert_eq!(PipelineConfig::load(file.path()).unwrap(), config);
}
