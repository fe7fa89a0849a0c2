// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline configuration
//!
//! Every interchangeable policy is a small tagged enum selected here; the
//! kernels match on these rather than carrying duplicated code paths.

use crate::constants::{self, exposure};
use crate::errors::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How active layers reduce into the aggregate estimate
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationPolicy {
    /// Inverse-distance weighted reduction, warm-started from the previous aggregate
    #[default]
    WeightedRobust,
    /// Arithmetic mean of the active layers
    PlainAverage,
}

/// Per-pixel score used by the ROI brightness analysis
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrightnessMetric {
    /// Max of R, G, B in normalized units
    MaxChannel,
    /// CIE L* of the sRGB-linearized luminance, 0-100
    #[default]
    PerceivedLightness,
}

impl BrightnessMetric {
    /// Gain target used when no explicit target is configured
    pub fn default_target(&self) -> f32 {
        match self {
            BrightnessMetric::MaxChannel => exposure::MAX_CHANNEL_TARGET,
            BrightnessMetric::PerceivedLightness => exposure::PERCEIVED_TARGET,
        }
    }
}

/// Final transform from aggregate to displayable output
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum ToneMapPolicy {
    /// Multiply RGB by the gain derived from ROI brightness
    #[default]
    GainMultiply,
    /// `c^exponent` per RGB channel; 0.5 brightens, 2.0 darkens
    FixedGamma { exponent: f32 },
    /// Aggregate converted to 8-bit unchanged
    None,
}

impl ToneMapPolicy {
    /// Whether this policy consumes the brightness/gain stage
    pub fn needs_exposure(&self) -> bool {
        matches!(self, ToneMapPolicy::GainMultiply)
    }
}

/// Parallel execution engine selection
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// GPU when an adapter is available, CPU otherwise
    #[default]
    Auto,
    /// rayon fan-out over scanlines
    Cpu,
    /// wgpu compute shaders; failing to get a device is fatal
    Gpu,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ring buffer capacity K
    pub max_layers: usize,
    pub aggregation_policy: AggregationPolicy,
    pub brightness_metric: BrightnessMetric,
    /// ROI radius as a fraction of `min(width, height)`
    pub roi_fraction: f32,
    pub tone_map_policy: ToneMapPolicy,
    /// Overrides the metric's default target when set
    pub target_brightness: Option<f32>,
    /// EMA factor for the applied gain; `None` recomputes gain fresh every frame
    pub gain_smoothing: Option<f32>,
    /// Distance floor of the weighted reduction
    pub epsilon: f32,
    pub backend: BackendKind,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_layers: constants::DEFAULT_MAX_LAYERS,
            aggregation_policy: AggregationPolicy::default(),
            brightness_metric: BrightnessMetric::default(),
            roi_fraction: constants::roi::TENTH,
            tone_map_policy: ToneMapPolicy::default(),
            target_brightness: None,
            gain_smoothing: None,
            epsilon: constants::DEFAULT_EPSILON,
            backend: BackendKind::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Target brightness in the units of the configured metric
    pub fn effective_target(&self) -> f32 {
        self.target_brightness
            .unwrap_or_else(|| self.brightness_metric.default_target())
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.max_layers == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_layers must be at least 1".to_string(),
            ));
        }
        if !(self.roi_fraction > 0.0 && self.roi_fraction <= 0.5) {
            return Err(PipelineError::InvalidConfig(format!(
                "roi_fraction must be in (0, 0.5], got {}",
                self.roi_fraction
            )));
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "epsilon must be positive, got {}",
                self.epsilon
            )));
        }
        if let ToneMapPolicy::FixedGamma { exponent } = self.tone_map_policy
            && !(exponent.is_finite() && exponent > 0.0)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "gamma exponent must be positive, got {}",
                exponent
            )));
        }
        if let Some(target) = self.target_brightness
            && !(target.is_finite() && target > 0.0)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "target_brightness must be positive, got {}",
                target
            )));
        }
        if let Some(alpha) = self.gain_smoothing
            && !(alpha > 0.0 && alpha <= 1.0)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "gain_smoothing must be in (0, 1], got {}",
                alpha
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_layers, 8);
        assert_eq!(config.effective_target(), 100.0);
    }

    #[test]
    fn test_max_channel_target() {
        let config = PipelineConfig {
            brightness_metric: BrightnessMetric::MaxChannel,
            ..Default::default()
        };
        assert_eq!(config.effective_target(), 1.0);
    }

    #[test]
    fn test_rejects_zero_layers() {
        let config = PipelineConfig {
            max_layers: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_bad_gamma_and_smoothing() {
        let gamma = PipelineConfig {
            tone_map_policy: ToneMapPolicy::FixedGamma { exponent: 0.0 },
            ..Default::default()
        };
        assert!(gamma.validate().is_err());

        let smoothing = PipelineConfig {
            gain_smoothing: Some(1.5),
            ..Default::default()
        };
        assert!(smoothing.validate().is_err());

        let roi = PipelineConfig {
            roi_fraction: f32::NAN,
            ..Default::default()
        };
        assert!(roi.validate().is_err());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{ "max_layers": 4, "tone_map_policy": { "kind": "fixed-gamma", "exponent": 0.5 } }"#,
        )
        .unwrap();
        assert_eq!(config.max_layers, 4);
        assert_eq!(
            config.tone_map_policy,
            ToneMapPolicy::FixedGamma { exponent: 0.5 }
        );
        assert_eq!(config.aggregation_policy, AggregationPolicy::WeightedRobust);
        assert_eq!(config.roi_fraction, 0.1);
    }
}
