// SPDX-License-Identifier: GPL-3.0-only
//! Aggregate -> 8-bit output transform

use crate::config::ToneMapPolicy;
use crate::pixel::{self, Rgba};
use rayon::prelude::*;

/// Tone-map policy resolved against this frame's gain
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ToneTransform {
    /// RGB scaled by the gain
    Multiply(f32),
    /// RGB raised to a fixed exponent
    Gamma(f32),
    Identity,
}

impl ToneTransform {
    pub fn resolve(policy: ToneMapPolicy, gain: f32) -> Self {
        match policy {
            ToneMapPolicy::GainMultiply => ToneTransform::Multiply(gain),
            ToneMapPolicy::FixedGamma { exponent } => ToneTransform::Gamma(exponent),
            ToneMapPolicy::None => ToneTransform::Identity,
        }
    }

    /// Mode index shared with `tonemap.wgsl`
    pub fn mode(&self) -> u32 {
        match self {
            ToneTransform::Identity => 0,
            ToneTransform::Multiply(_) => 1,
            ToneTransform::Gamma(_) => 2,
        }
    }

    /// Gain or exponent, 1.0 for identity
    pub fn factor(&self) -> f32 {
        match self {
            ToneTransform::Multiply(gain) => *gain,
            ToneTransform::Gamma(exponent) => *exponent,
            ToneTransform::Identity => 1.0,
        }
    }
}

/// Alpha passes through unchanged under every transform.
#[inline]
pub fn tone_map_pixel(value: &Rgba, transform: ToneTransform) -> Rgba {
    match transform {
        ToneTransform::Multiply(gain) => [value[0] * gain, value[1] * gain, value[2] * gain, value[3]],
        ToneTransform::Gamma(exponent) => [
            value[0].max(0.0).powf(exponent),
            value[1].max(0.0).powf(exponent),
            value[2].max(0.0).powf(exponent),
            value[3],
        ],
        ToneTransform::Identity => *value,
    }
}

/// Write the tone-mapped aggregate into packed RGBA8 `output`
pub fn tone_map(aggregate: &[Rgba], width: usize, transform: ToneTransform, output: &mut [u8]) {
    if width == 0 {
        return;
    }

    output
        .par_chunks_mut(width * 4)
        .zip(aggregate.par_chunks(width))
        .for_each(|(out_row, row)| {
            for (out, value) in out_row.chunks_exact_mut(4).zip(row) {
                pixel::pack_into(&tone_map_pixel(value, transform), out);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiply_clamps_and_keeps_alpha() {
        let mut out = [0u8; 4];
        tone_map(
            &[[0.2, 0.6, 0.0, 1.0]],
            1,
            ToneTransform::Multiply(2.0),
            &mut out,
        );
        assert_eq!(out, [102, 255, 0, 255]);
    }

    #[test]
    fn test_gamma_brightens_below_one() {
        let mapped = tone_map_pixel(&[0.25, 0.0, 1.0, 0.5], ToneTransform::Gamma(0.5));
        assert!((mapped[0] - 0.5).abs() < 1e-6);
        assert_eq!(mapped[1], 0.0);
        assert_eq!(mapped[2], 1.0);
        assert_eq!(mapped[3], 0.5);

        let darker = tone_map_pixel(&[0.5, 0.5, 0.5, 1.0], ToneTransform::Gamma(2.0));
        assert!((darker[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_identity_rounds_to_nearest() {
        let mut out = [0u8; 8];
        tone_map(
            &[[0.25, 0.25, 0.25, 1.0], [0.0, 0.5, 1.0, 1.0]],
            2,
            ToneTransform::Identity,
            &mut out,
        );
        assert_eq!(out, [64, 64, 64, 255, 0, 128, 255, 255]);
    }

    #[test]
    fn test_resolve_policy() {
        assert_eq!(
            ToneTransform::resolve(ToneMapPolicy::GainMultiply, 3.0),
            ToneTransform::Multiply(3.0)
        );
        assert_eq!(
            ToneTransform::resolve(ToneMapPolicy::FixedGamma { exponent: 2.0 }, 3.0),
            ToneTransform::Gamma(2.0)
        );
        assert_eq!(ToneTransform::resolve(ToneMapPolicy::None, 3.0).factor(), 1.0);
    }
}
