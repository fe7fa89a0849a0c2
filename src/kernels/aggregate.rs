// SPDX-License-Identifier: GPL-3.0-only
//! Temporal aggregation of the active layers
//!
//! The weighted policy is one Weiszfeld step toward the geometric median of
//! the layer samples, seeded with last frame's estimate. Run once per frame
//! it converges over successive frames, so transient outliers barely move
//! the estimate while a steady scene settles on its exact color.

use crate::config::AggregationPolicy;
use crate::pixel::{self, Rgba};
use crate::ring_buffer::LayerRingBuffer;
use rayon::prelude::*;

/// One inverse-distance weighted step from `prev` over `samples`
///
/// `new = sum(v_i / d_i) / sum(1 / d_i)` with `d_i = max(epsilon, |v_i - prev|)`.
#[inline]
pub fn weighted_pixel<I>(samples: I, prev: &Rgba, epsilon: f32) -> Rgba
where
    I: IntoIterator<Item = Rgba>,
{
    let mut numerator = [0.0f32; 4];
    let mut denominator = 0.0f32;

    for sample in samples {
        let weight = 1.0 / pixel::distance(&sample, prev).max(epsilon);
        for (acc, channel) in numerator.iter_mut().zip(sample) {
            *acc += channel * weight;
        }
        denominator += weight;
    }

    if denominator == 0.0 {
        return *prev;
    }
    numerator.map(|n| n / denominator)
}

/// Arithmetic mean of `samples`
#[inline]
pub fn average_pixel<I>(samples: I) -> Rgba
where
    I: IntoIterator<Item = Rgba>,
{
    let mut sum = [0.0f32; 4];
    let mut count = 0u32;
    for sample in samples {
        for (acc, channel) in sum.iter_mut().zip(sample) {
            *acc += channel;
        }
        count += 1;
    }

    if count == 0 {
        return sum;
    }
    sum.map(|s| s / count as f32)
}

/// Reduce every active layer of `layers` into `aggregate`, one scanline per task
///
/// `aggregate` holds the previous estimate on entry (zeros on the first frame)
/// and the new estimate on return. Callers guarantee at least one active layer.
pub fn aggregate_layers(
    layers: &LayerRingBuffer,
    aggregate: &mut [Rgba],
    policy: AggregationPolicy,
    epsilon: f32,
) {
    let (width, _) = layers.dimensions();
    let width = width as usize;
    if width == 0 {
        return;
    }

    let active: Vec<&[u8]> = layers.active_layers().collect();
    debug_assert!(!active.is_empty(), "aggregation requires an active layer");

    aggregate
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, estimate) in row.iter_mut().enumerate() {
                let offset = (y * width + x) * 4;
                let samples = active
                    .iter()
                    .map(|layer| pixel::unpack(&layer[offset..offset + 4]));

                *estimate = match policy {
                    AggregationPolicy::WeightedRobust => weighted_pixel(samples, estimate, epsilon),
                    AggregationPolicy::PlainAverage => average_pixel(samples),
                };
            }
        });
}
