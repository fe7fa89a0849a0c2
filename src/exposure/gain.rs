// SPDX-License-Identifier: GPL-3.0-only
//! Gain derived from ROI brightness
//!
//! The baseline recomputes the gain fresh every frame. [`GainSmoother`] adds
//! an optional exponential moving average to damp visible flicker.

use tracing::trace;

/// `target / brightness`, or 1.0 when that would not be a finite positive number
#[inline]
pub fn compute_gain(brightness: f32, target: f32) -> f32 {
    if !(brightness > 0.0) || !brightness.is_finite() {
        return 1.0;
    }
    let gain = target / brightness;
    if gain.is_finite() && gain > 0.0 {
        gain
    } else {
        1.0
    }
}

/// Exponential moving average over successive gains
#[derive(Clone, Copy, Debug)]
pub struct GainSmoother {
    alpha: f32,
    current: Option<f32>,
}

impl GainSmoother {
    /// `alpha` in (0, 1]; 1.0 follows the fresh gain exactly
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha,
            current: None,
        }
    }

    /// Blend `fresh` into the running value; the first call seeds it
    pub fn update(&mut self, fresh: f32) -> f32 {
        let next = match self.current {
            Some(previous) => previous + self.alpha * (fresh - previous),
            None => fresh,
        };
        self.current = Some(next);
        next
    }

    pub fn current(&self) -> Option<f32> {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// Gain stage: target, plus optional smoothing state
#[derive(Clone, Copy, Debug)]
pub struct GainCompute {
    target: f32,
    smoother: Option<GainSmoother>,
}

impl GainCompute {
    pub fn new(target: f32, smoothing: Option<f32>) -> Self {
        Self {
            target,
            smoother: smoothing.map(GainSmoother::new),
        }
    }

    /// Gain to apply for this frame's ROI brightness
    pub fn apply(&mut self, brightness: f32) -> f32 {
        let fresh = compute_gain(brightness, self.target);
        let applied = match self.smoother.as_mut() {
            Some(smoother) => smoother.update(fresh),
            None => fresh,
        };
        trace!(brightness, fresh, applied, "Gain computed");
        applied
    }

    /// Forget smoothing history
    pub fn reset(&mut self) {
        if let Some(smoother) = self.smoother.as_mut() {
            smoother.reset();
        }
    }
}
