// SPDX-License-Identifier: GPL-3.0-only
//! Center-weighted brightness analysis
//!
//! Samples a disc at the frame center and reports the brightest pixel in
//! it. Only the small ROI is scanned; the rest of the aggregate is skipped
//! row by row.

use crate::config::BrightnessMetric;
use crate::constants::cie;
use crate::pixel::Rgba;
use tracing::debug;

/// Circular region of interest in pixel coordinates
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Roi {
    pub center_x: f32,
    pub center_y: f32,
    pub radius: f32,
}

impl Roi {
    /// Disc centered at `(width/2, height/2)` with radius `min(width, height) * fraction`
    pub fn centered(width: u32, height: u32, fraction: f32) -> Self {
        Self {
            center_x: width as f32 / 2.0,
            center_y: height as f32 / 2.0,
            radius: width.min(height) as f32 * fraction,
        }
    }

    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        let dx = x as f32 - self.center_x;
        let dy = y as f32 - self.center_y;
        dx * dx + dy * dy <= self.radius * self.radius
    }

    /// Rows that can intersect the disc, clipped to the frame
    fn row_range(&self, height: u32) -> std::ops::Range<u32> {
        let top = (self.center_y - self.radius).floor().max(0.0) as u32;
        let bottom = ((self.center_y + self.radius).ceil() as u32 + 1).min(height);
        top.min(bottom)..bottom
    }
}

/// Brightest of R, G, B, in [0, 1]
#[inline]
pub fn max_channel(pixel: &Rgba) -> f32 {
    pixel[0].max(pixel[1]).max(pixel[2])
}

/// sRGB inverse gamma for one channel
#[inline]
fn linearize(channel: f64) -> f64 {
    if channel <= cie::SRGB_LINEAR_THRESHOLD {
        channel / cie::SRGB_LINEAR_SLOPE
    } else {
        ((channel + 0.055) / 1.055).powf(2.4)
    }
}

/// CIE L* (0-100) of the pixel's relative luminance
pub fn perceived_lightness(pixel: &Rgba) -> f32 {
    let luminance = cie::LUMA_R * linearize(pixel[0].clamp(0.0, 1.0) as f64)
        + cie::LUMA_G * linearize(pixel[1].clamp(0.0, 1.0) as f64)
        + cie::LUMA_B * linearize(pixel[2].clamp(0.0, 1.0) as f64);

    let lightness = if luminance <= cie::EPSILON {
        luminance * cie::KAPPA
    } else {
        luminance.cbrt() * 116.0 - 16.0
    };
    lightness as f32
}

/// ROI brightness analysis over an aggregate estimate
#[derive(Clone, Copy, Debug)]
pub struct BrightnessAnalyzer {
    metric: BrightnessMetric,
    roi_fraction: f32,
}

impl BrightnessAnalyzer {
    pub fn new(metric: BrightnessMetric, roi_fraction: f32) -> Self {
        Self {
            metric,
            roi_fraction,
        }
    }

    #[inline]
    pub fn score(&self, pixel: &Rgba) -> f32 {
        match self.metric {
            BrightnessMetric::MaxChannel => max_channel(pixel),
            BrightnessMetric::PerceivedLightness => perceived_lightness(pixel),
        }
    }

    /// Maximum per-pixel score inside the ROI
    ///
    /// Returns 0.0 when the ROI holds no pixel (tiny frames) so the gain stage
    /// falls back to pass-through. Must not be called with zero dimensions.
    pub fn analyze(&self, aggregate: &[Rgba], width: u32, height: u32) -> f32 {
        debug_assert!(width > 0 && height > 0);
        debug_assert_eq!(aggregate.len(), width as usize * height as usize);

        let roi = Roi::centered(width, height, self.roi_fraction);
        let mut brightest = 0.0f32;
        let mut sampled = 0usize;

        for y in roi.row_range(height) {
            let row = &aggregate[(y * width) as usize..((y + 1) * width) as usize];
            for (x, pixel) in row.iter().enumerate() {
                if !roi.contains(x as u32, y) {
                    continue;
                }
                sampled += 1;
                brightest = brightest.max(self.score(pixel));
            }
        }

        debug!(
            metric = ?self.metric,
            radius = roi.radius,
            sampled,
            brightest,
            "ROI brightness analyzed"
        );
        brightest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perceived_lightness_endpoints() {
        assert!(perceived_lightness(&[0.0, 0.0, 0.0, 1.0]).abs() < 1e-4);
        assert!((perceived_lightness(&[1.0, 1.0, 1.0, 1.0]) - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_perceived_lightness_mid_gray() {
        // sRGB 50% gray is ~53.4 L*
        let l = perceived_lightness(&[0.5, 0.5, 0.5, 1.0]);
        assert!((l - 53.39).abs() < 0.1, "got {}", l);
    }

    #[test]
    fn test_perceived_lightness_linear_segment() {
        // 0.01 sits below the sRGB threshold and the CIE epsilon
        let expected = (0.01 / 12.92 * 24389.0 / 27.0) as f32;
        let l = perceived_lightness(&[0.01, 0.01, 0.01, 1.0]);
        assert!((l - expected).abs() < 1e-4);
    }

    #[test]
    fn test_green_dominates_luminance() {
        let green = perceived_lightness(&[0.0, 1.0, 0.0, 1.0]);
        let blue = perceived_lightness(&[0.0, 0.0, 1.0, 1.0]);
        assert!(green > blue);
    }

    #[test]
    fn test_roi_excludes_outside_pixels() {
        let (width, height) = (20u32, 20u32);
        let mut aggregate = vec![[0.1f32, 0.1, 0.1, 1.0]; 400];
        // Bright corner pixel must not be seen
        aggregate[0] = [1.0, 1.0, 1.0, 1.0];
        // Center pixel is inside the 2px radius
        aggregate[(10 * width + 10) as usize] = [0.4, 0.3, 0.2, 1.0];

        let analyzer = BrightnessAnalyzer::new(BrightnessMetric::MaxChannel, 0.1);
        let brightest = analyzer.analyze(&aggregate, width, height);
        assert!((brightest - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_wider_roi_sees_more() {
        let (width, height) = (40u32, 40u32);
        let mut aggregate = vec![[0.0f32; 4]; 1600];
        // 5px right of center: outside r=4 (1/10), inside r=5 (1/8)
        aggregate[(20 * width + 25) as usize] = [0.0, 0.0, 0.8, 1.0];

        let tenth = BrightnessAnalyzer::new(BrightnessMetric::MaxChannel, 0.1);
        let eighth = BrightnessAnalyzer::new(BrightnessMetric::MaxChannel, 0.125);
        assert_eq!(tenth.analyze(&aggregate, width, height), 0.0);
        assert!((eighth.analyze(&aggregate, width, height) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_single_pixel_frame_has_empty_roi() {
        let analyzer = BrightnessAnalyzer::new(BrightnessMetric::MaxChannel, 0.1);
        assert_eq!(analyzer.analyze(&[[1.0; 4]], 1, 1), 0.0);
    }
}
