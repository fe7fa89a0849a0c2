// SPDX-License-Identifier: GPL-3.0-only

//! Packed RGBA8 <-> normalized float conversions
//!
//! Channel order is whatever the frame source delivers; bytes are promoted
//! in place (byte 0 -> component 0) and packed back the same way, so the
//! order is identical on ingestion and emission.

use crate::constants::BYTES_PER_PIXEL;

/// Normalized 4-channel pixel, each component in [0, 1]
pub type Rgba = [f32; 4];

/// Byte length of a packed frame
#[inline]
pub fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// Promote one packed pixel to normalized floats
#[inline]
pub fn unpack(bytes: &[u8]) -> Rgba {
    [
        bytes[0] as f32 / 255.0,
        bytes[1] as f32 / 255.0,
        bytes[2] as f32 / 255.0,
        bytes[3] as f32 / 255.0,
    ]
}

/// Clamp to [0, 1] and round to the nearest 8-bit value
#[inline]
pub fn pack_channel(value: f32) -> u8 {
    // NaN clamps to 0 through the max/min chain
    (value.max(0.0).min(1.0) * 255.0).round() as u8
}

/// Pack a normalized pixel into `out[..4]`
#[inline]
pub fn pack_into(pixel: &Rgba, out: &mut [u8]) {
    out[0] = pack_channel(pixel[0]);
    out[1] = pack_channel(pixel[1]);
    out[2] = pack_channel(pixel[2]);
    out[3] = pack_channel(pixel[3]);
}

/// Euclidean distance in the 4-component color space
#[inline]
pub fn distance(a: &Rgba, b: &Rgba) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    let da = a[3] - b[3];
    (dr * dr + dg * dg + db * db + da * da).sqrt()
}

/// Copy `height` rows of `row_bytes` out of a strided buffer into a tight one
pub fn repack_rows(data: &[u8], stride: usize, row_bytes: usize, height: usize) -> Vec<u8> {
    let mut tight = Vec::with_capacity(row_bytes * height);
    for row in data.chunks(stride).take(height) {
        tight.extend_from_slice(&row[..row_bytes.min(row.len())]);
    }
    tight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_pack_preserves_channel_order() {
        let bytes = [10u8, 20, 30, 40];
        let mut out = [0u8; 4];
        pack_into(&unpack(&bytes), &mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn test_pack_clamps_and_rounds() {
        assert_eq!(pack_channel(-0.5), 0);
        assert_eq!(pack_channel(1.7), 255);
        assert_eq!(pack_channel(0.25), 64); // 63.75
        assert_eq!(pack_channel(f32::NAN), 0);
    }

    #[test]
    fn test_distance() {
        let a = [0.0, 0.0, 0.0, 1.0];
        let b = [1.0, 0.0, 0.0, 1.0];
        assert!((distance(&a, &b) - 1.0).abs() < 1e-6);
        assert_eq!(distance(&a, &a), 0.0);
    }

    #[test]
    fn test_repack_rows_drops_padding() {
        // 2x2 frame, stride 12 (4 bytes of padding per row)
        let mut data = vec![0u8; 24];
        data[0..8].copy_from_slice(&[1, 1, 1, 1, 2, 2, 2, 2]);
        data[12..20].copy_from_slice(&[3, 3, 3, 3, 4, 4, 4, 4]);
        let tight = repack_rows(&data, 12, 8, 2);
        assert_eq!(tight, vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4]);
    }
}
