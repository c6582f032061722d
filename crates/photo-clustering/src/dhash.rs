//! Difference hash (dHash) fingerprints and Hamming comparison
//!
//! The image is expected to be pre-cropped to a centered square and scaled to
//! the hash grid (9x8 by default). Each row contributes one bit per pair of
//! horizontally adjacent pixels: 1 when the left pixel is darker than the
//! right one. Bits are packed row-major, left to right, starting at bit 0.

use crate::config::HashGrid;
use crate::error::HashError;

/// Luminance of an RGB pixel using Rec. 601 weights
pub fn luminance(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// Compute the fingerprint of an RGBA buffer of exactly `grid` dimensions
pub fn dhash_rgba(rgba: &[u8], width: u32, height: u32, grid: HashGrid) -> Result<u64, HashError> {
    if grid.bit_count() > 64 {
        return Err(HashError::GridTooLarge {
            width: grid.width,
            height: grid.height,
        });
    }
    if width != grid.width || height != grid.height {
        return Err(HashError::SizeMismatch {
            expected_w: grid.width,
            expected_h: grid.height,
            actual_w: width,
            actual_h: height,
        });
    }

    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(HashError::BufferLength {
            expected,
            actual: rgba.len(),
        });
    }

    let lum: Vec<f64> = rgba
        .chunks_exact(4)
        .map(|px| luminance(px[0], px[1], px[2]))
        .collect();

    let w = width as usize;
    let mut hash = 0u64;
    let mut bit = 0u32;
    for y in 0..height as usize {
        let row = &lum[y * w..(y + 1) * w];
        for pair in row.windows(2) {
            if pair[0] < pair[1] {
                hash |= 1u64 << bit;
            }
            bit += 1;
        }
    }

    Ok(hash)
}

/// Number of differing bits between two fingerprints
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

pub fn is_near_duplicate(a: u64, b: u64, threshold: u32) -> bool {
    hamming_distance(a, b) <= threshold
}
