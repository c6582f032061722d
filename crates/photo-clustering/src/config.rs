//! Tunables shared by the grouping and hashing algorithms

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Maximum gap between consecutive photos of one burst (seconds)
    pub burst_gap_secs: i64,
    /// Minimum number of photos that make a burst
    pub min_burst_size: usize,
    /// Largest Hamming distance at which two fingerprints are near-duplicates
    pub hash_distance_threshold: u32,
    /// Classifier entries scoring below this are never used for a category
    pub min_top_score: f32,
    /// Decimal places kept when bucketing coordinates
    pub location_round_decimals: u32,
    /// Number of ranked classifier outputs kept per photo
    pub top_k: usize,
    pub hash_grid: HashGrid,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            burst_gap_secs: 20,
            min_burst_size: 2,
            hash_distance_threshold: 10,
            min_top_score: 0.07,
            location_round_decimals: 2,
            top_k: 5,
            hash_grid: HashGrid::default(),
        }
    }
}

/// Pixel grid the difference hash is computed over.
///
/// Each row yields `width - 1` bits, so the default 9x8 grid fills a u64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashGrid {
    pub width: u32,
    pub height: u32,
}

impl HashGrid {
    pub fn bit_count(&self) -> u32 {
        self.width.saturating_sub(1) * self.height
    }
}

impl Default for HashGrid {
    fn default() -> Self {
        Self { width: 9, height: 8 }
    }
}
