//! Session policy constants

use photo_clustering::{BurstConfig, ClusterConfig};
use serde::{Deserialize, Serialize};

/// Caps and page sizes that keep background work bounded on large libraries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of newest photos loaded at bootstrap
    pub page_size: usize,
    pub max_photos_to_classify: usize,
    /// Side length the classifier loader is asked for
    pub classifier_input_size: u32,
    pub max_location_lookups: usize,
    pub max_photos_to_hash: usize,
    /// Hash results are published every this many photos
    pub hash_publish_every: usize,
    pub max_albums: usize,
    pub max_album_assets: usize,
    /// Burst gap used by the session, overriding `cluster.burst_gap_secs`
    pub burst_gap_secs: i64,
    pub cluster: ClusterConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            page_size: 60,
            max_photos_to_classify: 60,
            classifier_input_size: 224,
            max_location_lookups: 180,
            max_photos_to_hash: 120,
            hash_publish_every: 12,
            max_albums: 10,
            max_album_assets: 80,
            burst_gap_secs: 5,
            cluster: ClusterConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn burst_config(&self) -> BurstConfig {
        BurstConfig {
            max_gap_secs: self.burst_gap_secs,
            ..BurstConfig::from(&self.cluster)
        }
    }
}
