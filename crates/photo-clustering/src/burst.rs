//! Burst segmentation over capture time
//!
//! Photos are ordered by capture time and split wherever the gap to the
//! previous photo exceeds the configured threshold. Runs shorter than the
//! minimum burst size are dropped. The hash-aware variant additionally splits
//! a run between two photos whose fingerprints are too far apart.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::config::ClusterConfig;
use crate::dhash::hamming_distance;
use crate::lookup::HashLookup;
use crate::model::{sort_newest_first, Group, PhotoRecord};
use crate::time::format_time_range;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstConfig {
    /// Largest gap between consecutive photos of one burst (seconds)
    pub max_gap_secs: i64,
    /// Minimum number of photos to constitute a burst
    pub min_burst_size: usize,
    /// Largest Hamming distance between neighbours of a near-duplicate run
    pub max_hash_distance: u32,
}

impl Default for BurstConfig {
    fn default() -> Self {
        ClusterConfig::default().into()
    }
}

impl From<ClusterConfig> for BurstConfig {
    fn from(config: ClusterConfig) -> Self {
        Self::from(&config)
    }
}

impl From<&ClusterConfig> for BurstConfig {
    fn from(config: &ClusterConfig) -> Self {
        Self {
            max_gap_secs: config.burst_gap_secs,
            // A burst needs at least a pair
            min_burst_size: config.min_burst_size.max(2),
            max_hash_distance: config.hash_distance_threshold,
        }
    }
}

/// Summary figures for one burst group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstStats {
    pub frame_count: usize,
    pub duration_secs: i64,
    pub avg_gap_secs: f64,
}

impl BurstStats {
    pub fn of(group: &Group<'_>) -> Self {
        let mut times: Vec<i64> = group.items.iter().filter_map(|p| p.created_secs()).collect();
        times.sort_unstable();

        let duration_secs = match (times.first(), times.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        };
        let avg_gap_secs = if times.len() > 1 {
            duration_secs as f64 / (times.len() - 1) as f64
        } else {
            0.0
        };

        Self {
            frame_count: group.items.len(),
            duration_secs,
            avg_gap_secs,
        }
    }
}

pub struct BurstSegmenter {
    config: BurstConfig,
    tz: FixedOffset,
}

impl BurstSegmenter {
    pub fn new(config: BurstConfig, tz: FixedOffset) -> Self {
        Self { config, tz }
    }

    pub fn with_default_config(tz: FixedOffset) -> Self {
        Self::new(BurstConfig::default(), tz)
    }

    pub fn config(&self) -> &BurstConfig {
        &self.config
    }

    /// Group photos into time bursts, newest burst first
    pub fn segment<'a, I>(&self, items: I) -> Vec<Group<'a>>
    where
        I: IntoIterator<Item = &'a PhotoRecord>,
    {
        let runs: Vec<Vec<&'a PhotoRecord>> = self
            .time_runs(items)
            .into_iter()
            .filter(|run| run.len() >= self.config.min_burst_size)
            .collect();
        self.build_groups(runs, "time", "Burst")
    }

    /// Like [`segment`](Self::segment), but a burst is also split between
    /// neighbours whose fingerprints differ by more than the threshold.
    /// Pending or failed hashes never cause a split.
    pub fn segment_with_hashes<'a, I>(&self, items: I, hashes: &HashLookup) -> Vec<Group<'a>>
    where
        I: IntoIterator<Item = &'a PhotoRecord>,
    {
        let mut runs = Vec::new();
        for run in self.time_runs(items) {
            let mut current: Vec<&'a PhotoRecord> = Vec::new();
            for photo in run {
                let split = current.last().is_some_and(|prev| {
                    match (hashes.hash_of(&prev.id), hashes.hash_of(&photo.id)) {
                        (Some(a), Some(b)) => hamming_distance(a, b) > self.config.max_hash_distance,
                        _ => false,
                    }
                });
                if split {
                    runs.push(std::mem::take(&mut current));
                }
                current.push(photo);
            }
            runs.push(current);
        }

        runs.retain(|run| run.len() >= self.config.min_burst_size);
        self.build_groups(runs, "dup", "Similar")
    }

    /// Time-ordered runs, including singletons
    fn time_runs<'a, I>(&self, items: I) -> Vec<Vec<&'a PhotoRecord>>
    where
        I: IntoIterator<Item = &'a PhotoRecord>,
    {
        let mut timed: Vec<(i64, &'a PhotoRecord)> = items
            .into_iter()
            .filter_map(|p| p.created_secs().filter(|&t| t > 0).map(|t| (t, p)))
            .collect();
        timed.sort_by_key(|(t, _)| *t);

        let mut runs = Vec::new();
        let mut current: Vec<&'a PhotoRecord> = Vec::new();
        let mut last_time: Option<i64> = None;

        for (t, photo) in timed {
            if let Some(prev) = last_time {
                if t - prev > self.config.max_gap_secs {
                    runs.push(std::mem::take(&mut current));
                }
            }
            last_time = Some(t);
            current.push(photo);
        }
        if !current.is_empty() {
            runs.push(current);
        }

        runs
    }

    fn build_groups<'a>(&self, runs: Vec<Vec<&'a PhotoRecord>>, key_prefix: &str, label: &str) -> Vec<Group<'a>> {
        let mut groups: Vec<Group<'a>> = runs
            .into_iter()
            .enumerate()
            .map(|(i, run)| {
                let title = format!("{}: {}", label, format_time_range(&run, &self.tz));
                let mut items = run;
                sort_newest_first(&mut items);
                Group::new(format!("{}_{}", key_prefix, i), title, items)
            })
            .collect();

        groups.sort_by_key(|g| std::cmp::Reverse(g.newest_secs()));
        groups
    }
}
