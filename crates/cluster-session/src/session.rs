//! The session context: owns the photo list and lookup tables for one
//! signed-in session and projects them into groups on demand.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use chrono::FixedOffset;
use parking_lot::RwLock;
use photo_clustering::{
    AlbumGrouper, BurstSegmenter, DayGrouper, DayLocationGrouper, Group, LocationGrouper, PhotoRecord,
    SemanticGrouper,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::passes::{PassContext, PassKind, PassProgress, PassScheduler};
use crate::sources::{AssetInfo, Classifier, Collaborators};
use crate::store::{LookupStore, StoreStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterMode {
    Semantic,
    Location,
    Day,
    DayLocation,
    Bursts,
    Duplicates,
    Albums,
}

impl ClusterMode {
    pub const ALL: [ClusterMode; 7] = [
        ClusterMode::Semantic,
        ClusterMode::Location,
        ClusterMode::Day,
        ClusterMode::DayLocation,
        ClusterMode::Bursts,
        ClusterMode::Duplicates,
        ClusterMode::Albums,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterMode::Semantic => "semantic",
            ClusterMode::Location => "location",
            ClusterMode::Day => "day",
            ClusterMode::DayLocation => "day_location",
            ClusterMode::Bursts => "bursts",
            ClusterMode::Duplicates => "duplicates",
            ClusterMode::Albums => "albums",
        }
    }

    /// Background passes whose results this mode reads
    pub fn required_passes(&self) -> Vec<PassKind> {
        match self {
            ClusterMode::Semantic => vec![PassKind::Classification],
            ClusterMode::Location | ClusterMode::DayLocation => vec![PassKind::Locations, PassKind::CityNames],
            ClusterMode::Duplicates => vec![PassKind::Hashes],
            ClusterMode::Albums => vec![PassKind::Albums],
            ClusterMode::Day | ClusterMode::Bursts => Vec::new(),
        }
    }
}

impl fmt::Display for ClusterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_lowercase().replace('-', "_");
        ClusterMode::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| format!("Invalid cluster mode: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

/// Failures that end up as the session's user-visible error state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Photo library unavailable: {0}")]
    PhotoLibrary(String),

    #[error("Model load failed: {0}")]
    ModelLoad(String),
}

/// An owned group, detached from the session snapshots it was built from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupView {
    pub key: String,
    pub title: String,
    pub items: Vec<PhotoRecord>,
}

impl GroupView {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Group<'_>> for GroupView {
    fn from(group: Group<'_>) -> Self {
        Self {
            key: group.key,
            title: group.title,
            items: group.items.into_iter().cloned().collect(),
        }
    }
}

pub struct ClusterSession {
    config: SessionConfig,
    tz: FixedOffset,
    sources: Collaborators,
    store: Arc<LookupStore>,
    classifier: RwLock<Option<Arc<dyn Classifier>>>,
    model_status: RwLock<ModelStatus>,
    error: RwLock<Option<SessionError>>,
    scheduler: PassScheduler,
}

impl ClusterSession {
    /// Create a session. `tz` is used for every local-time key and title.
    pub fn new(config: SessionConfig, sources: Collaborators, tz: FixedOffset) -> Self {
        Self {
            config,
            tz,
            sources,
            store: Arc::new(LookupStore::new()),
            classifier: RwLock::new(None),
            model_status: RwLock::new(ModelStatus::Idle),
            error: RwLock::new(None),
            scheduler: PassScheduler::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<LookupStore> {
        &self.store
    }

    /// Changes whenever a pass publishes; regroup when it moves
    pub fn generation(&self) -> u64 {
        self.store.generation()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn model_status(&self) -> ModelStatus {
        *self.model_status.read()
    }

    pub fn error(&self) -> Option<SessionError> {
        self.error.read().clone()
    }

    pub fn photos(&self) -> Arc<Vec<PhotoRecord>> {
        self.store.photos.snapshot()
    }

    /// Load the newest `page_size` photos, newest first. On failure the
    /// photo list is emptied and the error kept as session state.
    pub fn bootstrap_photos(&self) -> Result<usize, SessionError> {
        match self.sources.photos.list_photos(self.config.page_size) {
            Ok(assets) => {
                let photos: Vec<PhotoRecord> = assets.into_iter().rev().map(AssetInfo::into_record).collect();
                let count = photos.len();
                self.store.photos.replace(photos);
                info!("Loaded {} photos", count);
                Ok(count)
            }
            Err(e) => {
                warn!("Failed to list photos: {:#}", e);
                self.store.photos.clear();
                Err(self.fail(SessionError::PhotoLibrary(format!("{:#}", e))))
            }
        }
    }

    /// Load the classifier through `loader`, tracking the model status
    pub fn bootstrap_model<F>(&self, loader: F) -> Result<(), SessionError>
    where
        F: FnOnce(&SessionConfig) -> Result<Arc<dyn Classifier>>,
    {
        *self.model_status.write() = ModelStatus::Loading;
        match loader(&self.config) {
            Ok(classifier) => {
                info!("Classifier ready ({} labels)", classifier.labels().len());
                *self.classifier.write() = Some(classifier);
                *self.model_status.write() = ModelStatus::Ready;
                Ok(())
            }
            Err(e) => {
                warn!("Model load failed: {:#}", e);
                *self.model_status.write() = ModelStatus::Error;
                Err(self.fail(SessionError::ModelLoad(format!("{:#}", e))))
            }
        }
    }

    fn fail(&self, error: SessionError) -> SessionError {
        *self.error.write() = Some(error.clone());
        error
    }

    /// Group the current photos for `mode`. Works on whatever the passes
    /// have published so far; missing lookups read as pending.
    pub fn groups(&self, mode: ClusterMode) -> Vec<GroupView> {
        let photos = self.store.photos.snapshot();
        let locations = self.store.locations.snapshot();
        let cities = self.store.cities.snapshot();
        let hashes = self.store.hashes.snapshot();
        let albums = self.store.albums.snapshot();
        let decimals = self.config.cluster.location_round_decimals;

        let groups: Vec<Group<'_>> = match mode {
            ClusterMode::Semantic => SemanticGrouper::group(photos.iter()),
            ClusterMode::Location => LocationGrouper::new(decimals).group(photos.iter(), &locations, &cities),
            ClusterMode::Day => DayGrouper::new(self.tz).group(photos.iter()),
            ClusterMode::DayLocation => DayLocationGrouper::new(DayGrouper::new(self.tz), LocationGrouper::new(decimals))
                .group(photos.iter(), &locations, &cities),
            ClusterMode::Bursts => self.bursts().segment(photos.iter()),
            ClusterMode::Duplicates => self.bursts().segment_with_hashes(photos.iter(), &hashes),
            ClusterMode::Albums => AlbumGrouper::group(&albums),
        };

        groups.into_iter().map(GroupView::from).collect()
    }

    fn bursts(&self) -> BurstSegmenter {
        BurstSegmenter::new(self.config.burst_config(), self.tz)
    }

    /// Start the background passes `mode` needs, replacing any running job
    pub fn prepare(&self, mode: ClusterMode) {
        let passes = mode.required_passes();
        if passes.is_empty() {
            return;
        }
        info!("Preparing {} mode: {:?}", mode, passes);
        self.scheduler.start(self.pass_context(), passes);
    }

    fn pass_context(&self) -> PassContext {
        PassContext {
            store: Arc::clone(&self.store),
            sources: self.sources.clone(),
            classifier: self.classifier.read().clone(),
            config: self.config.clone(),
        }
    }

    /// Block until the running passes finish
    pub fn wait(&self) -> Option<PassProgress> {
        self.scheduler.wait()
    }

    pub fn cancel(&self) {
        self.scheduler.cancel_current_job();
    }

    pub fn progress(&self) -> Option<PassProgress> {
        self.scheduler.get_progress()
    }

    pub fn is_preparing(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Forget everything learned in this session, including the photo list
    pub fn reset(&self) {
        self.scheduler.cancel_current_job();
        self.store.clear_all();
        *self.error.write() = None;
        info!("Session reset");
    }
}
