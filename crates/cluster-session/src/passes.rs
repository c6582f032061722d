//! Cancelable background passes that fill the lookup tables
//!
//! A job is an ordered list of passes run on one background thread. Each
//! pass walks its targets one photo (or key, or album) at a time, checks the
//! cancel flag between items and publishes into the [`LookupStore`] as it
//! goes, so groups can be recomputed from partial results at any moment.
//! Album buckets are the exception and appear together when their pass ends.
//! Starting a new job cancels the running one.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};
use photo_clustering::{
    fallback_location_title, nice_city_title, parse_location_key, rank_albums, sort_newest_first, top_k,
    AlbumBucket, CategoryResolver, ClassScore, ContentCategory, HashEntry, PhotoRecord,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::prep::{ensure_file_uri, photo_dhash, photo_tensor};
use crate::sources::{AssetInfo, Classifier, Collaborators, Place};
use crate::store::LookupStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassKind {
    Locations,
    CityNames,
    Hashes,
    Albums,
    Classification,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PassKind::Locations => "locations",
            PassKind::CityNames => "city names",
            PassKind::Hashes => "hashes",
            PassKind::Albums => "albums",
            PassKind::Classification => "classification",
        };
        f.write_str(name)
    }
}

/// Everything a job needs, cloned into the worker thread
#[derive(Clone)]
pub struct PassContext {
    pub store: Arc<LookupStore>,
    pub sources: Collaborators,
    pub classifier: Option<Arc<dyn Classifier>>,
    pub config: SessionConfig,
}

/// Progress of the current job, summed over its passes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassProgress {
    pub current_pass: Option<PassKind>,
    pub passes_done: Vec<PassKind>,
    pub total_items: usize,
    pub completed_items: usize,
    pub failed_items: usize,
    pub is_cancelled: bool,
    pub is_finished: bool,
}

impl PassProgress {
    pub fn completion_percentage(&self) -> f64 {
        if self.total_items == 0 {
            100.0
        } else {
            (self.completed_items as f64 / self.total_items as f64) * 100.0
        }
    }
}

/// Runs one pass job at a time on a background thread
pub struct PassScheduler {
    current_job: Mutex<Option<Arc<PassJob>>>,
}

/// State shared between the scheduler and the worker running a job
#[derive(Default)]
struct PassJob {
    cancel_flag: AtomicBool,
    progress: Mutex<PassProgress>,
    finished: Condvar,
}

impl PassJob {
    fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
        let mut progress = self.progress.lock();
        if !progress.is_finished {
            progress.is_cancelled = true;
        }
    }

    fn wait_finished(&self) -> PassProgress {
        let mut progress = self.progress.lock();
        while !progress.is_finished {
            self.finished.wait(&mut progress);
        }
        progress.clone()
    }
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PassScheduler {
    pub fn new() -> Self {
        Self {
            current_job: Mutex::new(None),
        }
    }

    /// Start running `passes` in order. Cancels any existing job and waits
    /// for it to stop before the new one touches the store.
    pub fn start(&self, context: PassContext, passes: Vec<PassKind>) {
        let job = Arc::new(PassJob::default());
        let previous = self.current_job.lock().replace(Arc::clone(&job));
        if let Some(previous) = previous {
            previous.cancel();
            previous.wait_finished();
        }

        let tracker = Tracker { job };
        let spawned = thread::Builder::new()
            .name("cluster-passes".to_string())
            .spawn(move || execute_job(&context, &passes, &tracker));
        // On failure the closure, and with it the tracker, is dropped, which
        // marks the job finished.
        if let Err(e) = spawned {
            warn!("Failed to spawn pass worker: {}", e);
        }
    }

    /// Signal the running job to stop after its current item and wait for it.
    /// Its final progress stays readable.
    pub fn cancel_current_job(&self) {
        if let Some(job) = self.current_job() {
            job.cancel();
            job.wait_finished();
        }
    }

    /// Block until the running job has finished, on its own or by cancellation
    pub fn wait(&self) -> Option<PassProgress> {
        self.current_job().map(|job| job.wait_finished())
    }

    pub fn get_progress(&self) -> Option<PassProgress> {
        self.current_job().map(|job| job.progress.lock().clone())
    }

    pub fn is_running(&self) -> bool {
        self.get_progress()
            .is_some_and(|p| !p.is_finished && !p.is_cancelled)
    }

    // The lock is only held long enough to clone the handle, so waiting on a
    // job never blocks cancel or progress reads from other threads.
    fn current_job(&self) -> Option<Arc<PassJob>> {
        self.current_job.lock().clone()
    }
}

impl Drop for PassScheduler {
    fn drop(&mut self) {
        self.cancel_current_job();
    }
}

/// Progress and cancellation as seen from inside a job
struct Tracker {
    job: Arc<PassJob>,
}

impl Tracker {
    fn cancelled(&self) -> bool {
        self.job.cancel_flag.load(Ordering::Relaxed)
    }

    fn begin(&self, pass: PassKind, items: usize) {
        debug!("Starting {} pass over {} items", pass, items);
        let mut progress = self.job.progress.lock();
        progress.current_pass = Some(pass);
        progress.total_items += items;
    }

    fn completed(&self) {
        self.job.progress.lock().completed_items += 1;
    }

    fn failed(&self) {
        let mut progress = self.job.progress.lock();
        progress.completed_items += 1;
        progress.failed_items += 1;
    }

    fn end(&self, pass: PassKind) {
        let mut progress = self.job.progress.lock();
        progress.current_pass = None;
        progress.passes_done.push(pass);
    }
}

// Runs when the job returns, panics or never starts, so waiters always wake.
impl Drop for Tracker {
    fn drop(&mut self) {
        let mut progress = self.job.progress.lock();
        if !progress.is_finished {
            if thread::panicking() {
                warn!("Pass worker panicked");
            }
            progress.current_pass = None;
            progress.is_finished = true;
            progress.is_cancelled = self.cancelled();
        }
        drop(progress);
        self.job.finished.notify_all();
    }
}

fn execute_job(context: &PassContext, passes: &[PassKind], tracker: &Tracker) {
    for &pass in passes {
        if tracker.cancelled() {
            break;
        }
        match pass {
            PassKind::Locations => location_pass(context, tracker),
            PassKind::CityNames => city_name_pass(context, tracker),
            PassKind::Hashes => hash_pass(context, tracker),
            PassKind::Albums => album_pass(context, tracker),
            PassKind::Classification => classification_pass(context, tracker),
        }
        if !tracker.cancelled() {
            tracker.end(pass);
        }
    }

    let mut progress = tracker.job.progress.lock();
    progress.current_pass = None;
    progress.is_finished = true;
    progress.is_cancelled = tracker.cancelled();
    info!(
        "Pass job finished: {}/{} items, {} failed{}",
        progress.completed_items,
        progress.total_items,
        progress.failed_items,
        if progress.is_cancelled { " (cancelled)" } else { "" }
    );
}

/// Resolve coordinates for photos without a location entry
fn location_pass(context: &PassContext, tracker: &Tracker) {
    let store = &context.store;
    let photos = store.photos.snapshot();
    let known = store.locations.snapshot();
    let pending: Vec<&PhotoRecord> = photos
        .iter()
        .filter(|p| !known.contains(&p.id))
        .take(context.config.max_location_lookups)
        .collect();

    tracker.begin(PassKind::Locations, pending.len());
    for photo in pending {
        if tracker.cancelled() {
            return;
        }
        match context.sources.photos.location(&photo.id) {
            Ok(Some((lat, lon))) => {
                store.locations.update(|l| l.record_raw(photo.id.clone(), lat, lon));
                tracker.completed();
            }
            Ok(None) => {
                store.locations.update(|l| l.record_missing(photo.id.clone()));
                tracker.completed();
            }
            Err(e) => {
                debug!("Location lookup failed for {}: {:#}", photo.id, e);
                store.locations.update(|l| l.record_missing(photo.id.clone()));
                tracker.failed();
            }
        }
    }
}

/// Name every location bucket the city table has not resolved yet
fn city_name_pass(context: &PassContext, tracker: &Tracker) {
    let store = &context.store;
    let decimals = context.config.cluster.location_round_decimals;
    let resolved = store.cities.snapshot();
    let pending: Vec<String> = store
        .locations
        .snapshot()
        .bucket_keys(decimals)
        .into_iter()
        .filter(|key| !resolved.contains(key))
        .collect();

    tracker.begin(PassKind::CityNames, pending.len());
    for key in pending {
        if tracker.cancelled() {
            return;
        }
        let (title, ok) = resolve_city_title(context, &key);
        store.cities.update(|c| c.insert(key, title));
        if ok {
            tracker.completed();
        } else {
            tracker.failed();
        }
    }
}

/// Display title for a bucket key, and whether the geocoder answered
fn resolve_city_title(context: &PassContext, key: &str) -> (String, bool) {
    let Some(coords) = parse_location_key(key) else {
        return (fallback_location_title(key), false);
    };

    match context.sources.geocoder.reverse_geocode(coords) {
        Ok(places) => {
            let place = places.into_iter().next().unwrap_or_default();
            (place_title(&place), true)
        }
        Err(e) => {
            debug!("Reverse geocoding failed for {}: {:#}", key, e);
            (format!("Location: {:.2}, {:.2}", coords.lat, coords.lon), false)
        }
    }
}

fn place_title(place: &Place) -> String {
    nice_city_title(place.locality(), place.region.as_deref(), place.country.as_deref())
}

/// Fingerprint the newest photos that have no hash entry yet
fn hash_pass(context: &PassContext, tracker: &Tracker) {
    let store = &context.store;
    let config = &context.config;
    let photos = store.photos.snapshot();
    let known = store.hashes.snapshot();

    let mut newest: Vec<&PhotoRecord> = photos.iter().collect();
    sort_newest_first(&mut newest);
    let pending: Vec<&PhotoRecord> = newest
        .into_iter()
        .take(config.max_photos_to_hash)
        .filter(|p| !known.contains(&p.id))
        .collect();

    tracker.begin(PassKind::Hashes, pending.len());
    let publish_every = config.hash_publish_every.max(1);
    let mut unpublished = 0;
    for photo in pending {
        if tracker.cancelled() {
            break;
        }
        let sources = &context.sources;
        let entry = match photo_dhash(photo, config.cluster.hash_grid, &*sources.transform, &*sources.decoder) {
            Ok(hash) => {
                tracker.completed();
                HashEntry::Hash(hash)
            }
            Err(e) => {
                debug!("Hashing failed for {}: {}", photo.id, e);
                tracker.failed();
                HashEntry::Failed
            }
        };
        store.hashes.update_quiet(|h| h.insert(photo.id.clone(), entry));

        unpublished += 1;
        if unpublished == publish_every {
            store.hashes.publish();
            unpublished = 0;
        }
    }
    store.hashes.publish();
}

/// Load the assets of the preferred albums.
///
/// Buckets are published together once every picked album has been tried,
/// so a cancelled pass leaves the table empty and a later pass starts over.
/// Runs once per session after that.
fn album_pass(context: &PassContext, tracker: &Tracker) {
    let store = &context.store;
    let config = &context.config;
    let Some(source) = context.sources.albums.as_ref() else {
        debug!("No album source; skipping album pass");
        return;
    };
    if !store.albums.snapshot().is_empty() {
        return;
    }

    let albums = match source.list_albums() {
        Ok(albums) => albums,
        Err(e) => {
            warn!("Failed to list albums: {:#}", e);
            return;
        }
    };
    let picked = rank_albums(&albums, config.max_albums);

    tracker.begin(PassKind::Albums, picked.len());
    let mut buckets = Vec::with_capacity(picked.len());
    for album in picked {
        if tracker.cancelled() {
            debug!("Album pass cancelled after {} albums", buckets.len());
            return;
        }
        let assets = match source.album_assets(&album.id, config.max_album_assets) {
            Ok(assets) => assets,
            Err(e) => {
                debug!("Failed to load album {}: {:#}", album.id, e);
                tracker.failed();
                continue;
            }
        };

        // Sources return oldest to newest
        let items: Vec<PhotoRecord> = assets.into_iter().rev().map(AssetInfo::into_record).collect();
        let title = if album.title.trim().is_empty() {
            "Album".to_string()
        } else {
            album.title
        };
        buckets.push(AlbumBucket {
            album_id: album.id,
            title,
            items,
        });
        tracker.completed();
    }

    store.albums.replace(buckets);
}

/// What classification decided for one photo
struct Classification {
    category: ContentCategory,
    confidence: f32,
    top: Option<Vec<ClassScore>>,
    debug_label: Option<String>,
}

/// Categorize photos that have no category yet. Failed photos stay
/// uncategorized and are retried by the next pass.
fn classification_pass(context: &PassContext, tracker: &Tracker) {
    let Some(classifier) = context.classifier.as_ref() else {
        debug!("Model not ready; skipping classification");
        return;
    };
    let store = &context.store;
    let photos = store.photos.snapshot();
    let pending: Vec<&PhotoRecord> = photos
        .iter()
        .filter(|p| !p.is_categorized())
        .take(context.config.max_photos_to_classify)
        .collect();

    tracker.begin(PassKind::Classification, pending.len());
    for photo in pending {
        if tracker.cancelled() {
            return;
        }
        match classify_photo(context, &**classifier, photo) {
            Ok(result) => {
                store.photos.update(|list| {
                    if let Some(p) = list.iter_mut().find(|p| p.id == photo.id) {
                        p.category = Some(result.category);
                        p.confidence = Some(result.confidence);
                        p.top = result.top;
                        p.debug_label = result.debug_label;
                    }
                });
                tracker.completed();
            }
            Err(e) => {
                debug!("Classification failed for {}: {:#}", photo.id, e);
                tracker.failed();
            }
        }
    }
}

fn classify_photo(
    context: &PassContext,
    classifier: &dyn Classifier,
    photo: &PhotoRecord,
) -> anyhow::Result<Classification> {
    if detect_face(context, photo) {
        return Ok(Classification {
            category: ContentCategory::People,
            confidence: 1.0,
            top: None,
            debug_label: Some("face_detected".to_string()),
        });
    }

    let sources = &context.sources;
    let cluster = &context.config.cluster;
    let tensor = photo_tensor(photo, classifier.input_size(), &*sources.transform, &*sources.decoder)?;
    let scores = classifier.classify(&tensor)?;
    let top = top_k(&scores, cluster.top_k);
    let pick = CategoryResolver::with_min_score(classifier.labels(), cluster.min_top_score).resolve(&top, scores.len());

    Ok(Classification {
        category: pick.category,
        confidence: pick.score,
        top: Some(top),
        debug_label: pick.label,
    })
}

/// Cached face check. Detector errors count as "no face".
fn detect_face(context: &PassContext, photo: &PhotoRecord) -> bool {
    let Some(detector) = context.sources.faces.as_ref() else {
        return false;
    };
    if let Some(&cached) = context.store.faces.snapshot().get(&photo.id) {
        return cached;
    }

    let sources = &context.sources;
    let found = ensure_file_uri(photo, &*sources.photos, &*sources.transform)
        .and_then(|uri| detector.has_face(&uri))
        .unwrap_or_else(|e| {
            debug!("Face detection failed for {}: {:#}", photo.id, e);
            false
        });
    context.store.faces.update(|f| f.insert(photo.id.clone(), found));
    found
}
