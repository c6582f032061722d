//! Session-owned lookup tables
//!
//! Every table sits behind a `RwLock<Arc<T>>`. Readers take a cheap `Arc`
//! snapshot and never observe a half-applied update; writers copy on write
//! when a snapshot is still alive. Each table carries a generation counter the
//! session bumps when it publishes new data, so callers know when to regroup.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use photo_clustering::{AlbumBucket, CityNameLookup, HashLookup, LocationLookup, PhotoRecord};

/// A snapshot-readable table with a publish generation
pub struct Table<T> {
    inner: RwLock<Arc<T>>,
    generation: AtomicU64,
}

impl<T: Clone + Default> Table<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(T::default())),
            generation: AtomicU64::new(0),
        }
    }

    /// Consistent view of the table as of now
    pub fn snapshot(&self) -> Arc<T> {
        Arc::clone(&self.inner.read())
    }

    /// Apply a change and publish it
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = self.update_quiet(f);
        self.publish();
        result
    }

    /// Apply a change without bumping the generation
    pub fn update_quiet<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.write();
        f(Arc::make_mut(&mut guard))
    }

    /// Replace the whole table and publish
    pub fn replace(&self, value: T) {
        *self.inner.write() = Arc::new(value);
        self.publish();
    }

    pub fn publish(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.replace(T::default());
    }
}

impl<T: Clone + Default> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// All lookup state of one session
#[derive(Default)]
pub struct LookupStore {
    pub photos: Table<Vec<PhotoRecord>>,
    pub locations: Table<LocationLookup>,
    pub cities: Table<CityNameLookup>,
    pub hashes: Table<HashLookup>,
    pub faces: Table<HashMap<String, bool>>,
    pub albums: Table<Vec<AlbumBucket>>,
}

impl LookupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combined generation; changes whenever any table publishes
    pub fn generation(&self) -> u64 {
        self.photos.generation()
            + self.locations.generation()
            + self.cities.generation()
            + self.hashes.generation()
            + self.faces.generation()
            + self.albums.generation()
    }

    /// Drop every cached lookup, keeping the photo list
    pub fn clear_lookups(&self) {
        self.locations.clear();
        self.cities.clear();
        self.hashes.clear();
        self.faces.clear();
        self.albums.clear();
    }

    pub fn clear_all(&self) {
        self.photos.clear();
        self.clear_lookups();
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            photos: self.photos.snapshot().len(),
            locations: self.locations.snapshot().len(),
            cities: self.cities.snapshot().len(),
            hashes: self.hashes.snapshot().len(),
            faces: self.faces.snapshot().len(),
            albums: self.albums.snapshot().len(),
            generation: self.generation(),
        }
    }
}

/// Table sizes for monitoring and debugging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub photos: usize,
    pub locations: usize,
    pub cities: usize,
    pub hashes: usize,
    pub faces: usize,
    pub albums: usize,
    pub generation: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use photo_clustering::HashEntry;

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let store = LookupStore::new();
        store.hashes.update(|h| h.insert("a", HashEntry::Hash(1)));

        let before = store.hashes.snapshot();
        store.hashes.update(|h| h.insert("b", HashEntry::Failed));

        assert_eq!(before.len(), 1);
        assert_eq!(store.hashes.snapshot().len(), 2);
    }

    #[test]
    fn test_generation_tracks_publishes() {
        let store = LookupStore::new();
        assert_eq!(store.generation(), 0);

        store.locations.update(|l| l.record_raw("a", 1.0, 2.0));
        assert_eq!(store.locations.generation(), 1);

        store.hashes.update_quiet(|h| h.insert("a", HashEntry::Hash(7)));
        assert_eq!(store.hashes.generation(), 0);
        store.hashes.publish();
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn test_clear_lookups_keeps_photos() {
        let store = LookupStore::new();
        store.photos.replace(vec![PhotoRecord::new("a", "a", 1, 1)]);
        store.cities.update(|c| c.insert("1.00,2.00", "Somewhere"));
        store.faces.update(|f| f.insert("a".to_string(), true));

        store.clear_lookups();
        let stats = store.stats();
        assert_eq!(stats.photos, 1);
        assert_eq!(stats.cities, 0);
        assert_eq!(stats.faces, 0);

        store.clear_all();
        assert_eq!(store.stats().photos, 0);
    }

    #[test]
    fn test_concurrent_readers_see_whole_updates() {
        let store = Arc::new(LookupStore::new());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..200 {
                    store.hashes.update(|h| {
                        h.insert(format!("a{}", i), HashEntry::Hash(i));
                        h.insert(format!("b{}", i), HashEntry::Hash(i));
                    });
                }
            })
        };

        for _ in 0..200 {
            // Entries are always added in pairs
            assert_eq!(store.hashes.snapshot().len() % 2, 0);
        }
        writer.join().unwrap();
        assert_eq!(store.hashes.snapshot().len(), 400);
    }
}
