//! Auxiliary lookup tables read by the groupers
//!
//! A missing key always means "not looked up yet". Explicit markers
//! (`LocationEntry::NoLocation`, `HashEntry::Failed`) record a lookup that
//! finished without a usable value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::PhotoRecord;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LocationEntry {
    Known(Coordinates),
    NoLocation,
}

impl LocationEntry {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            LocationEntry::Known(c) => Some(*c),
            LocationEntry::NoLocation => None,
        }
    }
}

/// Validate raw coordinates. Anything non-finite or out of range is `NoLocation`.
pub fn parse_lat_lon(lat: f64, lon: f64) -> LocationEntry {
    let ok = lat.is_finite() && lon.is_finite() && lat.abs() <= 90.0 && lon.abs() <= 180.0;
    if ok {
        LocationEntry::Known(Coordinates { lat, lon })
    } else {
        LocationEntry::NoLocation
    }
}

/// Round half up, matching how bucket keys have always been produced
pub fn round_to(x: f64, decimals: u32) -> f64 {
    let p = 10f64.powi(decimals as i32);
    let r = (x * p + 0.5).floor() / p;
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

/// Bucket key for a coordinate pair, e.g. `"52.37,4.90"`
pub fn location_key(coords: Coordinates, decimals: u32) -> String {
    let d = decimals as usize;
    format!(
        "{:.*},{:.*}",
        d,
        round_to(coords.lat, decimals),
        d,
        round_to(coords.lon, decimals)
    )
}

/// Parse a bucket key back into its rounded coordinates
pub fn parse_location_key(key: &str) -> Option<Coordinates> {
    let (lat, lon) = key.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lon: f64 = lon.trim().parse().ok()?;
    (lat.is_finite() && lon.is_finite()).then_some(Coordinates { lat, lon })
}

/// Photo id → resolved location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationLookup {
    entries: HashMap<String, LocationEntry>,
}

impl LocationLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while the photo has not been looked up
    pub fn get(&self, photo_id: &str) -> Option<&LocationEntry> {
        self.entries.get(photo_id)
    }

    pub fn contains(&self, photo_id: &str) -> bool {
        self.entries.contains_key(photo_id)
    }

    /// Record raw coordinates, validating them first
    pub fn record_raw(&mut self, photo_id: impl Into<String>, lat: f64, lon: f64) -> LocationEntry {
        let entry = parse_lat_lon(lat, lon);
        self.entries.insert(photo_id.into(), entry);
        entry
    }

    pub fn record_missing(&mut self, photo_id: impl Into<String>) {
        self.entries.insert(photo_id.into(), LocationEntry::NoLocation);
    }

    /// Rounded bucket keys of every known location
    pub fn bucket_keys(&self, decimals: u32) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .values()
            .filter_map(|e| e.coordinates())
            .map(|c| location_key(c, decimals))
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Number of photos in `items` not looked up yet
    pub fn pending_count(&self, items: &[PhotoRecord]) -> usize {
        items.iter().filter(|p| !self.contains(&p.id)).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bucket key → display name. Entries are only ever added.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CityNameLookup {
    names: HashMap<String, String>,
}

impl CityNameLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bucket_key: &str) -> Option<&str> {
        self.names.get(bucket_key).map(String::as_str)
    }

    pub fn contains(&self, bucket_key: &str) -> bool {
        self.names.contains_key(bucket_key)
    }

    /// Store a name unless the key is already resolved
    pub fn insert(&mut self, bucket_key: impl Into<String>, name: impl Into<String>) -> bool {
        let key = bucket_key.into();
        if self.names.contains_key(&key) {
            return false;
        }
        self.names.insert(key, name.into());
        true
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashEntry {
    Hash(u64),
    Failed,
}

impl HashEntry {
    pub fn hash(&self) -> Option<u64> {
        match self {
            HashEntry::Hash(h) => Some(*h),
            HashEntry::Failed => None,
        }
    }
}

/// Photo id → perceptual fingerprint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HashLookup {
    entries: HashMap<String, HashEntry>,
}

impl HashLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, photo_id: &str) -> Option<&HashEntry> {
        self.entries.get(photo_id)
    }

    pub fn contains(&self, photo_id: &str) -> bool {
        self.entries.contains_key(photo_id)
    }

    pub fn insert(&mut self, photo_id: impl Into<String>, entry: HashEntry) {
        self.entries.insert(photo_id.into(), entry);
    }

    /// Fingerprint of a photo, if one was computed successfully
    pub fn hash_of(&self, photo_id: &str) -> Option<u64> {
        self.get(photo_id).and_then(HashEntry::hash)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Photos of one album, supplied by the album source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumBucket {
    pub album_id: String,
    pub title: String,
    pub items: Vec<PhotoRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lat_lon_validates_range() {
        assert!(matches!(parse_lat_lon(52.37, 4.9), LocationEntry::Known(_)));
        assert!(matches!(parse_lat_lon(-90.0, 180.0), LocationEntry::Known(_)));
        assert_eq!(parse_lat_lon(90.01, 0.0), LocationEntry::NoLocation);
        assert_eq!(parse_lat_lon(0.0, -180.5), LocationEntry::NoLocation);
        assert_eq!(parse_lat_lon(f64::NAN, 0.0), LocationEntry::NoLocation);
        assert_eq!(parse_lat_lon(0.0, f64::INFINITY), LocationEntry::NoLocation);
    }

    #[test]
    fn test_location_key_rounding() {
        let c = Coordinates { lat: 52.3676, lon: 4.9041 };
        assert_eq!(location_key(c, 2), "52.37,4.90");

        let south = Coordinates { lat: -33.8688, lon: 151.2093 };
        assert_eq!(location_key(south, 2), "-33.87,151.21");

        let near_zero = Coordinates { lat: -0.001, lon: 0.004 };
        assert_eq!(location_key(near_zero, 2), "0.00,0.00");
    }

    #[test]
    fn test_parse_location_key() {
        let c = parse_location_key("52.37,4.90").unwrap();
        assert_eq!(c.lat, 52.37);
        assert_eq!(c.lon, 4.9);
        assert!(parse_location_key("nope").is_none());
        assert!(parse_location_key("1.0,abc").is_none());
    }

    #[test]
    fn test_location_lookup_distinguishes_pending() {
        let mut lookup = LocationLookup::new();
        lookup.record_raw("a", 10.0, 20.0);
        lookup.record_raw("b", 200.0, 20.0);
        lookup.record_missing("c");

        assert!(matches!(lookup.get("a"), Some(LocationEntry::Known(_))));
        assert_eq!(lookup.get("b"), Some(&LocationEntry::NoLocation));
        assert_eq!(lookup.get("c"), Some(&LocationEntry::NoLocation));
        assert_eq!(lookup.get("d"), None);
        assert_eq!(lookup.bucket_keys(2), vec!["10.00,20.00".to_string()]);
    }

    #[test]
    fn test_city_names_are_append_only() {
        let mut names = CityNameLookup::new();
        assert!(names.insert("1.00,2.00", "Lagos, Nigeria"));
        assert!(!names.insert("1.00,2.00", "Somewhere else"));
        assert_eq!(names.get("1.00,2.00"), Some("Lagos, Nigeria"));
    }

    #[test]
    fn test_hash_lookup_failed_marker() {
        let mut hashes = HashLookup::new();
        hashes.insert("a", HashEntry::Hash(42));
        hashes.insert("b", HashEntry::Failed);
        assert_eq!(hashes.hash_of("a"), Some(42));
        assert_eq!(hashes.hash_of("b"), None);
        assert!(hashes.contains("b"));
        assert!(!hashes.contains("c"));
    }
}
