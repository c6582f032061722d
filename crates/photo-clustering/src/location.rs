//! Grouping by rounded GPS position, merged by resolved place name
//!
//! Photos are first bucketed by coordinates rounded to a fixed number of
//! decimals. Buckets are then merged when their display names normalize to
//! the same string, so two neighbouring grid cells in one city show up as a
//! single group.

use std::collections::HashMap;

use crate::lookup::{location_key, CityNameLookup, LocationLookup};
use crate::model::{sort_newest_first, Group, PhotoRecord};

pub const UNKNOWN_LOCATION_KEY: &str = "loc_unknown";
const UNKNOWN_LOCATION_TITLE: &str = "No location";

/// Display name from reverse-geocoder parts.
///
/// City and country together read "City, Country"; otherwise whatever parts
/// exist are joined in order.
pub fn nice_city_title(city: Option<&str>, region: Option<&str>, country: Option<&str>) -> String {
    fn present(s: Option<&str>) -> Option<&str> {
        s.filter(|v| !v.is_empty())
    }

    let parts: Vec<&str> = [present(city), present(region), present(country)]
        .into_iter()
        .flatten()
        .collect();

    match (present(city), present(country)) {
        _ if parts.is_empty() => "Unknown place".to_string(),
        (Some(city), Some(country)) => format!("{}, {}", city, country),
        _ => parts.join(", "),
    }
}

/// Lowercase, collapse whitespace (including no-break spaces) and trim
pub fn normalize_place_name(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '\u{a0}')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title used for a bucket the city lookup has not resolved yet
pub fn fallback_location_title(bucket_key: &str) -> String {
    format!("Location: {}", bucket_key)
}

struct MergedBucket<'a> {
    title: String,
    items: Vec<&'a PhotoRecord>,
}

pub struct LocationGrouper {
    round_decimals: u32,
}

impl Default for LocationGrouper {
    fn default() -> Self {
        Self::new(2)
    }
}

impl LocationGrouper {
    pub fn new(round_decimals: u32) -> Self {
        Self { round_decimals }
    }

    /// Bucket key of a photo, or `None` when its location is unknown or pending
    pub fn bucket_key_of(&self, photo: &PhotoRecord, locations: &LocationLookup) -> Option<String> {
        locations
            .get(&photo.id)
            .and_then(|entry| entry.coordinates())
            .map(|coords| location_key(coords, self.round_decimals))
    }

    /// Group photos by place. The unknown group always comes last; the
    /// others are ordered by their newest photo.
    pub fn group<'a, I>(&self, items: I, locations: &LocationLookup, cities: &CityNameLookup) -> Vec<Group<'a>>
    where
        I: IntoIterator<Item = &'a PhotoRecord>,
    {
        // Phase 1: rounded-coordinate buckets, in first-seen order
        let mut bucket_index: HashMap<Option<String>, usize> = HashMap::new();
        let mut buckets: Vec<(Option<String>, Vec<&'a PhotoRecord>)> = Vec::new();
        for photo in items {
            let key = self.bucket_key_of(photo, locations);
            let idx = *bucket_index.entry(key.clone()).or_insert_with(|| {
                buckets.push((key, Vec::new()));
                buckets.len() - 1
            });
            buckets[idx].1.push(photo);
        }

        // Phase 2: merge buckets sharing a normalized display name
        let mut merged_index: HashMap<String, usize> = HashMap::new();
        let mut merged: Vec<(String, MergedBucket<'a>)> = Vec::new();
        for (key, mut bucket) in buckets {
            sort_newest_first(&mut bucket);

            let (merge_key, title) = match key {
                None => (UNKNOWN_LOCATION_KEY.to_string(), UNKNOWN_LOCATION_TITLE.to_string()),
                Some(key) => {
                    let title = cities
                        .get(&key)
                        .map(str::to_string)
                        .unwrap_or_else(|| fallback_location_title(&key));
                    (format!("locm_{}", normalize_place_name(&title)), title)
                }
            };

            match merged_index.get(&merge_key) {
                Some(&idx) => merged[idx].1.items.extend(bucket),
                None => {
                    merged_index.insert(merge_key.clone(), merged.len());
                    merged.push((merge_key, MergedBucket { title, items: bucket }));
                }
            }
        }

        let mut groups: Vec<Group<'a>> = merged
            .into_iter()
            .map(|(key, mut bucket)| {
                sort_newest_first(&mut bucket.items);
                let title = format!("{} • {}", bucket.title, bucket.items.len());
                Group::new(key, title, bucket.items)
            })
            .collect();

        groups.sort_by_key(|g| (g.key == UNKNOWN_LOCATION_KEY, std::cmp::Reverse(g.newest_secs())));
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(id: &str, secs: i64) -> PhotoRecord {
        PhotoRecord::new(id, id, 10, 10).with_creation_time(Some(secs))
    }

    #[test]
    fn test_nice_city_title() {
        assert_eq!(nice_city_title(Some("Paris"), Some("IDF"), Some("France")), "Paris, France");
        assert_eq!(nice_city_title(None, Some("Bavaria"), Some("Germany")), "Bavaria, Germany");
        assert_eq!(nice_city_title(Some("Oslo"), None, None), "Oslo");
        assert_eq!(nice_city_title(Some(""), None, None), "Unknown place");
        assert_eq!(nice_city_title(Some(""), Some("Kanto"), Some("Japan")), "Kanto, Japan");
        assert_eq!(nice_city_title(None, None, None), "Unknown place");
    }

    #[test]
    fn test_normalize_place_name() {
        assert_eq!(normalize_place_name("  New\u{a0}York,   USA "), "new york, usa");
        assert_eq!(normalize_place_name(""), "");
    }

    #[test]
    fn test_merges_buckets_with_same_city() {
        let photos = vec![photo("a", 100), photo("b", 200), photo("c", 300)];
        let mut locations = LocationLookup::new();
        locations.record_raw("a", 48.8566, 2.3522);
        locations.record_raw("b", 48.8800, 2.3100);
        locations.record_raw("c", 51.5074, -0.1278);

        let mut cities = CityNameLookup::new();
        cities.insert("48.86,2.35", "Paris, France");
        cities.insert("48.88,2.31", "paris,  FRANCE");
        cities.insert("51.51,-0.13", "London, UK");

        let groups = LocationGrouper::default().group(&photos, &locations, &cities);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].title, "London, UK • 1");
        assert_eq!(groups[1].key, "locm_paris, france");
        assert_eq!(groups[1].title, "Paris, France • 2");
        assert_eq!(groups[1].ids(), vec!["b", "a"]);
    }

    #[test]
    fn test_unknown_bucket_is_last() {
        let photos = vec![photo("new", 1_000), photo("old1", 10), photo("old2", 20), photo("pending", 900)];
        let mut locations = LocationLookup::new();
        locations.record_missing("new");
        locations.record_raw("old1", 10.0, 10.0);
        locations.record_raw("old2", 20.0, 20.0);

        let mut cities = CityNameLookup::new();
        cities.insert("10.00,10.00", "Alpha");
        cities.insert("20.00,20.00", "Beta");

        let groups = LocationGrouper::default().group(&photos, &locations, &cities);

        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["locm_beta", "locm_alpha", UNKNOWN_LOCATION_KEY]);
        assert_eq!(groups[2].title, "No location • 2");
        assert_eq!(groups[2].ids(), vec!["new", "pending"]);
    }

    #[test]
    fn test_unresolved_bucket_uses_fallback_title() {
        let photos = vec![photo("a", 100)];
        let mut locations = LocationLookup::new();
        locations.record_raw("a", 1.234, 5.678);

        let groups = LocationGrouper::default().group(&photos, &locations, &CityNameLookup::new());
        assert_eq!(groups[0].title, "Location: 1.23,5.68 • 1");
        assert_eq!(groups[0].key, "locm_location: 1.23,5.68");
    }

    #[test]
    fn test_keys_are_unique() {
        let photos: Vec<PhotoRecord> = (0..30).map(|i| photo(&format!("p{}", i), i * 10)).collect();
        let mut locations = LocationLookup::new();
        for (i, p) in photos.iter().enumerate() {
            if i % 4 != 0 {
                locations.record_raw(p.id.clone(), (i % 5) as f64, 0.0);
            }
        }
        let groups = LocationGrouper::default().group(&photos, &locations, &CityNameLookup::new());

        let mut keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), total);
        assert_eq!(groups.iter().map(|g| g.len()).sum::<usize>(), 30);
    }
}
