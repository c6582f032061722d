//! Photo grouping and perceptual hashing library for photo-clusters
//!
//! Pure, synchronous algorithms that turn a list of photo records plus
//! auxiliary lookup tables (locations, place names, fingerprints, albums)
//! into ordered groups for display.

pub mod album;
pub mod burst;
pub mod config;
pub mod day;
pub mod day_location;
pub mod dhash;
pub mod error;
pub mod label;
pub mod location;
pub mod lookup;
pub mod model;
pub mod semantic;
pub mod time;

pub use album::{album_title_priority, rank_albums, AlbumGrouper, AlbumSummary};
pub use burst::{BurstConfig, BurstSegmenter, BurstStats};
pub use config::{ClusterConfig, HashGrid};
pub use day::DayGrouper;
pub use day_location::DayLocationGrouper;
pub use dhash::{dhash_rgba, hamming_distance, is_near_duplicate};
pub use error::HashError;
pub use label::{label_to_category, top_k, CategoryPick, CategoryResolver};
pub use location::{fallback_location_title, nice_city_title, normalize_place_name, LocationGrouper};
pub use lookup::{
    location_key, parse_lat_lon, parse_location_key, AlbumBucket, CityNameLookup, Coordinates, HashEntry,
    HashLookup, LocationEntry, LocationLookup,
};
pub use model::{sort_newest_first, ClassScore, ContentCategory, Group, PhotoRecord};
pub use semantic::SemanticGrouper;
pub use time::to_secs;
