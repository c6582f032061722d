//! Interfaces to the collaborators a session depends on
//!
//! Photo library access, image codecs, model runtimes and reverse geocoding
//! all live outside this crate. Each is reached through one of the traits
//! below so a session can run against real devices or in-memory fakes.

use std::sync::Arc;

use anyhow::Result;
use photo_clustering::{AlbumSummary, Coordinates, PhotoRecord};
use serde::{Deserialize, Serialize};

/// An asset as enumerated by a photo or album source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub id: String,
    pub uri: String,
    pub width: u32,
    pub height: u32,
    /// Raw creation time, in seconds or milliseconds since epoch
    pub creation_time: Option<i64>,
}

impl AssetInfo {
    pub fn into_record(self) -> PhotoRecord {
        PhotoRecord::new(self.id, self.uri, self.width, self.height).with_creation_time(self.creation_time)
    }
}

/// Read access to the device photo library
pub trait PhotoSource: Send + Sync {
    /// The `limit` newest photos, ordered oldest to newest
    fn list_photos(&self, limit: usize) -> Result<Vec<AssetInfo>>;

    /// Raw GPS coordinates of an asset, `None` when it has none
    fn location(&self, asset_id: &str) -> Result<Option<(f64, f64)>>;

    /// A locally readable `file://` URI for the asset, if the library has one
    fn local_uri(&self, asset_id: &str) -> Result<Option<String>>;
}

/// Produces new, re-encoded images from existing ones
pub trait ImageTransform: Send + Sync {
    /// Center-crop to a square and resize to exactly `width` x `height`.
    /// Returns a handle to the re-encoded image.
    fn crop_square_resize(&self, uri: &str, width: u32, height: u32) -> Result<String>;

    /// Re-encode without geometric changes, yielding a local `file://` handle
    fn reencode(&self, uri: &str) -> Result<String>;
}

/// A decoded image as tightly packed RGBA bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

pub trait ImageDecode: Send + Sync {
    fn decode(&self, uri: &str) -> Result<DecodedImage>;
}

pub trait FaceDetector: Send + Sync {
    /// Whether at least one face is visible. `file_uri` is always `file://`.
    fn has_face(&self, file_uri: &str) -> Result<bool>;
}

/// A loaded image classification model
pub trait Classifier: Send + Sync {
    /// Side length of the square input tensor
    fn input_size(&self) -> u32;

    /// Label text per class index, without the background class
    fn labels(&self) -> &[String];

    /// Per-class scores for a NHWC `[0, 1]` RGB tensor
    fn classify(&self, tensor: &[f32]) -> Result<Vec<f32>>;
}

/// One reverse-geocoding candidate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub city: Option<String>,
    pub subregion: Option<String>,
    pub district: Option<String>,
    pub name: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

impl Place {
    /// Most specific locality name available
    pub fn locality(&self) -> Option<&str> {
        [&self.city, &self.subregion, &self.district, &self.name]
            .into_iter()
            .filter_map(|s| s.as_deref())
            .find(|s| !s.is_empty())
    }
}

pub trait Geocoder: Send + Sync {
    fn reverse_geocode(&self, coords: Coordinates) -> Result<Vec<Place>>;
}

/// Geocoder for sessions without network access; every lookup fails
pub struct OfflineGeocoder;

impl Geocoder for OfflineGeocoder {
    fn reverse_geocode(&self, _coords: Coordinates) -> Result<Vec<Place>> {
        anyhow::bail!("reverse geocoding is not available offline")
    }
}

pub trait AlbumSource: Send + Sync {
    fn list_albums(&self) -> Result<Vec<AlbumSummary>>;

    /// Up to `limit` newest assets of an album, ordered oldest to newest
    fn album_assets(&self, album_id: &str, limit: usize) -> Result<Vec<AssetInfo>>;
}

/// The collaborators a session runs against. Face detection and albums are
/// optional; passes that need a missing one are skipped.
#[derive(Clone)]
pub struct Collaborators {
    pub photos: Arc<dyn PhotoSource>,
    pub transform: Arc<dyn ImageTransform>,
    pub decoder: Arc<dyn ImageDecode>,
    pub geocoder: Arc<dyn Geocoder>,
    pub faces: Option<Arc<dyn FaceDetector>>,
    pub albums: Option<Arc<dyn AlbumSource>>,
}
