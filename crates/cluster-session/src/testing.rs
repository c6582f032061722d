//! In-memory collaborators for session and pass tests

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use photo_clustering::{AlbumSummary, Coordinates};

use crate::sources::{
    AlbumSource, AssetInfo, Classifier, Collaborators, DecodedImage, FaceDetector, Geocoder, ImageDecode,
    ImageTransform, PhotoSource, Place,
};

pub const BASE: i64 = 1_705_329_000; // 2024-01-15 14:30:00 UTC

pub fn asset(id: &str, secs: i64) -> AssetInfo {
    AssetInfo {
        id: id.to_string(),
        uri: format!("ph://{}", id),
        width: 400,
        height: 300,
        creation_time: Some(secs),
    }
}

/// Photo library; assets are kept oldest to newest
#[derive(Default)]
pub struct FakeLibrary {
    pub assets: Vec<AssetInfo>,
    pub locations: HashMap<String, (f64, f64)>,
    pub location_errors: HashSet<String>,
    pub deny_access: bool,
}

impl FakeLibrary {
    pub fn with_assets(assets: Vec<AssetInfo>) -> Self {
        Self {
            assets,
            ..Self::default()
        }
    }
}

impl PhotoSource for FakeLibrary {
    fn list_photos(&self, limit: usize) -> Result<Vec<AssetInfo>> {
        if self.deny_access {
            bail!("photo library access denied");
        }
        let start = self.assets.len().saturating_sub(limit);
        Ok(self.assets[start..].to_vec())
    }

    fn location(&self, asset_id: &str) -> Result<Option<(f64, f64)>> {
        if self.location_errors.contains(asset_id) {
            bail!("location permission revoked");
        }
        Ok(self.locations.get(asset_id).copied())
    }

    fn local_uri(&self, asset_id: &str) -> Result<Option<String>> {
        Ok(Some(format!("file:///library/{}.jpg", asset_id)))
    }
}

/// Transform and decoder pair. Handles carry the requested size as a
/// `#WxH` suffix; decoding yields a left-to-right gradient, or a flat image
/// for URIs containing "flat". URIs containing "broken" fail to transform.
pub struct FakeImages;

impl ImageTransform for FakeImages {
    fn crop_square_resize(&self, uri: &str, width: u32, height: u32) -> Result<String> {
        if uri.contains("broken") {
            bail!("cannot read {}", uri);
        }
        Ok(format!("{}#{}x{}", uri, width, height))
    }

    fn reencode(&self, uri: &str) -> Result<String> {
        Ok(format!("file:///scratch/{}", uri.replace("://", "_")))
    }
}

impl ImageDecode for FakeImages {
    fn decode(&self, uri: &str) -> Result<DecodedImage> {
        let Some((_, size)) = uri.rsplit_once('#') else {
            bail!("not a transformed handle: {}", uri);
        };
        let Some((w, h)) = size.split_once('x') else {
            bail!("bad size suffix: {}", size);
        };
        let (width, height): (u32, u32) = (w.parse()?, h.parse()?);
        let flat = uri.contains("flat");

        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for _y in 0..height {
            for x in 0..width {
                let v = if flat { 128 } else { (x * 255 / width) as u8 };
                rgba.extend_from_slice(&[v, v, v, 255]);
            }
        }
        Ok(DecodedImage { width, height, rgba })
    }
}

/// Finds a face in any file whose name contains "face"
pub struct FakeFaces;

impl FaceDetector for FakeFaces {
    fn has_face(&self, file_uri: &str) -> Result<bool> {
        assert!(file_uri.starts_with("file://"), "detector got {}", file_uri);
        if file_uri.contains("facefail") {
            bail!("detector crashed");
        }
        Ok(file_uri.contains("face"))
    }
}

/// Returns the same scores for every input
pub struct FakeClassifier {
    pub labels: Vec<String>,
    pub scores: Vec<f32>,
}

impl FakeClassifier {
    pub fn pets() -> Self {
        Self {
            labels: ["pizza", "golden retriever", "rock"].map(String::from).to_vec(),
            scores: vec![0.1, 0.8, 0.1],
        }
    }
}

impl Classifier for FakeClassifier {
    fn input_size(&self) -> u32 {
        4
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn classify(&self, tensor: &[f32]) -> Result<Vec<f32>> {
        if tensor.len() != 4 * 4 * 3 {
            bail!("unexpected tensor length {}", tensor.len());
        }
        Ok(self.scores.clone())
    }
}

/// Geocoder keyed by `"{lat:.2},{lon:.2}"`; unknown keys fail
#[derive(Default)]
pub struct FakeGeocoder {
    pub places: HashMap<String, Place>,
}

impl FakeGeocoder {
    pub fn with_city(mut self, key: &str, city: &str, country: &str) -> Self {
        self.places.insert(
            key.to_string(),
            Place {
                city: Some(city.to_string()),
                country: Some(country.to_string()),
                ..Place::default()
            },
        );
        self
    }
}

impl Geocoder for FakeGeocoder {
    fn reverse_geocode(&self, coords: Coordinates) -> Result<Vec<Place>> {
        let key = format!("{:.2},{:.2}", coords.lat, coords.lon);
        match self.places.get(&key) {
            Some(place) => Ok(vec![place.clone()]),
            None => bail!("no geocoder result for {}", key),
        }
    }
}

#[derive(Default)]
pub struct FakeAlbums {
    pub albums: Vec<(AlbumSummary, Vec<AssetInfo>)>,
    /// Time each `album_assets` call takes
    pub load_delay: Duration,
}

impl FakeAlbums {
    pub fn with_album(mut self, id: &str, title: &str, assets: Vec<AssetInfo>) -> Self {
        let summary = AlbumSummary {
            id: id.to_string(),
            title: title.to_string(),
            asset_count: assets.len(),
        };
        self.albums.push((summary, assets));
        self
    }
}

impl AlbumSource for FakeAlbums {
    fn list_albums(&self) -> Result<Vec<AlbumSummary>> {
        Ok(self.albums.iter().map(|(summary, _)| summary.clone()).collect())
    }

    fn album_assets(&self, album_id: &str, limit: usize) -> Result<Vec<AssetInfo>> {
        if !self.load_delay.is_zero() {
            std::thread::sleep(self.load_delay);
        }
        let Some((_, assets)) = self.albums.iter().find(|(s, _)| s.id == album_id) else {
            bail!("no album {}", album_id);
        };
        let start = assets.len().saturating_sub(limit);
        Ok(assets[start..].to_vec())
    }
}

pub fn collaborators(library: FakeLibrary) -> Collaborators {
    let images = Arc::new(FakeImages);
    Collaborators {
        photos: Arc::new(library),
        transform: images.clone(),
        decoder: images,
        geocoder: Arc::new(FakeGeocoder::default()),
        faces: Some(Arc::new(FakeFaces)),
        albums: None,
    }
}
