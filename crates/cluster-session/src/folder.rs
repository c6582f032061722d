//! Photo and album sources backed by a directory of image files
//!
//! Capture time comes from EXIF `DateTimeOriginal` when present, otherwise
//! from the file modification time. EXIF GPS tags provide locations.
//! Asset ids are paths relative to the source root.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use photo_clustering::AlbumSummary;
use rayon::prelude::*;
use rexif::{ExifTag, TagValue};
use tracing::debug;

use crate::prep::path_to_uri;
use crate::sources::{AlbumSource, AssetInfo, PhotoSource};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "webp", "tif", "tiff"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Metadata read from a file's EXIF block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifSummary {
    pub taken: Option<NaiveDateTime>,
    pub gps: Option<(f64, f64)>,
}

pub fn read_exif(path: &Path) -> Option<ExifSummary> {
    let bytes = fs::read(path).ok()?;
    let exif = match rexif::parse_buffer(&bytes) {
        Ok(exif) => exif,
        Err(e) => {
            debug!("No EXIF in {}: {}", path.display(), e);
            return None;
        }
    };

    let mut summary = ExifSummary::default();
    let (mut lat, mut lat_ref, mut lon, mut lon_ref) = (None, None, None, None);
    for entry in &exif.entries {
        match (&entry.tag, &entry.value) {
            (ExifTag::DateTimeOriginal, TagValue::Ascii(s)) => summary.taken = parse_exif_datetime(s),
            (ExifTag::GPSLatitude, TagValue::URational(parts)) => {
                lat = dms_to_degrees(&parts.iter().map(|r| r.value()).collect::<Vec<_>>())
            }
            (ExifTag::GPSLongitude, TagValue::URational(parts)) => {
                lon = dms_to_degrees(&parts.iter().map(|r| r.value()).collect::<Vec<_>>())
            }
            (ExifTag::GPSLatitudeRef, TagValue::Ascii(s)) => lat_ref = Some(s.trim().to_uppercase()),
            (ExifTag::GPSLongitudeRef, TagValue::Ascii(s)) => lon_ref = Some(s.trim().to_uppercase()),
            _ => {}
        }
    }

    if let (Some(lat), Some(lon)) = (lat, lon) {
        let lat = if lat_ref.as_deref() == Some("S") { -lat } else { lat };
        let lon = if lon_ref.as_deref() == Some("W") { -lon } else { lon };
        summary.gps = Some((lat, lon));
    }
    Some(summary)
}

/// Parse `"YYYY:MM:DD HH:MM:SS"`, tolerating trailing NULs
pub fn parse_exif_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim_end_matches('\0').trim();
    NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S").ok()
}

/// Degrees, minutes, seconds to decimal degrees
pub fn dms_to_degrees(dms: &[f64]) -> Option<f64> {
    match dms {
        [d, m, s, ..] => Some(d + m / 60.0 + s / 3600.0),
        [d, m] => Some(d + m / 60.0),
        [d] => Some(*d),
        [] => None,
    }
}

fn modified_secs(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Utc>::from(modified).timestamp())
}

/// Read one image file into an asset. Files whose pixel size cannot be
/// read are skipped.
fn read_asset(root: &Path, path: &Path, tz: &FixedOffset) -> Option<AssetInfo> {
    let (width, height) = match image::image_dimensions(path) {
        Ok(dims) => dims,
        Err(e) => {
            debug!("Skipping {}: {}", path.display(), e);
            return None;
        }
    };

    let taken = read_exif(path)
        .and_then(|exif| exif.taken)
        .and_then(|naive| tz.from_local_datetime(&naive).single())
        .map(|dt| dt.timestamp());

    let id = path.strip_prefix(root).unwrap_or(path).to_string_lossy().into_owned();
    Some(AssetInfo {
        id,
        uri: path_to_uri(path),
        width,
        height,
        creation_time: taken.or_else(|| modified_secs(path)),
    })
}

fn image_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read directory: {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && is_image_file(&path) {
            paths.push(path);
        }
    }
    Ok(paths)
}

/// Every readable image directly in `dir`, ordered oldest to newest
fn scan_assets(root: &Path, dir: &Path, tz: &FixedOffset) -> Result<Vec<AssetInfo>> {
    let paths = image_paths(dir)?;
    let mut assets: Vec<AssetInfo> = paths.par_iter().filter_map(|p| read_asset(root, p, tz)).collect();
    assets.sort_by(|a, b| {
        a.creation_time
            .unwrap_or(0)
            .cmp(&b.creation_time.unwrap_or(0))
            .then_with(|| a.id.cmp(&b.id))
    });
    Ok(assets)
}

fn newest(mut assets: Vec<AssetInfo>, limit: usize) -> Vec<AssetInfo> {
    let start = assets.len().saturating_sub(limit);
    assets.drain(..start);
    assets
}

/// Photos of a single directory
pub struct FolderPhotoSource {
    root: PathBuf,
    tz: FixedOffset,
}

impl FolderPhotoSource {
    /// `tz` is the offset EXIF local times were recorded in
    pub fn new<P: AsRef<Path>>(root: P, tz: FixedOffset) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            bail!("Not a directory: {}", root.display());
        }
        Ok(Self { root, tz })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl PhotoSource for FolderPhotoSource {
    fn list_photos(&self, limit: usize) -> Result<Vec<AssetInfo>> {
        Ok(newest(scan_assets(&self.root, &self.root, &self.tz)?, limit))
    }

    fn location(&self, asset_id: &str) -> Result<Option<(f64, f64)>> {
        let path = self.root.join(asset_id);
        if !path.is_file() {
            bail!("Unknown asset: {}", asset_id);
        }
        Ok(read_exif(&path).and_then(|exif| exif.gps))
    }

    fn local_uri(&self, asset_id: &str) -> Result<Option<String>> {
        let path = self.root.join(asset_id);
        Ok(path.is_file().then(|| path_to_uri(&path)))
    }
}

/// Each immediate subdirectory of the root is an album
pub struct FolderAlbumSource {
    root: PathBuf,
    tz: FixedOffset,
}

impl FolderAlbumSource {
    pub fn new<P: AsRef<Path>>(root: P, tz: FixedOffset) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            bail!("Not a directory: {}", root.display());
        }
        Ok(Self { root, tz })
    }
}

impl AlbumSource for FolderAlbumSource {
    fn list_albums(&self) -> Result<Vec<AlbumSummary>> {
        let mut albums = Vec::new();
        for entry in fs::read_dir(&self.root).with_context(|| format!("Failed to read directory: {}", self.root.display()))? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            albums.push(AlbumSummary {
                id: name.to_string(),
                title: name.to_string(),
                asset_count: image_paths(&path)?.len(),
            });
        }
        albums.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(albums)
    }

    fn album_assets(&self, album_id: &str, limit: usize) -> Result<Vec<AssetInfo>> {
        let dir = self.root.join(album_id);
        if !dir.is_dir() {
            bail!("Unknown album: {}", album_id);
        }
        Ok(newest(scan_assets(&self.root, &dir, &self.tz)?, limit))
    }
}
