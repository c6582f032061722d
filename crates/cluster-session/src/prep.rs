//! Image preparation for hashing and classification
//!
//! Both pipelines center-crop the source to a square, scale it to a small
//! fixed size, re-encode it as JPEG and decode the result back to RGBA. The
//! `image` crate backs the default [`ImageCodec`]; re-encoded files live in a
//! scratch directory owned by the codec and removed with it.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use photo_clustering::{dhash_rgba, HashError, HashGrid, PhotoRecord};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use thiserror::Error;

use crate::sources::{DecodedImage, ImageDecode, ImageTransform, PhotoSource};

const JPEG_QUALITY: u8 = 90;

/// Per-photo preparation failures. Callers record these as "failed" entries
/// and move on to the next photo.
#[derive(Error, Debug)]
pub enum PrepError {
    #[error("decoded size mismatch: {actual_w}x{actual_h}, expected {expected_w}x{expected_h}")]
    SizeMismatch {
        expected_w: u32,
        expected_h: u32,
        actual_w: u32,
        actual_h: u32,
    },

    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferLength { expected: usize, actual: usize },

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error("image operation failed: {0:#}")]
    Collaborator(#[from] anyhow::Error),
}

/// Crop rectangle `(x, y, side)` of the centered square inside `width` x `height`
pub fn square_crop_rect(width: u32, height: u32) -> (u32, u32, u32) {
    let side = width.min(height);
    ((width - side) / 2, (height - side) / 2, side)
}

/// Resolve a `file://` URI or plain path to a filesystem path
pub fn uri_to_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
}

pub fn path_to_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// `image`-crate implementation of [`ImageTransform`] and [`ImageDecode`]
pub struct ImageCodec {
    scratch: TempDir,
}

impl ImageCodec {
    pub fn new() -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("photo-clusters-")
            .tempdir()
            .context("Failed to create scratch directory")?;
        Ok(Self { scratch })
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Scratch file for an operation on a source, stable across calls
    fn scratch_path(&self, uri: &str, op: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(uri.as_bytes());
        hasher.update(op.as_bytes());
        let digest = hasher.finalize();
        self.scratch.path().join(format!("{}.jpg", hex::encode(&digest[..16])))
    }

    fn open(uri: &str) -> Result<DynamicImage> {
        let path = uri_to_path(uri);
        ImageReader::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?
            .with_guessed_format()?
            .decode()
            .with_context(|| format!("Failed to decode {}", path.display()))
    }

    fn write_jpeg(img: &DynamicImage, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), JPEG_QUALITY);
        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(encoder)
            .with_context(|| format!("Failed to encode JPEG {}", path.display()))
    }
}

impl ImageTransform for ImageCodec {
    fn crop_square_resize(&self, uri: &str, width: u32, height: u32) -> Result<String> {
        let out = self.scratch_path(uri, &format!("square-{}x{}", width, height));
        if !out.exists() {
            let img = Self::open(uri)?;
            let (w, h) = img.dimensions();
            let (x, y, side) = square_crop_rect(w, h);
            let resized = img.crop_imm(x, y, side, side).resize_exact(width, height, FilterType::Triangle);
            Self::write_jpeg(&resized, &out)?;
        }
        Ok(path_to_uri(&out))
    }

    fn reencode(&self, uri: &str) -> Result<String> {
        let out = self.scratch_path(uri, "reencode");
        if !out.exists() {
            Self::write_jpeg(&Self::open(uri)?, &out)?;
        }
        Ok(path_to_uri(&out))
    }
}

impl ImageDecode for ImageCodec {
    fn decode(&self, uri: &str) -> Result<DecodedImage> {
        let rgba = Self::open(uri)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(DecodedImage {
            width,
            height,
            rgba: rgba.into_raw(),
        })
    }
}

/// Crop, scale and decode a photo, insisting on the exact output size
fn prepare_square(
    photo: &PhotoRecord,
    size: (u32, u32),
    transform: &dyn ImageTransform,
    decoder: &dyn ImageDecode,
) -> Result<DecodedImage, PrepError> {
    let resized = transform.crop_square_resize(&photo.uri, size.0, size.1)?;
    let decoded = decoder.decode(&resized)?;
    if decoded.width != size.0 || decoded.height != size.1 {
        return Err(PrepError::SizeMismatch {
            expected_w: size.0,
            expected_h: size.1,
            actual_w: decoded.width,
            actual_h: decoded.height,
        });
    }
    Ok(decoded)
}

/// Perceptual fingerprint of a photo
pub fn photo_dhash(
    photo: &PhotoRecord,
    grid: HashGrid,
    transform: &dyn ImageTransform,
    decoder: &dyn ImageDecode,
) -> Result<u64, PrepError> {
    let decoded = prepare_square(photo, (grid.width, grid.height), transform, decoder)?;
    Ok(dhash_rgba(&decoded.rgba, decoded.width, decoded.height, grid)?)
}

/// Classifier input for a photo: NHWC RGB floats in `[0, 1]`
pub fn photo_tensor(
    photo: &PhotoRecord,
    size: u32,
    transform: &dyn ImageTransform,
    decoder: &dyn ImageDecode,
) -> Result<Vec<f32>, PrepError> {
    let decoded = prepare_square(photo, (size, size), transform, decoder)?;
    rgba_to_tensor(&decoded.rgba, size)
}

/// Drop alpha and scale RGBA bytes to `[0, 1]` floats
pub fn rgba_to_tensor(rgba: &[u8], size: u32) -> Result<Vec<f32>, PrepError> {
    let pixels = size as usize * size as usize;
    if rgba.len() != pixels * 4 {
        return Err(PrepError::BufferLength {
            expected: pixels * 4,
            actual: rgba.len(),
        });
    }

    let mut out = Vec::with_capacity(pixels * 3);
    for px in rgba.chunks_exact(4) {
        out.extend(px[..3].iter().map(|&c| c as f32 / 255.0));
    }
    Ok(out)
}

/// A `file://` URI the face detector can read.
///
/// Tries the URI itself, then the library's local copy, and finally
/// re-encodes the image into a local file.
pub fn ensure_file_uri(
    photo: &PhotoRecord,
    source: &dyn PhotoSource,
    transform: &dyn ImageTransform,
) -> Result<String> {
    if photo.uri.starts_with("file://") {
        return Ok(photo.uri.clone());
    }

    match source.local_uri(&photo.id) {
        Ok(Some(local)) if local.starts_with("file://") => return Ok(local),
        Ok(_) => {}
        Err(e) => tracing::debug!("No local URI for {}: {:#}", photo.id, e),
    }

    transform.reencode(&photo.uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn write_gradient(path: &Path, width: u32, height: u32) {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
        });
        img.save(path).unwrap();
    }

    fn record(path: &Path) -> PhotoRecord {
        PhotoRecord::new("p", path_to_uri(path), 64, 48)
    }

    #[test]
    fn test_square_crop_rect() {
        assert_eq!(square_crop_rect(4000, 3000), (500, 0, 3000));
        assert_eq!(square_crop_rect(3000, 4000), (0, 500, 3000));
        assert_eq!(square_crop_rect(101, 100), (0, 0, 100));
        assert_eq!(square_crop_rect(50, 50), (0, 0, 50));
    }

    #[test]
    fn test_uri_to_path() {
        assert_eq!(uri_to_path("file:///tmp/a.jpg"), PathBuf::from("/tmp/a.jpg"));
        assert_eq!(uri_to_path("/tmp/b.jpg"), PathBuf::from("/tmp/b.jpg"));
    }

    #[test]
    fn test_rgba_to_tensor() {
        let rgba = [255, 0, 51, 7, 0, 255, 0, 255, 0, 0, 0, 0, 255, 255, 255, 255];
        let tensor = rgba_to_tensor(&rgba, 2).unwrap();
        assert_eq!(tensor.len(), 12);
        assert_eq!(&tensor[..3], &[1.0, 0.0, 0.2]);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));

        assert!(matches!(
            rgba_to_tensor(&rgba, 3),
            Err(PrepError::BufferLength { expected: 36, actual: 16 })
        ));
    }

    #[test]
    fn test_crop_square_resize_produces_exact_size() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("wide.png");
        write_gradient(&src, 64, 48);

        let codec = ImageCodec::new()?;
        let out = codec.crop_square_resize(&path_to_uri(&src), 9, 8)?;
        assert!(out.starts_with("file://"));
        assert!(uri_to_path(&out).starts_with(codec.scratch_dir()));

        let decoded = codec.decode(&out)?;
        assert_eq!((decoded.width, decoded.height), (9, 8));
        assert_eq!(decoded.rgba.len(), 9 * 8 * 4);
        Ok(())
    }

    #[test]
    fn test_photo_dhash_is_deterministic() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("gradient.png");
        write_gradient(&src, 64, 48);

        let codec = ImageCodec::new()?;
        let photo = record(&src);
        let a = photo_dhash(&photo, HashGrid::default(), &codec, &codec).unwrap();
        let b = photo_dhash(&photo, HashGrid::default(), &codec, &codec).unwrap();
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_photo_tensor_size() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("tall.png");
        write_gradient(&src, 30, 60);

        let codec = ImageCodec::new()?;
        let tensor = photo_tensor(&record(&src), 16, &codec, &codec).unwrap();
        assert_eq!(tensor.len(), 16 * 16 * 3);
        Ok(())
    }

    struct WrongSizeDecoder;

    impl ImageDecode for WrongSizeDecoder {
        fn decode(&self, _uri: &str) -> Result<DecodedImage> {
            Ok(DecodedImage {
                width: 8,
                height: 8,
                rgba: vec![0; 8 * 8 * 4],
            })
        }
    }

    #[test]
    fn test_size_mismatch_is_reported() -> Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("img.png");
        write_gradient(&src, 20, 20);

        let codec = ImageCodec::new()?;
        let err = photo_dhash(&record(&src), HashGrid::default(), &codec, &WrongSizeDecoder).unwrap_err();
        assert!(matches!(err, PrepError::SizeMismatch { actual_w: 8, actual_h: 8, .. }));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_collaborator_error() -> Result<()> {
        let codec = ImageCodec::new()?;
        let photo = PhotoRecord::new("gone", "file:///definitely/not/here.jpg", 10, 10);
        let err = photo_dhash(&photo, HashGrid::default(), &codec, &codec).unwrap_err();
        assert!(matches!(err, PrepError::Collaborator(_)));
        Ok(())
    }
}
