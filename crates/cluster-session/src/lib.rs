//! Session layer for photo-clusters
//!
//! Owns the photo list and lookup tables of one session, fills them with
//! cancelable background passes, and exposes grouped views built by
//! `photo_clustering`. Photo libraries, image codecs, models and geocoders
//! are reached through the traits in [`sources`].

pub mod config;
pub mod folder;
pub mod passes;
pub mod prep;
pub mod session;
pub mod sources;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::SessionConfig;
pub use folder::{FolderAlbumSource, FolderPhotoSource};
pub use passes::{PassContext, PassKind, PassProgress, PassScheduler};
pub use prep::{ensure_file_uri, photo_dhash, photo_tensor, rgba_to_tensor, ImageCodec, PrepError};
pub use session::{ClusterMode, ClusterSession, GroupView, ModelStatus, SessionError};
pub use sources::{
    AlbumSource, AssetInfo, Classifier, Collaborators, DecodedImage, FaceDetector, Geocoder, ImageDecode,
    ImageTransform, OfflineGeocoder, PhotoSource, Place,
};
pub use store::{LookupStore, StoreStats, Table};
