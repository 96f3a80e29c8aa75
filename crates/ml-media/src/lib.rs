//! # ml-media
//!
//! Polymorphic media attachments for Medialib RS.
//!
//! ## Features
//!
//! - Any owner type can attach files (`HasMedia`)
//! - Named disks (local filesystem, in-memory)
//! - Optional aspect-preserving thumbnails
//! - Collections, per-owner queries, and public URL projection
//!
//! ## Example
//!
//! ```rust,ignore
//! use ml_media::{
//!     Disks, ImageThumbnailer, MediaOptions, MediaService, MemoryMediaStore, OwnerRef, UploadedFile,
//! };
//! use std::sync::Arc;
//!
//! let service = MediaService::new(
//!     Arc::new(MemoryMediaStore::new()),
//!     Disks::local(&config.media),
//!     Arc::new(ImageThumbnailer::new()),
//!     (&config).into(),
//! );
//!
//! let user = OwnerRef::new("User", 42);
//! let record = service
//!     .for_owner(&user)
//!     .store(
//!         &UploadedFile::new("photo.jpg", bytes),
//!         MediaOptions::new().to_collection("avatars").with_thumbnail(50, 50),
//!     )
//!     .await?;
//! ```

pub mod error;
pub mod model;
pub mod projection;
pub mod service;
pub mod storage;
pub mod store;
pub mod thumbnail;

pub use error::{MediaError, MediaResult};
pub use model::{
    HasMedia, MediaDescriptor, MediaOptions, MediaRecord, OwnerRef, StoredNames, ThumbnailSize,
    UpdateMediaParams, UploadedFile, THUMBNAIL_PREFIX,
};
pub use projection::UrlBuilder;
pub use service::{MediaConfig, MediaService, OwnerMedia};
pub use storage::{
    Disks, LocalStorage, MemoryStorage, Storage, StorageError, StorageResult,
    DIRECTORY_PERMISSIONS,
};
pub use store::{MediaFilter, MediaStore, MemoryMediaStore};
pub use thumbnail::{ImageThumbnailer, ThumbnailError, ThumbnailGenerator};
