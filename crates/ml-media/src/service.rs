//! Media Service
//!
//! Orchestrates blob storage, thumbnails, and metadata for media owners.

use std::sync::Arc;

use dashmap::DashMap;
use ml_core::config::{AppConfig, MediaSettings};
use ml_core::traits::Id;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::error::{MediaError, MediaResult};
use crate::model::{
    HasMedia, MediaDescriptor, MediaOptions, MediaRecord, OwnerRef, StoredNames, ThumbnailSize,
    UpdateMediaParams, UploadedFile,
};
use crate::projection::UrlBuilder;
use crate::storage::{Disks, Storage, DIRECTORY_PERMISSIONS};
use crate::store::{MediaFilter, MediaStore};
use crate::thumbnail::{ImageThumbnailer, ThumbnailGenerator};

/// Media service configuration
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Base URL of the public `/storage/` route
    pub base_url: String,
    /// Disk served without a disk segment in URLs
    pub public_disk: String,
    pub default_disk: String,
    pub default_collection: String,
    /// Box used when a thumbnail is requested without dimensions
    pub default_thumbnail: ThumbnailSize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost".to_string(),
            public_disk: MediaSettings::PUBLIC_DISK.to_string(),
            default_disk: MediaSettings::PUBLIC_DISK.to_string(),
            default_collection: "default".to_string(),
            default_thumbnail: ThumbnailSize::default(),
        }
    }
}

impl From<&AppConfig> for MediaConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.app.url.clone(),
            public_disk: MediaSettings::PUBLIC_DISK.to_string(),
            default_disk: config.media.default_disk.clone(),
            default_collection: config.media.default_collection.clone(),
            default_thumbnail: ThumbnailSize::new(
                config.media.thumbnail_width,
                config.media.thumbnail_height,
            ),
        }
    }
}

/// Serializes mutating operations per owner
#[derive(Debug, Default)]
struct OwnerLocks {
    locks: DashMap<OwnerRef, Arc<Mutex<()>>>,
}

impl OwnerLocks {
    async fn lock(&self, owner: &OwnerRef) -> OwnerGuard<'_> {
        let mutex = self.locks.entry(owner.clone()).or_default().clone();
        OwnerGuard {
            locks: self,
            owner: owner.clone(),
            guard: Some(mutex.lock_owned().await),
        }
    }
}

/// Held lock on one owner; the map entry goes away with the last holder
struct OwnerGuard<'a> {
    locks: &'a OwnerLocks,
    owner: OwnerRef,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks
            .locks
            .remove_if(&self.owner, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Media service
pub struct MediaService<St: MediaStore, T: ThumbnailGenerator = ImageThumbnailer> {
    store: Arc<St>,
    disks: Disks,
    thumbnails: Arc<T>,
    config: MediaConfig,
    urls: UrlBuilder,
    locks: OwnerLocks,
}

impl<St: MediaStore, T: ThumbnailGenerator> MediaService<St, T> {
    pub fn new(store: Arc<St>, disks: Disks, thumbnails: Arc<T>, config: MediaConfig) -> Self {
        let urls = UrlBuilder::new(&config.base_url, &config.public_disk);
        Self {
            store,
            disks,
            thumbnails,
            config,
            urls,
            locks: OwnerLocks::default(),
        }
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    pub fn disks(&self) -> &Disks {
        &self.disks
    }

    pub fn urls(&self) -> &UrlBuilder {
        &self.urls
    }

    /// Start a media session for an owner
    pub fn for_owner(&self, owner: &impl HasMedia) -> OwnerMedia<'_, St, T> {
        OwnerMedia {
            service: self,
            owner: owner.owner_ref(),
        }
    }

    fn disk(&self, name: &str) -> MediaResult<Arc<dyn Storage>> {
        self.disks
            .disk(name)
            .ok_or_else(|| MediaError::UnknownDisk(name.to_string()))
    }
}

/// Media operations scoped to one owner
pub struct OwnerMedia<'a, St: MediaStore, T: ThumbnailGenerator> {
    service: &'a MediaService<St, T>,
    owner: OwnerRef,
}

impl<St: MediaStore, T: ThumbnailGenerator> OwnerMedia<'_, St, T> {
    pub fn owner(&self) -> &OwnerRef {
        &self.owner
    }

    /// Store a file and create its record
    #[instrument(skip(self, file, options), fields(owner = %self.owner, filename = %file.filename))]
    pub async fn store(
        &self,
        file: &UploadedFile,
        options: MediaOptions,
    ) -> MediaResult<MediaRecord> {
        if let Some(name) = options.name.as_deref() {
            validate_name(name)?;
        }

        let config = &self.service.config;
        let disk_name = options.disk.unwrap_or_else(|| config.default_disk.clone());
        let collection = options
            .collection
            .unwrap_or_else(|| config.default_collection.clone());
        let thumbnail = options
            .thumbnail
            .map(|size| size.unwrap_or(config.default_thumbnail));

        let disk = self.service.disk(&disk_name)?;
        let _guard = self.service.locks.lock(&self.owner).await;

        let path = self.owner.path();
        ensure_directory(disk.as_ref(), &path).await?;

        let names = StoredNames::derive(
            options.name.as_deref(),
            file.extension(),
            thumbnail.is_some(),
        );
        self.write_files(disk.as_ref(), &path, file, &names, thumbnail).await?;

        let mut record = MediaRecord::new(&self.owner, disk_name, collection, &names);
        if let Err(e) = self.service.store.create(&mut record).await {
            warn!(
                disk = %record.disk,
                key = %record.media_key(),
                error = %e,
                "Media record not created, blobs orphaned"
            );
            return Err(e);
        }

        info!(id = ?record.id, disk = %record.disk, media = %record.media, "Media stored");
        Ok(record)
    }

    /// Replace the files of one of this owner's records.
    ///
    /// Returns `None` without touching anything when the owner has no record with `media_id`.
    #[instrument(skip(self, file, params), fields(owner = %self.owner, filename = %file.filename))]
    pub async fn update_media(
        &self,
        file: &UploadedFile,
        media_id: Id,
        params: UpdateMediaParams,
    ) -> MediaResult<Option<MediaRecord>> {
        if let Some(name) = params.name.as_deref() {
            validate_name(name)?;
        }

        let _guard = self.service.locks.lock(&self.owner).await;

        let Some(mut record) = self.find(media_id).await? else {
            debug!(media_id, "No media to update");
            return Ok(None);
        };

        let disk = self.service.disk(&record.disk)?;
        ensure_directory(disk.as_ref(), &record.path).await?;

        let names = StoredNames::derive(
            params.name.as_deref(),
            file.extension(),
            params.thumbnail.is_some(),
        );
        self.write_files(disk.as_ref(), &record.path, file, &names, params.thumbnail).await?;

        let written: Vec<String> = std::iter::once(&names.file_name)
            .chain(names.thumbnail_name.as_ref())
            .map(|name| format!("{}{}", record.path, name))
            .collect();
        let stale = [Some(record.media_key()), record.thumbnail_key()];
        for key in stale.into_iter().flatten() {
            if !written.contains(&key) {
                remove_blob(disk.as_ref(), &key).await?;
            }
        }

        record.replace_files(&names);
        self.service.store.update(&record).await?;

        info!(id = media_id, media = %record.media, "Media updated");
        Ok(Some(record))
    }

    /// Delete one record, or every record of the owner when `media_id` is `None`.
    ///
    /// Returns the number of records deleted.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn delete_media(&self, media_id: Option<Id>) -> MediaResult<usize> {
        let _guard = self.service.locks.lock(&self.owner).await;

        let records = match media_id {
            Some(id) => match self.find(id).await? {
                Some(record) => vec![record],
                None => {
                    debug!(media_id = id, "No media to delete");
                    return Ok(0);
                }
            },
            None => self.records(&MediaFilter::All).await?,
        };

        self.delete_records(records).await
    }

    /// Delete every record of the owner in a collection
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn delete_collection(&self, collection: &str) -> MediaResult<usize> {
        let _guard = self.service.locks.lock(&self.owner).await;

        let records = self
            .records(&MediaFilter::Collection(collection.to_string()))
            .await?;
        self.delete_records(records).await
    }

    pub async fn has_media(&self) -> MediaResult<bool> {
        self.service.store.exists_for_owner(&self.owner).await
    }

    /// Every record of the owner, projected
    pub async fn get_media(&self) -> MediaResult<Vec<MediaDescriptor>> {
        self.describe(MediaFilter::All).await
    }

    /// The owner's media library
    pub async fn media_library(&self) -> MediaResult<Vec<MediaDescriptor>> {
        self.get_media().await
    }

    pub async fn media_from_collection(
        &self,
        collection: &str,
    ) -> MediaResult<Vec<MediaDescriptor>> {
        self.describe(MediaFilter::Collection(collection.to_string())).await
    }

    pub async fn media_from_disk(&self, disk: &str) -> MediaResult<Vec<MediaDescriptor>> {
        self.describe(MediaFilter::Disk(disk.to_string())).await
    }

    pub async fn media_where_type(&self, media_type: &str) -> MediaResult<Vec<MediaDescriptor>> {
        self.describe(MediaFilter::Type(media_type.to_string())).await
    }

    /// Raw records of the owner matching a filter
    pub async fn records(&self, filter: &MediaFilter) -> MediaResult<Vec<MediaRecord>> {
        self.service.store.query(&self.owner, filter).await
    }

    async fn describe(&self, filter: MediaFilter) -> MediaResult<Vec<MediaDescriptor>> {
        let records = self.records(&filter).await?;
        Ok(self.service.urls.transform(&records))
    }

    /// Find a record by ID, only if it belongs to this owner
    async fn find(&self, media_id: Id) -> MediaResult<Option<MediaRecord>> {
        Ok(self
            .service
            .store
            .find(media_id)
            .await?
            .filter(|record| record.belongs_to(&self.owner)))
    }

    /// Thumbnail first, then the untouched original
    async fn write_files(
        &self,
        disk: &dyn Storage,
        path: &str,
        file: &UploadedFile,
        names: &StoredNames,
        thumbnail: Option<ThumbnailSize>,
    ) -> MediaResult<()> {
        if let (Some(size), Some(thumbnail_name)) = (thumbnail, names.thumbnail_name.as_ref()) {
            let thumbnails = Arc::clone(&self.service.thumbnails);
            let source = file.bytes.clone();
            let resized = tokio::task::spawn_blocking(move || {
                thumbnails.resize(&source, size.width, size.height)
            })
            .await??;
            disk.put(&format!("{}{}", path, thumbnail_name), resized).await?;
        }

        disk.put(&format!("{}{}", path, names.file_name), file.bytes.clone()).await?;
        Ok(())
    }

    async fn delete_records(&self, records: Vec<MediaRecord>) -> MediaResult<usize> {
        let mut deleted = 0;
        for record in records {
            let Some(id) = record.id else { continue };

            let disk = self.service.disk(&record.disk)?;
            remove_blob(disk.as_ref(), &record.media_key()).await?;
            if let Some(key) = record.thumbnail_key() {
                remove_blob(disk.as_ref(), &key).await?;
            }

            self.service.store.delete(id).await?;
            info!(id, media = %record.media, "Media deleted");
            deleted += 1;
        }
        Ok(deleted)
    }
}

/// Stored names live directly in the owner directory
fn validate_name(name: &str) -> MediaResult<()> {
    if name.contains(['/', '\\']) || name.contains("..") {
        return Err(MediaError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Create the owner directory on a disk if it is missing
async fn ensure_directory(disk: &dyn Storage, path: &str) -> MediaResult<()> {
    let dir = format!("/{}", path.trim_end_matches('/'));
    if !disk.exists(&dir).await? {
        disk.make_directory(&dir, DIRECTORY_PERMISSIONS, true).await?;
    }
    Ok(())
}

/// Delete a blob, tolerating its absence
async fn remove_blob(disk: &dyn Storage, key: &str) -> MediaResult<()> {
    if disk.exists(key).await? {
        disk.delete(key).await?;
    } else {
        debug!(key, "Blob already missing");
    }
    Ok(())
}
