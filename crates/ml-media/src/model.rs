//! Media Model
//!
//! Records, owner references, upload inputs and the public descriptor.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use ml_core::traits::{Id, Identifiable};
use serde::{Deserialize, Serialize};

/// Prefix shared by every stored thumbnail filename
pub const THUMBNAIL_PREFIX: &str = "thumbnail_";

/// An entity that media can be attached to
pub trait HasMedia {
    /// Type tag stored in `model_type` (e.g. "User", "Post")
    fn owner_type(&self) -> &str;

    /// Stable unique id of the owner
    fn owner_id(&self) -> Id;

    fn owner_ref(&self) -> OwnerRef {
        OwnerRef::new(self.owner_type(), self.owner_id())
    }
}

/// Polymorphic owner reference (`model_type`, `model_id`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub owner_type: String,
    pub owner_id: Id,
}

impl OwnerRef {
    pub fn new(owner_type: impl Into<String>, owner_id: Id) -> Self {
        Self {
            owner_type: owner_type.into(),
            owner_id,
        }
    }

    /// Directory prefix of every file this owner stores
    pub fn path(&self) -> String {
        format!("{}/", self.owner_id)
    }
}

impl HasMedia for OwnerRef {
    fn owner_type(&self) -> &str {
        &self.owner_type
    }

    fn owner_id(&self) -> Id {
        self.owner_id
    }
}

impl std::fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.owner_type, self.owner_id)
    }
}

/// A stored media record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Record ID, assigned by the store
    pub id: Option<Id>,
    /// Owner type tag
    pub owner_type: String,
    /// Owner ID
    pub owner_id: Id,
    /// Disk the blobs live on
    pub disk: String,
    /// Directory prefix on the disk ("{owner_id}/")
    pub path: String,
    /// Stored filename of the primary file
    pub media: String,
    /// Stored filename of the thumbnail
    pub thumbnail: Option<String>,
    /// File extension of the upload
    #[serde(rename = "type")]
    pub media_type: String,
    /// Grouping label
    pub collection: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaRecord {
    /// Create an unsaved record for an owner
    pub fn new(
        owner: &OwnerRef,
        disk: impl Into<String>,
        collection: impl Into<String>,
        names: &StoredNames,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            owner_type: owner.owner_type.clone(),
            owner_id: owner.owner_id,
            disk: disk.into(),
            path: owner.path(),
            media: names.file_name.clone(),
            thumbnail: names.thumbnail_name.clone(),
            media_type: names.extension.clone(),
            collection: collection.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn owner(&self) -> OwnerRef {
        OwnerRef::new(self.owner_type.clone(), self.owner_id)
    }

    pub fn belongs_to(&self, owner: &OwnerRef) -> bool {
        self.owner_type == owner.owner_type && self.owner_id == owner.owner_id
    }

    /// Storage key of the primary file
    pub fn media_key(&self) -> String {
        format!("{}{}", self.path, self.media)
    }

    /// Storage key of the thumbnail, if one was stored
    pub fn thumbnail_key(&self) -> Option<String> {
        self.thumbnail
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| format!("{}{}", self.path, t))
    }

    /// Replace the stored files, keeping disk, path and collection
    pub fn replace_files(&mut self, names: &StoredNames) {
        self.media = names.file_name.clone();
        self.thumbnail = names.thumbnail_name.clone();
        self.media_type = names.extension.clone();
        self.updated_at = Utc::now();
    }
}

impl Identifiable for MediaRecord {
    fn id(&self) -> Option<Id> {
        self.id
    }
}

/// An uploaded file
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-side filename, used only for its extension
    pub filename: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Original client extension, without the dot
    pub fn extension(&self) -> &str {
        let name = self
            .filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.filename);
        match name.rfind('.') {
            Some(i) if i > 0 => &name[i + 1..],
            _ => "",
        }
    }
}

/// Thumbnail bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSize {
    pub width: u32,
    pub height: u32,
}

impl ThumbnailSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self::new(100, 100)
    }
}

/// Options for a single store operation
///
/// Unset fields fall back to the service's [`MediaConfig`](crate::MediaConfig).
#[derive(Debug, Clone, Default)]
pub struct MediaOptions {
    pub disk: Option<String>,
    pub collection: Option<String>,
    pub name: Option<String>,
    pub thumbnail: Option<Option<ThumbnailSize>>,
}

impl MediaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_disk(mut self, disk: impl Into<String>) -> Self {
        self.disk = Some(disk.into());
        self
    }

    pub fn to_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Enable a thumbnail with explicit dimensions
    pub fn with_thumbnail(mut self, width: u32, height: u32) -> Self {
        self.thumbnail = Some(Some(ThumbnailSize::new(width, height)));
        self
    }

    /// Enable a thumbnail with the configured default box
    pub fn with_default_thumbnail(mut self) -> Self {
        self.thumbnail = Some(None);
        self
    }
}

/// Parameters for replacing the files of an existing record
#[derive(Debug, Clone)]
pub struct UpdateMediaParams {
    pub name: Option<String>,
    pub thumbnail: Option<ThumbnailSize>,
}

impl Default for UpdateMediaParams {
    fn default() -> Self {
        Self {
            name: None,
            thumbnail: Some(ThumbnailSize::default()),
        }
    }
}

impl UpdateMediaParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_thumbnail(mut self, width: u32, height: u32) -> Self {
        self.thumbnail = Some(ThumbnailSize::new(width, height));
        self
    }

    pub fn without_thumbnail(mut self) -> Self {
        self.thumbnail = None;
        self
    }
}

/// Filenames computed for one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNames {
    pub file_name: String,
    pub thumbnail_name: Option<String>,
    pub extension: String,
}

impl StoredNames {
    /// Derive the stored filenames from an optional name and the upload extension.
    ///
    /// A blank or missing name gets a fresh UUID stem; any other name is kept
    /// as given. The thumbnail name is always `thumbnail_{stem}.{ext}`.
    pub fn derive(name: Option<&str>, extension: &str, with_thumbnail: bool) -> Self {
        let stem = match name {
            Some(n) if !n.trim().is_empty() => n.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };

        let file_name = if extension.is_empty() {
            stem
        } else {
            format!("{}.{}", stem, extension)
        };

        let thumbnail_name = with_thumbnail.then(|| format!("{}{}", THUMBNAIL_PREFIX, file_name));

        Self {
            file_name,
            thumbnail_name,
            extension: extension.to_string(),
        }
    }
}

/// Public-facing view of a media record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub id: Option<Id>,
    /// Stored filename
    pub name: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub collection: String,
    /// Public URL of the primary file
    pub media: String,
    /// Public URL of the thumbnail
    pub thumbnail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_path() {
        let owner = OwnerRef::new("User", 42);
        assert_eq!(owner.path(), "42/");
        assert_eq!(owner.to_string(), "User#42");
    }

    #[test]
    fn test_extension() {
        assert_eq!(UploadedFile::new("photo.jpg", vec![]).extension(), "jpg");
        assert_eq!(UploadedFile::new("archive.tar.gz", vec![]).extension(), "gz");
        assert_eq!(UploadedFile::new("README", vec![]).extension(), "");
        assert_eq!(UploadedFile::new(".env", vec![]).extension(), "");
        assert_eq!(UploadedFile::new("dir.d/notes", vec![]).extension(), "");
    }

    #[test]
    fn test_names_with_custom_name() {
        let names = StoredNames::derive(Some("avatar"), "png", true);
        assert_eq!(names.file_name, "avatar.png");
        assert_eq!(names.thumbnail_name.as_deref(), Some("thumbnail_avatar.png"));
        assert_eq!(names.extension, "png");
    }

    #[test]
    fn test_names_generated_stem() {
        let names = StoredNames::derive(None, "pdf", true);
        let stem = names.file_name.strip_suffix(".pdf").unwrap();
        assert!(uuid::Uuid::parse_str(stem).is_ok());
        assert_eq!(
            names.thumbnail_name.unwrap(),
            format!("thumbnail_{}.pdf", stem)
        );
    }

    #[test]
    fn test_names_blank_name_and_no_thumbnail() {
        let names = StoredNames::derive(Some("  "), "", false);
        assert!(uuid::Uuid::parse_str(&names.file_name).is_ok());
        assert!(names.thumbnail_name.is_none());
    }

    #[test]
    fn test_derive_keeps_name_verbatim() {
        let names = StoredNames::derive(Some(" me "), "png", true);
        assert_eq!(names.file_name, " me .png");
        assert_eq!(names.thumbnail_name.as_deref(), Some("thumbnail_ me .png"));
    }

    #[test]
    fn test_record_keys() {
        let owner = OwnerRef::new("Post", 7);
        let names = StoredNames::derive(Some("cover"), "jpg", true);
        let record = MediaRecord::new(&owner, "public", "default", &names);

        assert_eq!(record.media_key(), "7/cover.jpg");
        assert_eq!(record.thumbnail_key().as_deref(), Some("7/thumbnail_cover.jpg"));
        assert!(record.belongs_to(&owner));
        assert!(!record.belongs_to(&OwnerRef::new("User", 7)));
        assert!(record.is_new_record());
    }

    #[test]
    fn test_replace_files_keeps_location() {
        let owner = OwnerRef::new("Post", 7);
        let mut record = MediaRecord::new(
            &owner,
            "archive",
            "gallery",
            &StoredNames::derive(Some("old"), "jpg", true),
        );

        record.replace_files(&StoredNames::derive(Some("new"), "png", false));

        assert_eq!(record.media, "new.png");
        assert_eq!(record.thumbnail, None);
        assert_eq!(record.media_type, "png");
        assert_eq!(record.disk, "archive");
        assert_eq!(record.path, "7/");
        assert_eq!(record.collection, "gallery");
    }

    #[test]
    fn test_descriptor_serializes_type_field() {
        let descriptor = MediaDescriptor {
            id: Some(1),
            name: "a.jpg".into(),
            media_type: "jpg".into(),
            collection: "default".into(),
            media: "http://localhost/storage/1/a.jpg".into(),
            thumbnail: None,
        };
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["type"], "jpg");
        assert!(json["thumbnail"].is_null());
    }
}
