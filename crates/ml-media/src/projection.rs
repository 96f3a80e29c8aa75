//! Media library projection
//!
//! Turns stored records into descriptors carrying public URLs of the form
//! `{base_url}/storage/[{disk}/]{path}{filename}`.

use crate::model::{MediaDescriptor, MediaRecord};

/// Builds public URLs for stored media
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBuilder {
    base_url: String,
    public_disk: String,
}

impl UrlBuilder {
    pub fn new(base_url: impl Into<String>, public_disk: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            public_disk: public_disk.into(),
        }
    }

    /// Disk segment of a URL; the public disk is served without one
    fn disk_segment(&self, disk: &str) -> String {
        if disk.is_empty() || disk == self.public_disk {
            String::new()
        } else {
            format!("{}/", disk)
        }
    }

    /// Public URL of a file stored under `path` on `disk`
    pub fn url(&self, disk: &str, path: &str, filename: &str) -> String {
        format!(
            "{}/storage/{}{}{}",
            self.base_url,
            self.disk_segment(disk),
            path,
            filename
        )
    }

    /// Project one record
    pub fn describe(&self, record: &MediaRecord) -> MediaDescriptor {
        MediaDescriptor {
            id: record.id,
            name: record.media.clone(),
            media_type: record.media_type.clone(),
            collection: record.collection.clone(),
            media: self.url(&record.disk, &record.path, &record.media),
            thumbnail: record
                .thumbnail
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(|t| self.url(&record.disk, &record.path, t)),
        }
    }

    /// Project records, keeping their order
    pub fn transform(&self, records: &[MediaRecord]) -> Vec<MediaDescriptor> {
        records.iter().map(|r| self.describe(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OwnerRef, StoredNames};

    fn record(disk: &str, thumbnail: bool) -> MediaRecord {
        let mut record = MediaRecord::new(
            &OwnerRef::new("User", 42),
            disk,
            "avatars",
            &StoredNames::derive(Some("me"), "jpg", thumbnail),
        );
        record.id = Some(3);
        record
    }

    #[test]
    fn test_public_disk_has_no_segment() {
        let urls = UrlBuilder::new("https://example.com/", "public");
        let descriptor = urls.describe(&record("public", true));

        assert_eq!(descriptor.media, "https://example.com/storage/42/me.jpg");
        assert_eq!(
            descriptor.thumbnail.as_deref(),
            Some("https://example.com/storage/42/thumbnail_me.jpg")
        );
        assert_eq!(descriptor.name, "me.jpg");
        assert_eq!(descriptor.media_type, "jpg");
        assert_eq!(descriptor.collection, "avatars");
        assert_eq!(descriptor.id, Some(3));
    }

    #[test]
    fn test_other_disk_gets_segment() {
        let urls = UrlBuilder::new("https://example.com", "public");
        let descriptor = urls.describe(&record("s3", false));

        assert_eq!(descriptor.media, "https://example.com/storage/s3/42/me.jpg");
        assert_eq!(descriptor.thumbnail, None);
    }

    #[test]
    fn test_empty_disk_has_no_segment() {
        let urls = UrlBuilder::new("http://localhost", "public");
        assert_eq!(urls.url("", "1/", "a.png"), "http://localhost/storage/1/a.png");
    }

    #[test]
    fn test_transform_is_pure() {
        let urls = UrlBuilder::new("http://localhost", "public");
        let records = vec![record("public", true), record("archive", false)];

        let first = urls.transform(&records);
        let second = urls.transform(&records);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first[1].media.contains("/storage/archive/42/"));
    }
}
