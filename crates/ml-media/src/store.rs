//! Media metadata store

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use ml_core::traits::Id;
use tokio::sync::RwLock;

use crate::error::{MediaError, MediaResult};
use crate::model::{MediaRecord, OwnerRef};

/// Equality filter over an owner's records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaFilter {
    All,
    Collection(String),
    Disk(String),
    Type(String),
}

impl MediaFilter {
    pub fn matches(&self, record: &MediaRecord) -> bool {
        match self {
            Self::All => true,
            Self::Collection(c) => record.collection == *c,
            Self::Disk(d) => record.disk == *d,
            Self::Type(t) => record.media_type == *t,
        }
    }
}

/// Media store trait
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Create a media record, assigning its ID
    async fn create(&self, record: &mut MediaRecord) -> MediaResult<Id>;

    /// Get a media record by ID
    async fn find(&self, id: Id) -> MediaResult<Option<MediaRecord>>;

    /// Update a media record
    async fn update(&self, record: &MediaRecord) -> MediaResult<()>;

    /// Delete a media record
    async fn delete(&self, id: Id) -> MediaResult<()>;

    /// Records of an owner matching a filter, in ascending ID order
    async fn query(&self, owner: &OwnerRef, filter: &MediaFilter) -> MediaResult<Vec<MediaRecord>>;

    /// Whether the owner has at least one record
    async fn exists_for_owner(&self, owner: &OwnerRef) -> MediaResult<bool>;
}

/// In-memory media store for testing
pub struct MemoryMediaStore {
    records: RwLock<Vec<MediaRecord>>,
    next_id: AtomicI64,
}

impl Default for MemoryMediaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMediaStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn create(&self, record: &mut MediaRecord) -> MediaResult<Id> {
        let mut records = self.records.write().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        record.id = Some(id);
        records.push(record.clone());

        Ok(id)
    }

    async fn find(&self, id: Id) -> MediaResult<Option<MediaRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == Some(id)).cloned())
    }

    async fn update(&self, record: &MediaRecord) -> MediaResult<()> {
        let mut records = self.records.write().await;
        match records.iter().position(|r| r.id.is_some() && r.id == record.id) {
            Some(pos) => {
                records[pos] = record.clone();
                Ok(())
            }
            None => Err(MediaError::Store(format!(
                "media record {:?} does not exist",
                record.id
            ))),
        }
    }

    async fn delete(&self, id: Id) -> MediaResult<()> {
        let mut records = self.records.write().await;
        records.retain(|r| r.id != Some(id));
        Ok(())
    }

    async fn query(&self, owner: &OwnerRef, filter: &MediaFilter) -> MediaResult<Vec<MediaRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| r.belongs_to(owner) && filter.matches(r))
            .cloned()
            .collect())
    }

    async fn exists_for_owner(&self, owner: &OwnerRef) -> MediaResult<bool> {
        let records = self.records.read().await;
        Ok(records.iter().any(|r| r.belongs_to(owner)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StoredNames;

    fn record(owner: &OwnerRef, disk: &str, collection: &str, ext: &str) -> MediaRecord {
        MediaRecord::new(owner, disk, collection, &StoredNames::derive(None, ext, false))
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let store = MemoryMediaStore::new();
        let owner = OwnerRef::new("User", 1);

        let mut first = record(&owner, "public", "default", "jpg");
        let mut second = record(&owner, "public", "default", "jpg");

        assert_eq!(store.create(&mut first).await.unwrap(), 1);
        assert_eq!(store.create(&mut second).await.unwrap(), 2);
        assert_eq!(first.id, Some(1));
        assert_eq!(store.find(2).await.unwrap(), Some(second));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_stay_in_id_order() {
        let store = std::sync::Arc::new(MemoryMediaStore::new());
        let owner = OwnerRef::new("User", 1);

        let handles: Vec<_> = (0..64)
            .map(|_| {
                let store = store.clone();
                let mut r = record(&owner, "public", "default", "png");
                tokio::spawn(async move { store.create(&mut r).await.unwrap() })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let ids: Vec<Id> = store
            .query(&owner, &MediaFilter::All)
            .await
            .unwrap()
            .iter()
            .filter_map(|r| r.id)
            .collect();
        assert_eq!(ids, (1..=64).collect::<Vec<Id>>());
    }

    #[tokio::test]
    async fn test_query_filters() {
        let store = MemoryMediaStore::new();
        let owner = OwnerRef::new("User", 1);
        let other = OwnerRef::new("Post", 1);

        for mut r in [
            record(&owner, "public", "avatars", "jpg"),
            record(&owner, "archive", "default", "pdf"),
            record(&owner, "public", "default", "png"),
            record(&other, "public", "avatars", "jpg"),
        ] {
            store.create(&mut r).await.unwrap();
        }

        let all = store.query(&owner, &MediaFilter::All).await.unwrap();
        assert_eq!(
            all.iter().map(|r| r.id.unwrap()).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let avatars = store
            .query(&owner, &MediaFilter::Collection("avatars".into()))
            .await
            .unwrap();
        assert_eq!(avatars.len(), 1);

        let archived = store
            .query(&owner, &MediaFilter::Disk("archive".into()))
            .await
            .unwrap();
        assert_eq!(archived[0].media_type, "pdf");

        let pngs = store.query(&owner, &MediaFilter::Type("png".into())).await.unwrap();
        assert_eq!(pngs[0].id, Some(3));

        // Exact match only
        let partial = store
            .query(&owner, &MediaFilter::Collection("avatar".into()))
            .await
            .unwrap();
        assert!(partial.is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = MemoryMediaStore::new();
        let owner = OwnerRef::new("User", 5);
        let mut r = record(&owner, "public", "default", "jpg");
        let id = store.create(&mut r).await.unwrap();

        r.collection = "moved".into();
        store.update(&r).await.unwrap();
        assert_eq!(store.find(id).await.unwrap().unwrap().collection, "moved");

        assert!(store.exists_for_owner(&owner).await.unwrap());
        store.delete(id).await.unwrap();
        assert!(!store.exists_for_owner(&owner).await.unwrap());
        assert!(store.is_empty().await);

        let result = store.update(&r).await;
        assert!(matches!(result, Err(MediaError::Store(_))));
    }
}
