//! Media repository
//!
//! Persists media records in the `media` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ml_core::traits::Id;
use ml_media::{MediaError, MediaFilter, MediaRecord, MediaResult, MediaStore, OwnerRef};
use sqlx::{FromRow, PgPool};

use crate::{Repository, RepositoryError, RepositoryResult};

const MEDIA_COLUMNS: &str = r#"id, model_type, model_id, media, thumbnail, "type", collection,
       disk, path, created_at, updated_at"#;

/// Media row from database
#[derive(Debug, Clone, FromRow)]
pub struct MediaRow {
    pub id: i64,
    pub model_type: String,
    pub model_id: i64,
    pub media: String,
    pub thumbnail: Option<String>,
    #[sqlx(rename = "type")]
    pub media_type: String,
    pub collection: String,
    pub disk: String,
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MediaRow> for MediaRecord {
    fn from(row: MediaRow) -> Self {
        Self {
            id: Some(row.id),
            owner_type: row.model_type,
            owner_id: row.model_id,
            disk: row.disk,
            path: row.path,
            media: row.media,
            thumbnail: row.thumbnail.filter(|t| !t.is_empty()),
            media_type: row.media_type,
            collection: row.collection,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// DTO for creating a media row
#[derive(Debug, Clone)]
pub struct CreateMediaDto {
    pub model_type: String,
    pub model_id: i64,
    pub media: String,
    pub thumbnail: Option<String>,
    pub media_type: String,
    pub collection: String,
    pub disk: String,
    pub path: String,
}

impl From<&MediaRecord> for CreateMediaDto {
    fn from(record: &MediaRecord) -> Self {
        Self {
            model_type: record.owner_type.clone(),
            model_id: record.owner_id,
            media: record.media.clone(),
            thumbnail: record.thumbnail.clone(),
            media_type: record.media_type.clone(),
            collection: record.collection.clone(),
            disk: record.disk.clone(),
            path: record.path.clone(),
        }
    }
}

/// DTO for replacing the files of a media row
///
/// Disk, path and collection are not updatable.
#[derive(Debug, Clone, Default)]
pub struct UpdateMediaDto {
    pub media: Option<String>,
    pub thumbnail: Option<Option<String>>,
    pub media_type: Option<String>,
}

impl From<&MediaRecord> for UpdateMediaDto {
    fn from(record: &MediaRecord) -> Self {
        Self {
            media: Some(record.media.clone()),
            thumbnail: Some(record.thumbnail.clone()),
            media_type: Some(record.media_type.clone()),
        }
    }
}

/// Column and value an owner query is narrowed by
fn filter_condition(filter: &MediaFilter) -> Option<(&'static str, &str)> {
    match filter {
        MediaFilter::All => None,
        MediaFilter::Collection(c) => Some(("collection", c.as_str())),
        MediaFilter::Disk(d) => Some(("disk", d.as_str())),
        MediaFilter::Type(t) => Some((r#""type""#, t.as_str())),
    }
}

/// Media repository
pub struct MediaRepository {
    pool: PgPool,
}

impl MediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an owner's media, optionally narrowed by a filter
    pub async fn find_by_owner(
        &self,
        model_type: &str,
        model_id: i64,
        filter: &MediaFilter,
    ) -> RepositoryResult<Vec<MediaRow>> {
        let rows = match filter_condition(filter) {
            Some((column, value)) => {
                let sql = format!(
                    "SELECT {MEDIA_COLUMNS} FROM media \
                     WHERE model_type = $1 AND model_id = $2 AND {column} = $3 \
                     ORDER BY id ASC"
                );
                sqlx::query_as::<_, MediaRow>(&sql)
                    .bind(model_type)
                    .bind(model_id)
                    .bind(value)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {MEDIA_COLUMNS} FROM media \
                     WHERE model_type = $1 AND model_id = $2 \
                     ORDER BY id ASC"
                );
                sqlx::query_as::<_, MediaRow>(&sql)
                    .bind(model_type)
                    .bind(model_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows)
    }

    /// Check if an owner has any media
    pub async fn exists_for_owner(
        &self,
        model_type: &str,
        model_id: i64,
    ) -> RepositoryResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM media WHERE model_type = $1 AND model_id = $2)",
        )
        .bind(model_type)
        .bind(model_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

#[async_trait]
impl Repository<MediaRow, CreateMediaDto, UpdateMediaDto> for MediaRepository {
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<MediaRow>> {
        let sql = format!("SELECT {MEDIA_COLUMNS} FROM media WHERE id = $1");
        let row = sqlx::query_as::<_, MediaRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn exists(&self, id: i64) -> RepositoryResult<bool> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM media WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    async fn create(&self, dto: CreateMediaDto) -> RepositoryResult<MediaRow> {
        if dto.media.is_empty() {
            return Err(RepositoryError::Validation("Media can't be blank".to_string()));
        }

        if dto.model_type.is_empty() {
            return Err(RepositoryError::Validation(
                "Model type can't be blank".to_string(),
            ));
        }

        let sql = format!(
            r#"
            INSERT INTO media (
                model_type, model_id, media, thumbnail, "type", collection,
                disk, path, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            RETURNING {MEDIA_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, MediaRow>(&sql)
            .bind(&dto.model_type)
            .bind(dto.model_id)
            .bind(&dto.media)
            .bind(&dto.thumbnail)
            .bind(&dto.media_type)
            .bind(&dto.collection)
            .bind(&dto.disk)
            .bind(&dto.path)
            .fetch_one(&self.pool)
            .await?;

        Ok(row)
    }

    async fn update(&self, id: i64, dto: UpdateMediaDto) -> RepositoryResult<MediaRow> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Media {} not found", id)))?;

        let new_media = dto.media.unwrap_or(existing.media);
        let new_thumbnail = dto.thumbnail.unwrap_or(existing.thumbnail);
        let new_type = dto.media_type.unwrap_or(existing.media_type);

        let sql = format!(
            r#"
            UPDATE media
            SET media = $2, thumbnail = $3, "type" = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {MEDIA_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, MediaRow>(&sql)
            .bind(id)
            .bind(&new_media)
            .bind(&new_thumbnail)
            .bind(&new_type)
            .fetch_one(&self.pool)
            .await?;

        Ok(row)
    }

    async fn delete(&self, id: i64) -> RepositoryResult<()> {
        if !self.exists(id).await? {
            return Err(RepositoryError::NotFound(format!("Media {} not found", id)));
        }

        sqlx::query("DELETE FROM media WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// `MediaStore` backed by PostgreSQL
pub struct PgMediaStore {
    repository: MediaRepository,
}

impl PgMediaStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: MediaRepository::new(pool),
        }
    }
}

#[async_trait]
impl MediaStore for PgMediaStore {
    async fn create(&self, record: &mut MediaRecord) -> MediaResult<Id> {
        let row = self
            .repository
            .create(CreateMediaDto::from(&*record))
            .await
            .map_err(MediaError::store)?;

        record.id = Some(row.id);
        record.created_at = row.created_at;
        record.updated_at = row.updated_at;
        Ok(row.id)
    }

    async fn find(&self, id: Id) -> MediaResult<Option<MediaRecord>> {
        let row = self
            .repository
            .find_by_id(id)
            .await
            .map_err(MediaError::store)?;
        Ok(row.map(MediaRecord::from))
    }

    async fn update(&self, record: &MediaRecord) -> MediaResult<()> {
        let id = record
            .id
            .ok_or_else(|| MediaError::Store("cannot update an unsaved media record".into()))?;
        self.repository
            .update(id, UpdateMediaDto::from(record))
            .await
            .map_err(MediaError::store)?;
        Ok(())
    }

    async fn delete(&self, id: Id) -> MediaResult<()> {
        match self.repository.delete(id).await {
            Ok(()) | Err(RepositoryError::NotFound(_)) => Ok(()),
            Err(e) => Err(MediaError::store(e)),
        }
    }

    async fn query(&self, owner: &OwnerRef, filter: &MediaFilter) -> MediaResult<Vec<MediaRecord>> {
        let rows = self
            .repository
            .find_by_owner(&owner.owner_type, owner.owner_id, filter)
            .await
            .map_err(MediaError::store)?;
        Ok(rows.into_iter().map(MediaRecord::from).collect())
    }

    async fn exists_for_owner(&self, owner: &OwnerRef) -> MediaResult<bool> {
        self.repository
            .exists_for_owner(&owner.owner_type, owner.owner_id)
            .await
            .map_err(MediaError::store)
    }
}
