//! Generated artifacts attached to an entry — thumbnails, extracted text,
//! and similar classifier output. Identity is the content hash (I9):
//! re-deriving the same artifact for the same bytes is a no-op, not a
//! duplicate row.

use crate::database::entities::metadata;
use crate::error::CoreResult;
use crate::write_queue::WriteQueue;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set as ActiveSet, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter,
};
use std::sync::Arc;

/// Input to [`MetadataStore::put`].
#[derive(Debug, Clone)]
pub struct NewMetadata {
    pub hash: String,
    pub source_path: String,
    pub metadata_type: String,
    pub mime_type: Option<String>,
    pub cache_path: Option<String>,
    pub file_size: i64,
    pub metadata_json: Option<String>,
}

pub struct MetadataStore {
    conn: DatabaseConnection,
    queue: Arc<WriteQueue>,
}

impl MetadataStore {
    pub fn new(conn: DatabaseConnection, queue: Arc<WriteQueue>) -> Self {
        Self { conn, queue }
    }

    /// Insert a row keyed by content hash, or return the existing row
    /// unchanged if that hash was already recorded.
    pub async fn put(&self, input: NewMetadata) -> CoreResult<metadata::Model> {
        if let Some(existing) = self.get(&input.hash).await? {
            return Ok(existing);
        }
        self.queue
            .submit_value(None, move |conn| {
                Box::pin(async move {
                    let active = metadata::ActiveModel {
                        hash: ActiveSet(input.hash),
                        source_path: ActiveSet(input.source_path),
                        metadata_type: ActiveSet(input.metadata_type),
                        mime_type: ActiveSet(input.mime_type),
                        cache_path: ActiveSet(input.cache_path),
                        file_size: ActiveSet(input.file_size),
                        metadata_json: ActiveSet(input.metadata_json),
                        created_at: ActiveSet(Utc::now()),
                    };
                    Ok(active.insert(conn).await?)
                })
            })
            .await
    }

    pub async fn get(&self, hash: &str) -> CoreResult<Option<metadata::Model>> {
        Ok(metadata::Entity::find_by_id(hash.to_string())
            .one(&self.conn)
            .await?)
    }

    /// Every artifact attached to `source_path`, regardless of type.
    pub async fn for_entry(&self, source_path: &str) -> CoreResult<Vec<metadata::Model>> {
        Ok(metadata::Entity::find()
            .filter(metadata::Column::SourcePath.eq(source_path))
            .all(&self.conn)
            .await?)
    }

    /// Artifacts attached to `source_path` of a specific `metadata_type`
    /// (e.g. `"thumbnail"`).
    pub async fn for_entry_by_type(&self, source_path: &str, metadata_type: &str) -> CoreResult<Vec<metadata::Model>> {
        Ok(metadata::Entity::find()
            .filter(metadata::Column::SourcePath.eq(source_path))
            .filter(metadata::Column::MetadataType.eq(metadata_type))
            .all(&self.conn)
            .await?)
    }

    pub async fn delete(&self, hash: &str) -> CoreResult<bool> {
        let hash = hash.to_string();
        let rows = self
            .queue
            .submit_value(None, move |conn| {
                Box::pin(async move {
                    let result = metadata::Entity::delete_by_id(hash).exec(conn).await?;
                    Ok(result.rows_affected)
                })
            })
            .await?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(hash: &str) -> NewMetadata {
        NewMetadata {
            hash: hash.to_string(),
            source_path: "/r/f.jpg".to_string(),
            metadata_type: "thumbnail".to_string(),
            mime_type: Some("image/jpeg".to_string()),
            cache_path: Some("/cache/ab/cd.jpg".to_string()),
            file_size: 2048,
            metadata_json: None,
        }
    }

    #[test]
    fn new_metadata_carries_the_fields_put_will_persist() {
        let n = sample("deadbeef");
        assert_eq!(n.hash, "deadbeef");
        assert_eq!(n.metadata_type, "thumbnail");
    }
}
