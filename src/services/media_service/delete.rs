use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use utoipa::ToSchema;

use super::MediaService;
use crate::api::error::AppError;
use crate::entities::{media, prelude::*};
use crate::services::storage::DELETE_BATCH_MAX_KEYS;

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedMedia {
    pub deleted_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedBatch {
    pub deleted_count: u64,
}

impl MediaService {
    /// Ownership is baked into the lookup: a record owned by someone else
    /// reports NotFound, never Forbidden. The object is deleted before the
    /// row; a store failure aborts with the row intact.
    pub async fn delete_one(
        &self,
        media_id: &str,
        owner_id: &str,
    ) -> Result<DeletedMedia, AppError> {
        let media = Media::find_by_id(media_id)
            .filter(media::Column::OwnerId.eq(owner_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Media not found".to_string()))?;

        self.storage.delete_object(&media.storage_key).await?;

        Media::delete_by_id(media.id.clone()).exec(&self.db).await?;

        // Best-effort once the row is gone; a stale preview only wastes space.
        if let Some(preview_key) = &media.preview_storage_key {
            if let Err(e) = self.storage.delete_object(preview_key).await {
                tracing::warn!(
                    media_id = %media.id,
                    key = %preview_key,
                    error = %e,
                    "failed to delete preview object"
                );
            }
        }

        Ok(DeletedMedia {
            deleted_id: media.id,
        })
    }

    /// Removes every record the owner has: batched quiet delete of the
    /// primary storage keys, then the metadata rows. Preview objects are not
    /// collected here.
    pub async fn delete_all(&self, owner_id: &str) -> Result<DeletedBatch, AppError> {
        let items = Media::find()
            .filter(media::Column::OwnerId.eq(owner_id))
            .all(&self.db)
            .await?;
        if items.is_empty() {
            return Ok(DeletedBatch { deleted_count: 0 });
        }

        let keys: Vec<String> = items.iter().map(|m| m.storage_key.clone()).collect();
        for chunk in keys.chunks(DELETE_BATCH_MAX_KEYS) {
            self.storage.delete_objects(chunk).await?;
        }

        let result = Media::delete_many()
            .filter(media::Column::OwnerId.eq(owner_id))
            .exec(&self.db)
            .await?;

        Ok(DeletedBatch {
            deleted_count: result.rows_affected,
        })
    }
}
