use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use utoipa::ToSchema;

use super::MediaService;
use crate::api::error::AppError;
use crate::entities::{media, prelude::*};
use crate::services::quota::UsageSummary;

/// Single-record view returned to requesters. The owner linkage is omitted;
/// the signed URL grants the actual read access.
#[derive(Debug, Serialize, ToSchema)]
pub struct MediaResponse {
    pub id: String,
    pub storage_key: String,
    pub original_file_name: String,
    pub mime_type: String,
    pub size: i64,
    pub is_public: bool,
    pub title: Option<String>,
    pub status: String,
    pub preview_storage_key: Option<String>,
    pub preview_content_type: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub signed_url: String,
}

impl MediaResponse {
    fn from_model(media: media::Model, signed_url: String) -> Self {
        Self {
            id: media.id,
            storage_key: media.storage_key,
            original_file_name: media.original_file_name,
            mime_type: media.mime_type,
            size: media.size,
            is_public: media.is_public,
            title: media.title,
            status: media.status,
            preview_storage_key: media.preview_storage_key,
            preview_content_type: media.preview_content_type,
            metadata: media.metadata,
            created_at: media.created_at,
            updated_at: media.updated_at,
            signed_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MediaListing {
    pub items: Vec<media::Model>,
    pub usage: UsageSummary,
}

impl MediaService {
    /// A private record is visible to its owner only; a public one to anyone.
    pub async fn get_with_url(
        &self,
        media_id: &str,
        requester_id: &str,
    ) -> Result<MediaResponse, AppError> {
        let media = Media::find_by_id(media_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Media not found".to_string()))?;

        if !media.is_public && media.owner_id != requester_id {
            return Err(AppError::Forbidden("Access denied".to_string()));
        }

        let signed_url = self
            .storage
            .presigned_get_url(&media.storage_key, self.signed_url_ttl)
            .await?;

        Ok(MediaResponse::from_model(media, signed_url))
    }

    pub async fn list(&self, owner_id: &str) -> Result<MediaListing, AppError> {
        let items = Media::find()
            .filter(media::Column::OwnerId.eq(owner_id))
            .order_by_desc(media::Column::CreatedAt)
            .all(&self.db)
            .await?;
        let usage = self.quota.usage(owner_id).await?;
        Ok(MediaListing { items, usage })
    }
}
