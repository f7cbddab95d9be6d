use bytes::Bytes;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tempfile::TempPath;
use uuid::Uuid;

use super::{MediaService, status};
use crate::api::error::AppError;
use crate::entities::{media, prelude::*};
use crate::services::dispatch::ProcessingJob;
use crate::services::storage::ObjectBody;

/// Content handed to the orchestrator: either an in-memory buffer or a file
/// already spooled to disk. The `TempPath` removes the spooled file when the
/// request is dropped, on every exit path.
pub enum UploadSource {
    Buffer(Bytes),
    TempFile(TempPath),
}

pub struct UploadRequest {
    pub file_name: String,
    pub content_type: String,
    pub size: i64,
    pub source: UploadSource,
}

#[derive(Debug, Default, Clone)]
pub struct UploadOptions {
    pub is_public: bool,
    pub title: Option<String>,
}

impl MediaService {
    /// Quota check, object write, then metadata persist, then job dispatch.
    ///
    /// Failure policy: an object-write failure leaves no metadata behind; a
    /// metadata failure after a successful write leaves the object orphaned
    /// (surfaced, not rolled back); a dispatch failure is logged and counted
    /// but never fails the upload.
    pub async fn upload(
        &self,
        owner_id: &str,
        file: UploadRequest,
        options: UploadOptions,
    ) -> Result<media::Model, AppError> {
        if let Some(title) = &options.title {
            if title.is_empty() || title.chars().count() > 160 {
                return Err(AppError::BadRequest(
                    "Title must be between 1 and 160 characters".to_string(),
                ));
            }
        }

        self.quota.authorize(owner_id, file.size).await?;

        let key = Self::build_storage_key(owner_id, &file.file_name);
        let body = match &file.source {
            UploadSource::Buffer(bytes) => ObjectBody::Bytes(bytes.clone()),
            UploadSource::TempFile(path) => ObjectBody::File(path.to_path_buf()),
        };
        self.storage
            .put_object(&key, body, &file.content_type)
            .await?;

        let now = Utc::now();
        let record = media::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            owner_id: Set(owner_id.to_string()),
            storage_key: Set(key),
            original_file_name: Set(file.file_name),
            mime_type: Set(file.content_type),
            size: Set(file.size),
            is_public: Set(options.is_public),
            title: Set(options.title),
            status: Set(status::UPLOADED.to_string()),
            preview_storage_key: Set(None),
            preview_content_type: Set(None),
            metadata: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let record = record.insert(&self.db).await?;

        match self
            .dispatcher
            .dispatch(ProcessingJob::for_media(&record.id))
            .await
        {
            Ok(()) => {
                // Conditional on the current status so a worker that already
                // finished this record is not demoted back to processing.
                let marked = Media::update_many()
                    .col_expr(media::Column::Status, Expr::value(status::PROCESSING))
                    .col_expr(media::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(media::Column::Id.eq(&record.id))
                    .filter(media::Column::Status.eq(status::UPLOADED))
                    .exec(&self.db)
                    .await;
                if let Err(e) = marked {
                    tracing::warn!(
                        media_id = %record.id,
                        error = %e,
                        "failed to mark record as processing"
                    );
                }
            }
            Err(e) => {
                self.metrics.incr("media_jobs_dispatch_failures_total");
                tracing::warn!(
                    media_id = %record.id,
                    error = %e,
                    "failed to dispatch processing job; record stays uploaded"
                );
            }
        }

        Ok(record)
    }
}
