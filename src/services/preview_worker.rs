use anyhow::Context;
use chrono::Utc;
use image::GenericImageView;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::entities::{media, prelude::*};
use crate::observability::Metrics;
use crate::services::dispatch::{MEDIA_PROCESSING_JOB, ProcessingJob};
use crate::services::media_service::status;
use crate::services::storage::{ObjectBody, ObjectStore};

/// Bounding box for generated previews (longest edge).
pub const MEDIA_PREVIEW_MAX_DIMENSION: u32 = 512;
pub const MEDIA_PREVIEW_CONTENT_TYPE: &str = "image/jpeg";
const PREVIEW_JPEG_QUALITY: u8 = 80;

const JOBS_COUNTER: &str = "media_processing_jobs_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    NonImage,
    MissingMedia,
    Error,
    InvalidName,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Success => "success",
            JobOutcome::NonImage => "non_image",
            JobOutcome::MissingMedia => "missing_media",
            JobOutcome::Error => "error",
            JobOutcome::InvalidName => "invalid_name",
        }
    }
}

/// Turns uploaded image objects into JPEG previews, one job at a time.
///
/// Failures never propagate to the queue: every job ends in a terminal,
/// counted outcome, and a processing error is persisted as `failed` so the
/// record stays discoverable. There is no internal retry.
pub struct PreviewWorker {
    db: DatabaseConnection,
    storage: Arc<dyn ObjectStore>,
    metrics: Arc<Metrics>,
}

impl PreviewWorker {
    pub fn new(db: DatabaseConnection, storage: Arc<dyn ObjectStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            db,
            storage,
            metrics,
        }
    }

    pub async fn run(
        self,
        mut jobs: mpsc::Receiver<ProcessingJob>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("🖼️  Preview worker started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("🛑 Preview worker shutting down");
                    break;
                }
                job = jobs.recv() => {
                    match job {
                        Some(job) => {
                            self.process(&job).await;
                        }
                        None => {
                            info!("Job channel closed, preview worker exiting");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Drives one job to its terminal outcome.
    pub async fn process(&self, job: &ProcessingJob) -> JobOutcome {
        let started = Instant::now();

        if job.name != MEDIA_PROCESSING_JOB {
            warn!(name = %job.name, "Skipping job with unexpected name");
            return self.finish(JobOutcome::InvalidName, &job.media_id, started);
        }

        let media = match Media::find_by_id(job.media_id.as_str()).one(&self.db).await {
            Ok(Some(media)) => media,
            Ok(None) => {
                warn!(media_id = %job.media_id, "Media not found");
                return self.finish(JobOutcome::MissingMedia, &job.media_id, started);
            }
            Err(e) => {
                error!(media_id = %job.media_id, error = %e, "Failed to load media record");
                return self.finish(JobOutcome::Error, &job.media_id, started);
            }
        };

        let outcome = if is_image(&media.mime_type) {
            match self.handle_image(&media).await {
                Ok(()) => JobOutcome::Success,
                Err(e) => {
                    error!(media_id = %media.id, error = %e, "Failed to process media");
                    self.mark_failed(&media.id).await;
                    JobOutcome::Error
                }
            }
        } else {
            if let Err(e) = self.handle_non_image(&media).await {
                error!(media_id = %media.id, error = %e, "Failed to record non-image descriptor");
            }
            JobOutcome::NonImage
        };

        self.finish(outcome, &job.media_id, started)
    }

    fn finish(&self, outcome: JobOutcome, media_id: &str, started: Instant) -> JobOutcome {
        self.metrics
            .incr_labeled(JOBS_COUNTER, "status", outcome.as_str());
        debug!(
            media_id,
            status = outcome.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Processing job finished"
        );
        outcome
    }

    /// Reads the original fully into memory, derives the preview, uploads it
    /// under the deterministic preview key and persists the preview fields.
    /// Reprocessing overwrites the same key with the same content.
    async fn handle_image(&self, media: &media::Model) -> anyhow::Result<()> {
        let stream = self.storage.get_object(&media.storage_key).await?;
        let original = stream
            .collect()
            .await
            .context("failed to read object body")?
            .into_bytes();

        let rendered = render_preview(&original)?;
        let preview_key = format!("{}/previews/{}.jpg", media.owner_id, media.id);

        self.storage
            .put_object(
                &preview_key,
                ObjectBody::Bytes(rendered.data.into()),
                MEDIA_PREVIEW_CONTENT_TYPE,
            )
            .await?;

        let descriptor = json!({
            "width": rendered.width,
            "height": rendered.height,
            "orientation": rendered.orientation,
            "format": rendered.format,
            "size": media.size,
            "processed_at": Utc::now().to_rfc3339(),
        });

        let mut active: media::ActiveModel = media.clone().into();
        active.preview_storage_key = Set(Some(preview_key));
        active.preview_content_type = Set(Some(MEDIA_PREVIEW_CONTENT_TYPE.to_string()));
        active.metadata = Set(Some(descriptor));
        active.status = Set(status::READY.to_string());
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await?;

        Ok(())
    }

    /// Non-image media gets a plain descriptor instead of a preview; a stale
    /// preview from an earlier life of the record is removed best-effort.
    async fn handle_non_image(&self, media: &media::Model) -> anyhow::Result<()> {
        if let Some(preview_key) = &media.preview_storage_key {
            if let Err(e) = self.storage.delete_object(preview_key).await {
                warn!(
                    media_id = %media.id,
                    key = %preview_key,
                    error = %e,
                    "Failed to delete stale preview"
                );
            }
        }

        let descriptor = json!({
            "mime_type": media.mime_type,
            "size": media.size,
            "processed_at": Utc::now().to_rfc3339(),
        });

        let mut active: media::ActiveModel = media.clone().into();
        active.preview_storage_key = Set(None);
        active.preview_content_type = Set(None);
        active.metadata = Set(Some(descriptor));
        active.status = Set(status::READY.to_string());
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await?;

        Ok(())
    }

    async fn mark_failed(&self, media_id: &str) {
        let result = Media::update_many()
            .col_expr(media::Column::Status, Expr::value(status::FAILED))
            .col_expr(media::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(media::Column::Id.eq(media_id))
            .exec(&self.db)
            .await;
        if let Err(e) = result {
            warn!(media_id, error = %e, "Failed to mark record as failed");
        }
    }
}

fn is_image(mime_type: &str) -> bool {
    mime_type
        .parse::<mime::Mime>()
        .map(|m| m.type_() == mime::IMAGE)
        .unwrap_or(false)
}

struct RenderedPreview {
    data: Vec<u8>,
    width: u32,
    height: u32,
    orientation: Option<u32>,
    format: &'static str,
}

/// Decode, fit inside the bounding box without upscaling, re-encode as JPEG.
fn render_preview(data: &[u8]) -> anyhow::Result<RenderedPreview> {
    let format = image::guess_format(data).ok();
    let img = image::load_from_memory(data).context("failed to decode image")?;
    let (width, height) = img.dimensions();
    let orientation = read_orientation(data);

    let preview = if width <= MEDIA_PREVIEW_MAX_DIMENSION && height <= MEDIA_PREVIEW_MAX_DIMENSION {
        img
    } else {
        img.thumbnail(MEDIA_PREVIEW_MAX_DIMENSION, MEDIA_PREVIEW_MAX_DIMENSION)
    };

    // JPEG has no alpha channel; flatten to 8-bit RGB before encoding.
    let rgb = preview.to_rgb8();
    let mut encoded = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut encoded);
    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, PREVIEW_JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .context("failed to encode preview")?;

    Ok(RenderedPreview {
        data: encoded,
        width,
        height,
        orientation,
        format: format_label(format),
    })
}

fn read_orientation(data: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut std::io::Cursor::new(data))
        .ok()?;
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
}

fn format_label(format: Option<image::ImageFormat>) -> &'static str {
    match format {
        Some(image::ImageFormat::Jpeg) => "jpeg",
        Some(image::ImageFormat::Png) => "png",
        Some(image::ImageFormat::Gif) => "gif",
        Some(image::ImageFormat::WebP) => "webp",
        _ => "unknown",
    }
}
