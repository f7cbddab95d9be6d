use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use tokio::io::AsyncWriteExt;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::error::AppError;
use crate::entities::media;
use crate::services::media_service::{
    DeletedBatch, DeletedMedia, MediaListing, MediaResponse, UploadOptions, UploadRequest,
    UploadSource,
};
use crate::utils::auth::Claims;

#[derive(Debug, Default, Validate, ToSchema)]
pub struct UploadMediaOptions {
    pub is_public: bool,
    #[validate(length(min = 1, max = 160))]
    pub title: Option<String>,
}

/// Drains a multipart file field to a temp file, counting bytes and keeping
/// the first 512 for content-type sniffing. The temp file travels with the
/// returned request and is removed when it drops.
async fn stage_file_field(mut field: axum::extract::multipart::Field<'_>) -> Result<UploadRequest, AppError> {
    let file_name = field
        .file_name()
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::BadRequest("File name is required".to_string()))?;
    let declared_type = field.content_type().map(|s| s.to_string());

    let tmp = tempfile::NamedTempFile::new()
        .map_err(|e| AppError::Internal(format!("Failed to create temp file: {e}")))?;
    let mut out = tokio::fs::File::create(tmp.path())
        .await
        .map_err(|e| AppError::Internal(format!("Failed to open temp file: {e}")))?;

    let mut size: i64 = 0;
    let mut header = Vec::with_capacity(512);
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart payload: {e}")))?
    {
        if header.len() < 512 {
            let take = chunk.len().min(512 - header.len());
            header.extend_from_slice(&chunk[..take]);
        }
        size += chunk.len() as i64;
        out.write_all(&chunk)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to spool upload: {e}")))?;
    }
    out.flush()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to spool upload: {e}")))?;
    drop(out);

    let content_type = declared_type
        .filter(|t| t != mime::APPLICATION_OCTET_STREAM.as_ref())
        .or_else(|| infer::get(&header).map(|kind| kind.mime_type().to_string()))
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

    Ok(UploadRequest {
        file_name,
        content_type,
        size,
        source: UploadSource::TempFile(tmp.into_temp_path()),
    })
}

#[utoipa::path(
    post,
    path = "/media",
    responses(
        (status = 201, description = "Media uploaded"),
        (status = 400, description = "Invalid upload or quota exceeded"),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = []))
)]
pub async fn upload_media(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<media::Model>), AppError> {
    let mut options = UploadMediaOptions::default();
    let mut staged: Option<UploadRequest> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart payload: {e}")))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("file") => {
                staged = Some(stage_file_field(field).await?);
            }
            Some("is_public") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid is_public field: {e}")))?;
                options.is_public = matches!(text.as_str(), "true" | "1");
            }
            Some("title") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid title field: {e}")))?;
                options.title = Some(text);
            }
            _ => {}
        }
    }

    let staged = staged.ok_or_else(|| AppError::BadRequest("File is required".to_string()))?;
    options
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let record = state
        .media_service
        .upload(
            &claims.sub,
            staged,
            UploadOptions {
                is_public: options.is_public,
                title: options.title,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    get,
    path = "/media/{id}",
    params(("id" = String, Path, description = "Media ID")),
    responses(
        (status = 200, description = "Media record with signed URL", body = MediaResponse),
        (status = 403, description = "Private media of another user"),
        (status = 404, description = "Unknown media ID")
    ),
    security(("jwt" = []))
)]
pub async fn get_media(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<MediaResponse>, AppError> {
    Uuid::parse_str(&id).map_err(|_| AppError::BadRequest("Invalid media id".to_string()))?;
    let response = state.media_service.get_with_url(&id, &claims.sub).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/media",
    responses(
        (status = 200, description = "Owned media ordered by creation time, plus usage summary"),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = []))
)]
pub async fn list_media(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<MediaListing>, AppError> {
    let listing = state.media_service.list(&claims.sub).await?;
    Ok(Json(listing))
}

#[utoipa::path(
    delete,
    path = "/media/{id}",
    params(("id" = String, Path, description = "Media ID")),
    responses(
        (status = 200, description = "Media deleted", body = DeletedMedia),
        (status = 404, description = "Unknown or non-owned media ID")
    ),
    security(("jwt" = []))
)]
pub async fn delete_media(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<DeletedMedia>, AppError> {
    Uuid::parse_str(&id).map_err(|_| AppError::BadRequest("Invalid media id".to_string()))?;
    let deleted = state.media_service.delete_one(&id, &claims.sub).await?;
    Ok(Json(deleted))
}

#[utoipa::path(
    delete,
    path = "/media",
    responses(
        (status = 200, description = "All owned media deleted", body = DeletedBatch)
    ),
    security(("jwt" = []))
)]
pub async fn delete_all_media(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<DeletedBatch>, AppError> {
    let deleted = state.media_service.delete_all(&claims.sub).await?;
    Ok(Json(deleted))
}
