mod common;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use std::sync::Arc;

use common::{MockObjectStore, insert_media, insert_user, png_bytes, setup_test_db};
use rust_media_backend::entities::{media, prelude::*};
use rust_media_backend::observability::Metrics;
use rust_media_backend::services::dispatch::ProcessingJob;
use rust_media_backend::services::preview_worker::{
    JobOutcome, MEDIA_PREVIEW_CONTENT_TYPE, PreviewWorker,
};

fn worker(
    db: &sea_orm::DatabaseConnection,
    storage: &Arc<MockObjectStore>,
) -> (PreviewWorker, Arc<Metrics>) {
    let metrics = Metrics::new();
    (
        PreviewWorker::new(db.clone(), storage.clone(), metrics.clone()),
        metrics,
    )
}

#[tokio::test]
async fn test_image_preview_success() {
    let db = setup_test_db().await;
    let storage = MockObjectStore::new();
    let owner = insert_user(&db, "preview_owner").await;

    let key = format!("{}/abc-photo.png", owner.id);
    let original = png_bytes(800, 600);
    storage.insert(&key, original.clone());
    let record = insert_media(&db, &owner.id, &key, "image/png", original.len() as i64).await;

    let (worker, metrics) = worker(&db, &storage);
    let outcome = worker.process(&ProcessingJob::for_media(&record.id)).await;
    assert_eq!(outcome, JobOutcome::Success);
    assert_eq!(
        metrics.labeled_value("media_processing_jobs_total", "status", "success"),
        1
    );

    let row = Media::find_by_id(record.id.as_str()).one(&db).await.unwrap().unwrap();
    let preview_key = format!("{}/previews/{}.jpg", owner.id, record.id);
    assert_eq!(row.preview_storage_key.as_deref(), Some(preview_key.as_str()));
    assert_eq!(
        row.preview_content_type.as_deref(),
        Some(MEDIA_PREVIEW_CONTENT_TYPE)
    );
    assert_eq!(row.status, "ready");

    let descriptor = row.metadata.unwrap();
    assert_eq!(descriptor["width"], 800);
    assert_eq!(descriptor["height"], 600);
    assert_eq!(descriptor["format"], "png");
    assert_eq!(descriptor["size"], original.len() as i64);
    assert!(descriptor["processed_at"].is_string());

    // The stored preview fits the bounding box and kept the aspect ratio
    let preview = image::load_from_memory(&storage.object(&preview_key).unwrap()).unwrap();
    assert_eq!(image::GenericImageView::dimensions(&preview), (512, 384));
}

#[tokio::test]
async fn test_image_preview_is_idempotent() {
    let db = setup_test_db().await;
    let storage = MockObjectStore::new();
    let owner = insert_user(&db, "idempotent_owner").await;

    let key = format!("{}/abc-pic.png", owner.id);
    let original = png_bytes(640, 480);
    storage.insert(&key, original.clone());
    let record = insert_media(&db, &owner.id, &key, "image/png", original.len() as i64).await;

    let (worker, _) = worker(&db, &storage);
    let job = ProcessingJob::for_media(&record.id);

    assert_eq!(worker.process(&job).await, JobOutcome::Success);
    let first = Media::find_by_id(record.id.as_str()).one(&db).await.unwrap().unwrap();

    assert_eq!(worker.process(&job).await, JobOutcome::Success);
    let second = Media::find_by_id(record.id.as_str()).one(&db).await.unwrap().unwrap();

    assert_eq!(first.preview_storage_key, second.preview_storage_key);
    let (a, b) = (first.metadata.unwrap(), second.metadata.unwrap());
    assert_eq!(a["width"], b["width"]);
    assert_eq!(a["height"], b["height"]);
    assert_eq!(a["format"], b["format"]);

    // Still exactly one preview object: original plus preview
    assert_eq!(storage.object_count(), 2);
}

#[tokio::test]
async fn test_small_images_are_not_upscaled() {
    let db = setup_test_db().await;
    let storage = MockObjectStore::new();
    let owner = insert_user(&db, "small_owner").await;

    let key = format!("{}/abc-icon.png", owner.id);
    let original = png_bytes(100, 50);
    storage.insert(&key, original.clone());
    let record = insert_media(&db, &owner.id, &key, "image/png", original.len() as i64).await;

    let (worker, _) = worker(&db, &storage);
    assert_eq!(
        worker.process(&ProcessingJob::for_media(&record.id)).await,
        JobOutcome::Success
    );

    let preview_key = format!("{}/previews/{}.jpg", owner.id, record.id);
    let preview = image::load_from_memory(&storage.object(&preview_key).unwrap()).unwrap();
    assert_eq!(image::GenericImageView::dimensions(&preview), (100, 50));
}

#[tokio::test]
async fn test_non_image_clears_preview_fields() {
    let db = setup_test_db().await;
    let storage = MockObjectStore::new();
    let owner = insert_user(&db, "pdf_owner").await;

    let key = format!("{}/abc-doc.pdf", owner.id);
    storage.insert(&key, b"%PDF-1.4 fake".to_vec());
    let record = insert_media(&db, &owner.id, &key, "application/pdf", 13).await;

    // Simulate a stale preview from an earlier life of the record
    let stale_key = format!("{}/previews/{}.jpg", owner.id, record.id);
    storage.insert(&stale_key, vec![1, 2, 3]);
    let mut active: media::ActiveModel = record.clone().into();
    active.preview_storage_key = Set(Some(stale_key.clone()));
    active.preview_content_type = Set(Some("image/jpeg".to_string()));
    active.updated_at = Set(Utc::now());
    active.update(&db).await.unwrap();

    let (worker, metrics) = worker(&db, &storage);
    let outcome = worker.process(&ProcessingJob::for_media(&record.id)).await;
    assert_eq!(outcome, JobOutcome::NonImage);
    assert_eq!(
        metrics.labeled_value("media_processing_jobs_total", "status", "non_image"),
        1
    );

    let row = Media::find_by_id(record.id.as_str()).one(&db).await.unwrap().unwrap();
    assert_eq!(row.preview_storage_key, None);
    assert_eq!(row.preview_content_type, None);
    assert_eq!(row.status, "ready");

    let descriptor = row.metadata.unwrap();
    assert_eq!(descriptor["mime_type"], "application/pdf");
    assert_eq!(descriptor["size"], 13);
    assert!(descriptor["processed_at"].is_string());

    assert!(!storage.contains(&stale_key));
}

#[tokio::test]
async fn test_missing_media_is_terminal() {
    let db = setup_test_db().await;
    let storage = MockObjectStore::new();
    let (worker, metrics) = worker(&db, &storage);

    let outcome = worker
        .process(&ProcessingJob::for_media(uuid::Uuid::new_v4().to_string()))
        .await;
    assert_eq!(outcome, JobOutcome::MissingMedia);
    assert_eq!(
        metrics.labeled_value("media_processing_jobs_total", "status", "missing_media"),
        1
    );
}

#[tokio::test]
async fn test_unexpected_job_name_is_skipped() {
    let db = setup_test_db().await;
    let storage = MockObjectStore::new();
    let owner = insert_user(&db, "skip_owner").await;

    let key = format!("{}/abc-pic.png", owner.id);
    storage.insert(&key, png_bytes(32, 32));
    let record = insert_media(&db, &owner.id, &key, "image/png", 10).await;

    let (worker, metrics) = worker(&db, &storage);
    let job = ProcessingJob {
        name: "some-other-job".to_string(),
        media_id: record.id.clone(),
    };
    assert_eq!(worker.process(&job).await, JobOutcome::InvalidName);
    assert_eq!(
        metrics.labeled_value("media_processing_jobs_total", "status", "invalid_name"),
        1
    );

    // The record was not touched
    let row = Media::find_by_id(record.id.as_str()).one(&db).await.unwrap().unwrap();
    assert_eq!(row.status, record.status);
    assert_eq!(row.preview_storage_key, None);
}

#[tokio::test]
async fn test_decode_failure_marks_record_failed() {
    let db = setup_test_db().await;
    let storage = MockObjectStore::new();
    let owner = insert_user(&db, "broken_owner").await;

    let key = format!("{}/abc-broken.png", owner.id);
    storage.insert(&key, b"this is not a png".to_vec());
    let record = insert_media(&db, &owner.id, &key, "image/png", 17).await;

    let (worker, metrics) = worker(&db, &storage);
    let outcome = worker.process(&ProcessingJob::for_media(&record.id)).await;
    assert_eq!(outcome, JobOutcome::Error);
    assert_eq!(
        metrics.labeled_value("media_processing_jobs_total", "status", "error"),
        1
    );

    let row = Media::find_by_id(record.id.as_str()).one(&db).await.unwrap().unwrap();
    assert_eq!(row.status, "failed");
    assert_eq!(row.preview_storage_key, None);
}

#[tokio::test]
async fn test_missing_object_is_an_error_outcome() {
    let db = setup_test_db().await;
    let storage = MockObjectStore::new();
    let owner = insert_user(&db, "gone_owner").await;

    let record = insert_media(
        &db,
        &owner.id,
        &format!("{}/abc-gone.png", owner.id),
        "image/png",
        10,
    )
    .await;

    let (worker, _) = worker(&db, &storage);
    let outcome = worker.process(&ProcessingJob::for_media(&record.id)).await;
    assert_eq!(outcome, JobOutcome::Error);

    let row = Media::find_by_id(record.id.as_str()).one(&db).await.unwrap().unwrap();
    assert_eq!(row.status, "failed");
}
