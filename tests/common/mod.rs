#![allow(dead_code)]

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use rust_media_backend::AppState;
use rust_media_backend::config::AppConfig;
use rust_media_backend::entities::{media, users};
use rust_media_backend::infrastructure::database;
use rust_media_backend::observability::Metrics;
use rust_media_backend::services::dispatch::{ProcessingJob, processing_channel};
use rust_media_backend::services::media_service::{MediaService, status};
use rust_media_backend::services::quota::QuotaAccountant;
use rust_media_backend::services::storage::{ObjectBody, ObjectStore, StorageError};

/// In-memory stand-in for the object store, recording batched delete calls.
#[derive(Default)]
pub struct MockObjectStore {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub batch_delete_calls: Mutex<Vec<Vec<String>>>,
}

impl MockObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.files.lock().unwrap().contains_key(key)
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(key).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn insert(&self, key: &str, data: Vec<u8>) {
        self.files.lock().unwrap().insert(key.to_string(), data);
    }

    pub fn batch_delete_count(&self) -> usize {
        self.batch_delete_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn put_object(
        &self,
        key: &str,
        body: ObjectBody,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let data = match body {
            ObjectBody::Bytes(bytes) => bytes.to_vec(),
            ObjectBody::File(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| StorageError::Unavailable(e.to_string()))?,
        };
        self.files.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.files.lock().unwrap().remove(key);
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<(), StorageError> {
        self.batch_delete_calls.lock().unwrap().push(keys.to_vec());
        let mut files = self.files.lock().unwrap();
        for key in keys {
            files.remove(key);
        }
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<ByteStream, StorageError> {
        let data = self
            .files
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(ByteStream::from(data))
    }

    async fn presigned_get_url(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        Ok(format!(
            "http://mock-minio/media/{}?X-Amz-Expires={}&X-Amz-Signature=mock",
            key,
            expires_in.as_secs()
        ))
    }
}

pub async fn setup_test_db() -> DatabaseConnection {
    unsafe {
        std::env::set_var("DATABASE_URL", "sqlite::memory:");
    }
    let db = Database::connect("sqlite::memory:").await.unwrap();
    database::run_migrations(&db).await.unwrap();
    db
}

/// Full application state wired to the mock store; returns the job receiver
/// so tests can observe dispatched jobs or drop it to simulate a dead queue.
pub fn build_state(
    db: DatabaseConnection,
    storage: Arc<MockObjectStore>,
) -> (AppState, mpsc::Receiver<ProcessingJob>) {
    let metrics = Metrics::new();
    let (dispatcher, jobs_rx) = processing_channel(64);
    let quota = QuotaAccountant::new(db.clone());
    let media_service = Arc::new(MediaService::new(
        db.clone(),
        storage.clone(),
        quota,
        Arc::new(dispatcher),
        metrics.clone(),
        Duration::from_secs(3600),
    ));

    let state = AppState {
        db,
        storage,
        media_service,
        metrics,
        config: AppConfig::default(),
    };
    (state, jobs_rx)
}

pub async fn insert_user(db: &DatabaseConnection, username: &str) -> users::Model {
    let now = Utc::now();
    users::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        username: Set(username.to_string()),
        password_hash: Set("not-a-real-hash".to_string()),
        display_name: Set(None),
        is_public: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn insert_media(
    db: &DatabaseConnection,
    owner_id: &str,
    storage_key: &str,
    mime_type: &str,
    size: i64,
) -> media::Model {
    let now = Utc::now();
    media::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        owner_id: Set(owner_id.to_string()),
        storage_key: Set(storage_key.to_string()),
        original_file_name: Set(storage_key.rsplit('/').next().unwrap().to_string()),
        mime_type: Set(mime_type.to_string()),
        size: Set(size),
        is_public: Set(false),
        title: Set(None),
        status: Set(status::PROCESSING.to_string()),
        preview_storage_key: Set(None),
        preview_content_type: Set(None),
        metadata: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
}

/// One-pixel-color PNG fixture of the given dimensions.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        width,
        height,
        image::Rgb([20, 90, 200]),
    ));
    let mut out = Vec::new();
    img.write_to(
        &mut std::io::Cursor::new(&mut out),
        image::ImageOutputFormat::Png,
    )
    .unwrap();
    out
}

/// Multipart request body with a single file field plus optional options.
pub fn multipart_body(
    boundary: &str,
    file_name: &str,
    content_type: &str,
    data: &[u8],
    is_public: Option<&str>,
    title: Option<&str>,
) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");

    if let Some(value) = is_public {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"is_public\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(value) = title {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}
