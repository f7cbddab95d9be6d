use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::observability::Metrics;
use crate::services::dispatch::JobDispatcher;
use crate::services::quota::QuotaAccountant;
use crate::services::storage::ObjectStore;

pub mod access;
pub mod delete;
pub mod upload;

pub use access::{MediaListing, MediaResponse};
pub use delete::{DeletedBatch, DeletedMedia};
pub use upload::{UploadOptions, UploadRequest, UploadSource};

/// Media record lifecycle states.
pub mod status {
    pub const UPLOADED: &str = "uploaded";
    pub const PROCESSING: &str = "processing";
    pub const READY: &str = "ready";
    pub const FAILED: &str = "failed";
}

pub struct MediaService {
    db: DatabaseConnection,
    storage: Arc<dyn ObjectStore>,
    quota: QuotaAccountant,
    dispatcher: Arc<dyn JobDispatcher>,
    metrics: Arc<Metrics>,
    signed_url_ttl: Duration,
}

impl MediaService {
    pub fn new(
        db: DatabaseConnection,
        storage: Arc<dyn ObjectStore>,
        quota: QuotaAccountant,
        dispatcher: Arc<dyn JobDispatcher>,
        metrics: Arc<Metrics>,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            db,
            storage,
            quota,
            dispatcher,
            metrics,
            signed_url_ttl,
        }
    }

    /// Key shape: `{owner_id}/{random}-{sanitized_name}`. The random id keeps
    /// keys collision-free for identical file names; the owner prefix scopes
    /// every object to its uploader.
    pub(crate) fn build_storage_key(owner_id: &str, original_name: &str) -> String {
        format!(
            "{}/{}-{}",
            owner_id,
            Uuid::new_v4(),
            sanitize_file_name(original_name)
        )
    }
}

pub(crate) fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
