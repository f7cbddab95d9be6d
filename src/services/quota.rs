use sea_orm::sea_query::{Alias, Expr};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, QueryFilter, QuerySelect};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::error::AppError;
use crate::entities::{media, prelude::*};

/// Fixed per-owner ceiling: 5 GiB.
pub const USER_STORAGE_LIMIT_BYTES: i64 = 5 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UsageSummary {
    pub used_bytes: i64,
    pub limit_bytes: i64,
    pub remaining_bytes: i64,
}

#[derive(FromQueryResult)]
struct UsedBytesRow {
    total: Option<i64>,
}

/// Computes an owner's used bytes and authorizes incoming uploads against the
/// ceiling. Side-effect-free: there is no reservation, so the check-then-write
/// sequence in the upload path is not linearized against concurrent uploads
/// from the same owner.
#[derive(Clone)]
pub struct QuotaAccountant {
    db: DatabaseConnection,
    limit_bytes: i64,
}

impl QuotaAccountant {
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_limit(db, USER_STORAGE_LIMIT_BYTES)
    }

    pub fn with_limit(db: DatabaseConnection, limit_bytes: i64) -> Self {
        Self { db, limit_bytes }
    }

    pub fn limit_bytes(&self) -> i64 {
        self.limit_bytes
    }

    /// Server-side SUM over the owner's records; 0 when none exist.
    pub async fn used_bytes(&self, owner_id: &str) -> Result<i64, sea_orm::DbErr> {
        // SUM over bigint comes back as NUMERIC on Postgres, so cast it down.
        let row = Media::find()
            .select_only()
            .column_as(
                Expr::col(media::Column::Size).sum().cast_as(Alias::new("BIGINT")),
                "total",
            )
            .filter(media::Column::OwnerId.eq(owner_id))
            .into_model::<UsedBytesRow>()
            .one(&self.db)
            .await?;

        Ok(row.and_then(|r| r.total).unwrap_or(0))
    }

    pub async fn authorize(&self, owner_id: &str, incoming_size: i64) -> Result<(), AppError> {
        if incoming_size <= 0 {
            return Err(AppError::BadRequest("Invalid file size".to_string()));
        }
        let used = self.used_bytes(owner_id).await?;
        if used.saturating_add(incoming_size) > self.limit_bytes {
            return Err(AppError::QuotaExceeded);
        }
        Ok(())
    }

    pub async fn usage(&self, owner_id: &str) -> Result<UsageSummary, sea_orm::DbErr> {
        let used = self.used_bytes(owner_id).await?;
        Ok(UsageSummary {
            used_bytes: used,
            limit_bytes: self.limit_bytes,
            remaining_bytes: (self.limit_bytes - used).max(0),
        })
    }
}
