use anyhow::Context;
use aws_sdk_s3::config::Region;
use std::env;
use std::sync::Arc;
use tracing::info;

use crate::services::storage::S3ObjectStore;

/// Builds the S3 client and ensures the bucket exists. A missing bucket is
/// created; any other failure aborts startup.
pub async fn setup_storage() -> anyhow::Result<Arc<S3ObjectStore>> {
    let endpoint_url = env::var("MINIO_ENDPOINT").context("MINIO_ENDPOINT must be set")?;
    let access_key = env::var("MINIO_ACCESS_KEY").context("MINIO_ACCESS_KEY must be set")?;
    let secret_key = env::var("MINIO_SECRET_KEY").context("MINIO_SECRET_KEY must be set")?;
    let bucket = env::var("MINIO_BUCKET").unwrap_or_else(|_| "media".to_string());
    let region = env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string());

    info!("☁️  S3 Storage: {} (Bucket: {})", endpoint_url, bucket);

    let aws_config = aws_config::from_env()
        .endpoint_url(&endpoint_url)
        .region(Region::new(region))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key, secret_key, None, None, "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    match s3_client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", bucket),
        Err(e) => {
            let service_error = e.into_service_error();
            if service_error.is_not_found() {
                info!("🪣 Bucket '{}' not found, creating...", bucket);
                s3_client
                    .create_bucket()
                    .bucket(&bucket)
                    .send()
                    .await
                    .with_context(|| format!("failed to create bucket '{bucket}'"))?;
                info!("✅ Bucket '{}' created successfully", bucket);
            } else {
                return Err(anyhow::Error::new(service_error)
                    .context("object store unreachable at startup"));
            }
        }
    }

    Ok(Arc::new(S3ObjectStore::new(s3_client, bucket)))
}
