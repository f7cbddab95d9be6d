use std::env;

/// Runtime configuration for the media backend
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Maximum accepted upload size in bytes (default: 5 GiB, matching the
    /// per-user storage ceiling)
    pub max_upload_size: usize,

    /// Lifetime of signed download URLs in seconds (default: 3600)
    pub signed_url_ttl_secs: u64,

    /// Capacity of the in-process job queue (default: 256)
    pub job_queue_capacity: usize,

    /// JWT secret key
    pub jwt_secret: String,

    /// JWT lifetime in hours (default: 24)
    pub jwt_expiry_hours: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 5 * 1024 * 1024 * 1024,
            signed_url_ttl_secs: 3600,
            job_queue_capacity: 256,
            jwt_secret: "secret".to_string(),
            jwt_expiry_hours: 24,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            signed_url_ttl_secs: env::var("SIGNED_URL_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.signed_url_ttl_secs),

            job_queue_capacity: env::var("JOB_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.job_queue_capacity),

            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()),

            jwt_expiry_hours: env::var("JWT_EXPIRES_IN_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.jwt_expiry_hours),
        }
    }
}
