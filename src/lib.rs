pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod observability;
pub mod services;
pub mod utils;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::observability::Metrics;
use crate::services::media_service::MediaService;
use crate::services::storage::ObjectStore;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::media::upload_media,
        api::handlers::media::get_media,
        api::handlers::media::list_media,
        api::handlers::media::delete_media,
        api::handlers::media::delete_all_media,
        api::handlers::health::health_check,
        api::handlers::metrics::metrics,
    ),
    components(
        schemas(
            api::handlers::auth::RegisterRequest,
            api::handlers::auth::LoginRequest,
            api::handlers::auth::AuthResponse,
            api::handlers::auth::UserResponse,
            api::handlers::media::UploadMediaOptions,
            api::handlers::health::HealthResponse,
            services::media_service::MediaResponse,
            services::media_service::DeletedMedia,
            services::media_service::DeletedBatch,
            services::quota::UsageSummary,
        )
    ),
    tags(
        (name = "auth", description = "Authentication endpoints"),
        (name = "media", description = "Media upload, access and deletion endpoints")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn ObjectStore>,
    pub media_service: Arc<MediaService>,
    pub metrics: Arc<Metrics>,
    pub config: AppConfig,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/metrics", get(api::handlers::metrics::metrics))
        .route("/register", post(api::handlers::auth::register))
        .route("/login", post(api::handlers::auth::login))
        .route(
            "/media",
            post(api::handlers::media::upload_media)
                .layer(axum::extract::DefaultBodyLimit::max(
                    state.config.max_upload_size + 10 * 1024 * 1024, // multipart overhead
                ))
                .get(api::handlers::media::list_media)
                .delete(api::handlers::media::delete_all_media)
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .route(
            "/media/:id",
            get(api::handlers::media::get_media)
                .delete(api::handlers::media::delete_media)
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .with_state(state)
}
