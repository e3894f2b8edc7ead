pub mod api;
pub mod client;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::UploadConfig;
use crate::services::asset_catalog::AssetCatalog;
use crate::services::storage::StorageBackend;
use crate::services::upload_service::UploadService;
use crate::utils::id::{IdGenerator, TimestampIdGenerator};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header},
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::upload::upload_file,
        api::handlers::videos::get_video,
        api::handlers::pages::watch_page,
        api::handlers::pages::share_page,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::types::UploadForm,
            api::handlers::types::UploadResponse,
            api::handlers::types::UploadMetadata,
            api::error::UploadErrorResponse,
            api::handlers::health::HealthResponse,
            models::Asset,
        )
    ),
    tags(
        (name = "videos", description = "Upload and playback endpoints"),
        (name = "pages", description = "Watch and share pages"),
        (name = "system", description = "Operational endpoints")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageBackend>,
    pub catalog: Arc<AssetCatalog>,
    pub upload_service: Arc<UploadService>,
    pub config: UploadConfig,
}

impl AppState {
    pub fn new(config: UploadConfig, storage: Arc<dyn StorageBackend>) -> Self {
        Self::with_id_generator(config, storage, Arc::new(TimestampIdGenerator))
    }

    pub fn with_id_generator(
        config: UploadConfig,
        storage: Arc<dyn StorageBackend>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let catalog = Arc::new(AssetCatalog::new());
        let upload_service = Arc::new(UploadService::new(
            storage.clone(),
            ids,
            catalog.clone(),
            &config,
        ));

        Self {
            storage,
            catalog,
            upload_service,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/upload",
            post(api::handlers::upload::upload_file)
                .layer(DefaultBodyLimit::max(state.config.body_limit())),
        )
        .route("/videos/:id", get(api::handlers::videos::get_video))
        .route("/watch/:id", get(api::handlers::pages::watch_page))
        .route("/share/:id", get(api::handlers::pages::share_page))
        .layer(from_fn(api::middleware::metrics::metrics_middleware))
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]),
        )
        .with_state(state)
}
