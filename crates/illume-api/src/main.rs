//! illume HTTP API server.
//!
//! Wires the database, object storage, provider backends, and the
//! generation pipeline behind an axum router. Caller identity arrives as an
//! `X-User-Id` header set by a fronting auth proxy; requests without one
//! are rejected as unauthenticated.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use illume_core::{
    defaults, ImageGenerationBackend, ObjectStore, TextCompletionBackend,
};
use illume_db::Database;
use illume_inference::{OpenRouterBackend, OpenRouterConfig};
use illume_jobs::{GenerationDispatcher, GenerationPipeline, PipelineConfig};

mod handlers;

use handlers::{generation, notes, objects};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub objects: Arc<dyn ObjectStore>,
    pub dispatcher: Arc<GenerationDispatcher>,
}

/// Caller identity, taken from the `X-User-Id` header.
///
/// Authentication itself is delegated to a fronting proxy; this extractor
/// only verifies that an identity was supplied.
pub struct OwnerId(pub Uuid);

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".to_string()))?;

        let owner_id = header
            .parse::<Uuid>()
            .map_err(|_| ApiError::Unauthorized("invalid X-User-Id header".to_string()))?;

        Ok(OwnerId(owner_id))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    //   LOG_FORMAT - "json" or "text" (default: "text")
    //   RUST_LOG   - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "illume_api=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // Configuration from environment
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/illume".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);
    let storage_path =
        std::env::var("FILE_STORAGE_PATH").unwrap_or_else(|_| "/var/lib/illume/files".to_string());
    let public_base_url = std::env::var("PUBLIC_BASE_URL")
        .unwrap_or_else(|_| format!("http://localhost:{}", port));

    // Database
    info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await?
        .with_filesystem_storage(&storage_path, &public_base_url);
    info!("Database connected");

    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    let objects: Arc<dyn ObjectStore> = Arc::new(
        db.objects
            .clone()
            .context("object storage not configured")?,
    );

    // Provider backends. A missing credential disables both and routes
    // every generation through the local fallback path.
    let provider = match OpenRouterConfig::from_env().and_then(OpenRouterBackend::new) {
        Ok(backend) => Some(Arc::new(backend)),
        Err(e) => {
            warn!(error = %e, "Provider backends disabled, generations will use fallbacks");
            None
        }
    };
    let completion = provider
        .clone()
        .map(|b| b as Arc<dyn TextCompletionBackend>);
    let images = provider.map(|b| b as Arc<dyn ImageGenerationBackend>);

    let pipeline = Arc::new(GenerationPipeline::new(
        Arc::new(db.notes.clone()),
        Arc::new(db.generations.clone()),
        objects.clone(),
        completion,
        images,
        PipelineConfig::from_env(),
    ));
    let dispatcher = Arc::new(GenerationDispatcher::new(pipeline));

    let state = AppState {
        db,
        objects,
        dispatcher,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route(
            "/api/v1/notes",
            get(notes::list_notes).post(notes::create_note),
        )
        .route(
            "/api/v1/notes/:id",
            get(notes::get_note)
                .put(notes::update_note)
                .delete(notes::delete_note),
        )
        .route("/api/v1/tags", get(notes::list_tags))
        .route("/api/v1/notes/:id/images/upload", post(notes::upload_image))
        .route("/api/v1/notes/:id/images", post(generation::generate_image))
        .route(
            "/api/v1/notes/:id/images/dispatch",
            post(generation::dispatch_generation),
        )
        .route("/api/v1/generations/quota", get(generation::quota))
        .route("/api/v1/generations", get(generation::list_generations))
        .route("/api/v1/objects/:id", get(objects::get_object))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

/// HTTP-facing error type.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    NotFound(String),
    BadRequest(String),
    RateLimited(String),
    StorageFailure(String),
    ProviderUnavailable(String),
    Internal(illume_core::Error),
}

impl From<illume_core::Error> for ApiError {
    fn from(err: illume_core::Error) -> Self {
        use illume_core::Error;
        match err {
            Error::Unauthenticated(msg) => ApiError::Unauthorized(msg),
            Error::NoteNotFound(id) => ApiError::NotFound(format!("Note not found: {}", id)),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::RateLimited { .. } => ApiError::RateLimited(err.to_string()),
            Error::Storage(msg) => ApiError::StorageFailure(msg),
            Error::ProviderUnavailable(msg) | Error::InsufficientCredits(msg) => {
                ApiError::ProviderUnavailable(msg)
            }
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            ApiError::StorageFailure(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::ProviderUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
