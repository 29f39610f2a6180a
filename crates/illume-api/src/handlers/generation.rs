//! Image generation handlers.
//!
//! Two entry points: a synchronous one that runs the pipeline to completion
//! and returns the outcome payload, and a fire-and-forget dispatch that
//! returns a task id immediately. Both check the daily quota up front so
//! `RateLimited` always reaches the caller.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use illume_core::{
    defaults, AspectRatio, GenerationOutcome, GenerationRecord, GenerationRequest, ImageStyle,
    NoteRepository,
};
use illume_jobs::QuotaStatus;

use crate::{ApiError, AppState, OwnerId};

/// Request body for generating an image from a note.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateImageRequest {
    /// Visual style; defaults to photorealistic.
    pub style: Option<ImageStyle>,
    /// Pins the aspect ratio; omitted means heuristic selection.
    pub aspect_ratio: Option<AspectRatio>,
    /// Reuse existing attached images as style reference.
    #[serde(default)]
    pub use_existing_images: bool,
}

impl GenerateImageRequest {
    fn into_request(self, owner_id: Uuid, note_id: Uuid) -> GenerationRequest {
        GenerationRequest {
            owner_id,
            note_id,
            style: self.style.unwrap_or_default(),
            aspect_ratio: self.aspect_ratio,
            use_existing_images: self.use_existing_images,
        }
    }
}

/// Response for a dispatched (background) generation.
#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub task_id: Uuid,
    pub note_id: Uuid,
}

/// Generate an image for a note, synchronously.
///
/// The response carries the image URL and the prompt actually used, which
/// is `[Fallback: ...]`-labeled when the provider chain degraded. Provider
/// failures never surface here; only `RateLimited`, `NotFound`, and storage
/// failures do.
pub async fn generate_image(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(note_id): Path<Uuid>,
    Json(req): Json<GenerateImageRequest>,
) -> Result<Json<GenerationOutcome>, ApiError> {
    let outcome = state
        .dispatcher
        .pipeline()
        .run(req.into_request(owner_id, note_id))
        .await?;
    Ok(Json(outcome))
}

/// Schedule a generation task and return immediately.
pub async fn dispatch_generation(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(note_id): Path<Uuid>,
    Json(req): Json<GenerateImageRequest>,
) -> Result<(StatusCode, Json<DispatchResponse>), ApiError> {
    // Surface quota and ownership problems now, not inside a detached task.
    state.dispatcher.check_quota(owner_id).await?;
    state.db.notes.fetch(note_id, owner_id).await?;

    let task_id = state.dispatcher.dispatch(req.into_request(owner_id, note_id));
    Ok((
        StatusCode::ACCEPTED,
        Json(DispatchResponse { task_id, note_id }),
    ))
}

/// Today's generation quota for the caller.
pub async fn quota(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
) -> Result<Json<QuotaStatus>, ApiError> {
    Ok(Json(state.dispatcher.pipeline().quota(owner_id).await?))
}

/// Query parameters for generation history.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

/// The caller's recent generation records, newest first.
pub async fn list_generations(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<GenerationRecord>>, ApiError> {
    use illume_core::GenerationLogRepository;

    let limit = params
        .limit
        .unwrap_or(defaults::GENERATION_HISTORY_LIMIT)
        .clamp(1, 100);
    Ok(Json(state.db.generations.recent(owner_id, limit).await?))
}
