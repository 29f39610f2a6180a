//! Note CRUD and search handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use illume_core::{
    CreateNoteRequest, ListNotesRequest, Note, NoteRepository, ObjectStore, UpdateNoteRequest,
};

use crate::{ApiError, AppState, OwnerId};

/// Query parameters for listing/searching notes.
#[derive(Debug, Default, Deserialize)]
pub struct ListNotesParams {
    /// Case-insensitive substring query over title and content.
    pub q: Option<String>,
    /// Restrict to notes carrying this tag.
    pub tag: Option<String>,
    /// Restrict to notes with at least one image.
    #[serde(default)]
    pub with_images: bool,
}

/// List the caller's notes, newest first, with optional search filters.
pub async fn list_notes(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Query(params): Query<ListNotesParams>,
) -> Result<Json<Vec<Note>>, ApiError> {
    let notes = state
        .db
        .notes
        .list(
            owner_id,
            ListNotesRequest {
                query: params.q,
                tag: params.tag,
                with_images: params.with_images,
            },
        )
        .await?;
    Ok(Json(notes))
}

/// Create a note.
pub async fn create_note(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Json(req): Json<CreateNoteRequest>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let id = state.db.notes.insert(owner_id, req).await?;
    let note = state.db.notes.fetch(id, owner_id).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// Fetch a single note.
pub async fn get_note(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<Json<Note>, ApiError> {
    Ok(Json(state.db.notes.fetch(id, owner_id).await?))
}

/// Update a note's title, content, and tags.
pub async fn update_note(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateNoteRequest>,
) -> Result<Json<Note>, ApiError> {
    state.db.notes.update(id, owner_id, req).await?;
    Ok(Json(state.db.notes.fetch(id, owner_id).await?))
}

/// Delete a note and release its stored images.
pub async fn delete_note(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let released = state.db.notes.delete(id, owner_id).await?;

    // Blob release is best-effort; an orphaned blob is harmless.
    for object_id in released {
        if let Err(e) = state.objects.delete(object_id).await {
            tracing::warn!(
                subsystem = "api",
                op = "delete_note",
                object_id = %object_id,
                error = %e,
                "Failed to release stored object"
            );
        }
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// Request body for uploading an image attachment.
#[derive(Debug, Deserialize)]
pub struct UploadImageRequest {
    /// Base64-encoded image bytes.
    pub data: String,
    /// MIME type; defaults to "image/png".
    pub content_type: Option<String>,
}

/// Response for an uploaded image attachment.
#[derive(Debug, serde::Serialize)]
pub struct UploadImageResponse {
    pub image_id: Uuid,
    pub object_id: Uuid,
    pub url: String,
}

/// Attach an uploaded image to a note.
///
/// Same cap semantics as generated images: at most three per note, oldest
/// evicted first. Does not touch the note's `generated_prompt`.
pub async fn upload_image(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
    Path(id): Path<Uuid>,
    Json(req): Json<UploadImageRequest>,
) -> Result<(StatusCode, Json<UploadImageResponse>), ApiError> {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;

    let bytes = BASE64
        .decode(req.data.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 image data: {}", e)))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("image data is empty".to_string()));
    }
    let content_type = req.content_type.as_deref().unwrap_or("image/png");

    // Ownership check before storing anything.
    state.db.notes.fetch(id, owner_id).await?;

    let object_id = state.objects.store(&bytes, content_type).await?;
    let url = state
        .objects
        .url(object_id)
        .await?
        .ok_or_else(|| ApiError::StorageFailure("stored object has no URL".to_string()))?;

    let (image, evicted) = state
        .db
        .notes
        .attach_image(id, owner_id, object_id, &url, None)
        .await?;
    for old_object in evicted {
        if let Err(e) = state.objects.delete(old_object).await {
            tracing::warn!(
                subsystem = "api",
                op = "upload_image",
                object_id = %old_object,
                error = %e,
                "Failed to release evicted image object"
            );
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(UploadImageResponse {
            image_id: image.id,
            object_id,
            url,
        }),
    ))
}

/// Distinct tags across the caller's notes.
pub async fn list_tags(
    State(state): State<AppState>,
    OwnerId(owner_id): OwnerId,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.db.notes.list_tags(owner_id).await?))
}
