//! Stored object serving.
//!
//! Durable image URLs point here. Object ids are unguessable (UUIDv7), and
//! the Convex-style storage these mirror served public URLs, so no caller
//! identity is required.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use uuid::Uuid;

use illume_core::ObjectStore;

use crate::{ApiError, AppState};

/// Serve a stored object's bytes with its content type.
pub async fn get_object(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (bytes, content_type) = state.objects.fetch(id).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}
