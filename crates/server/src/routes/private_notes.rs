use axum::{
    Json, Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::put,
};
use db::{
    StoreError,
    models::{
        entry::EntryKind,
        private_note::{PrivateNote, UpsertPrivateNote},
    },
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::AuthUser};

/// Create or replace the caller's note on an entry they can read
pub async fn put_private_note(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path((kind, entry_id)): Path<(EntryKind, Uuid)>,
    Json(payload): Json<UpsertPrivateNote>,
) -> Result<ResponseJson<ApiResponse<PrivateNote>>, ApiError> {
    let note = deployment
        .entries()
        .put_private_note(&user.actor(), kind, entry_id, &payload.note_content)
        .await?;
    Ok(ResponseJson(ApiResponse::success(note)))
}

/// The caller's own note on the entry
pub async fn get_private_note(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path((kind, entry_id)): Path<(EntryKind, Uuid)>,
) -> Result<ResponseJson<ApiResponse<PrivateNote>>, ApiError> {
    let note = deployment
        .entries()
        .private_note(&user.actor(), kind, entry_id)
        .await?
        .ok_or(StoreError::NotFound("private note"))?;
    Ok(ResponseJson(ApiResponse::success(note)))
}

/// Delete the caller's note on an entry
pub async fn delete_private_note(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path((kind, entry_id)): Path<(EntryKind, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment
        .entries()
        .delete_private_note(&user.actor(), kind, entry_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route(
        "/private-notes/{kind}/{entry_id}",
        put(put_private_note)
            .get(get_private_note)
            .delete(delete_private_note),
    )
}
