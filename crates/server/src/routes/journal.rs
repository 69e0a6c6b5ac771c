//! Journal entry routes. Every read and write runs as the signed-in user, so
//! visibility comes from the entry allow-lists.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::{
    entry::EntryFilter,
    journal_entry::{CreateJournalEntry, JournalEntry, UpdateJournalEntry},
};
use services::services::entries::ShareEntryRequest;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::AuthUser};

/// Write the day's journal entry; one per day
pub async fn create_journal_entry(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Json(payload): Json<CreateJournalEntry>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<JournalEntry>>), ApiError> {
    let entry = deployment.entries().create_journal(&user.actor(), payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(entry))))
}

/// Own entries and the ones shared with the user, newest date first
pub async fn list_journal_entries(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Query(filter): Query<EntryFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<JournalEntry>>>, ApiError> {
    let entries = deployment.entries().list_journal(&user.actor(), &filter).await?;
    Ok(ResponseJson(ApiResponse::success(entries)))
}

/// Get a single entry the user owns or was shared
pub async fn get_journal_entry(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path(entry_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<JournalEntry>>, ApiError> {
    let entry = deployment.entries().get_journal(&user.actor(), entry_id).await?;
    Ok(ResponseJson(ApiResponse::success(entry)))
}

/// Edit an owned entry; `null` clears mood or audio
pub async fn update_journal_entry(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path(entry_id): Path<Uuid>,
    Json(payload): Json<UpdateJournalEntry>,
) -> Result<ResponseJson<ApiResponse<JournalEntry>>, ApiError> {
    let entry = deployment
        .entries()
        .update_journal(&user.actor(), entry_id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(entry)))
}

/// Delete an owned entry
pub async fn delete_journal_entry(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path(entry_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.entries().delete_journal(&user.actor(), entry_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// Share an owned entry with another profile
pub async fn add_journal_viewer(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path(entry_id): Path<Uuid>,
    Json(payload): Json<ShareEntryRequest>,
) -> Result<ResponseJson<ApiResponse<JournalEntry>>, ApiError> {
    let entry = deployment
        .entries()
        .share_journal(&user.actor(), entry_id, payload.viewer_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(entry)))
}

/// Stop sharing an owned entry with a profile
pub async fn remove_journal_viewer(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path((entry_id, viewer_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<JournalEntry>>, ApiError> {
    let entry = deployment
        .entries()
        .unshare_journal(&user.actor(), entry_id, viewer_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(entry)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/journal",
        Router::new()
            .route("/", post(create_journal_entry).get(list_journal_entries))
            .route(
                "/{entry_id}",
                get(get_journal_entry)
                    .put(update_journal_entry)
                    .delete(delete_journal_entry),
            )
            .route("/{entry_id}/viewers", post(add_journal_viewer))
            .route("/{entry_id}/viewers/{viewer_id}", delete(remove_journal_viewer)),
    )
}
