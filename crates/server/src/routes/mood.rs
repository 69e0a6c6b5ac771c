//! Mood entry routes; same visibility rules as journal entries.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::{
    entry::EntryFilter,
    mood_entry::{CreateMoodEntry, MoodEntry, UpdateMoodEntry},
};
use services::services::entries::ShareEntryRequest;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::AuthUser};

/// Record the day's mood; one per day
pub async fn create_mood_entry(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Json(payload): Json<CreateMoodEntry>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<MoodEntry>>), ApiError> {
    let entry = deployment.entries().create_mood(&user.actor(), payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(entry))))
}

/// Own moods and the ones shared with the user
pub async fn list_mood_entries(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Query(filter): Query<EntryFilter>,
) -> Result<ResponseJson<ApiResponse<Vec<MoodEntry>>>, ApiError> {
    let entries = deployment.entries().list_mood(&user.actor(), &filter).await?;
    Ok(ResponseJson(ApiResponse::success(entries)))
}

/// Get a single mood the user owns or was shared
pub async fn get_mood_entry(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path(entry_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<MoodEntry>>, ApiError> {
    let entry = deployment.entries().get_mood(&user.actor(), entry_id).await?;
    Ok(ResponseJson(ApiResponse::success(entry)))
}

/// Edit an owned mood
pub async fn update_mood_entry(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path(entry_id): Path<Uuid>,
    Json(payload): Json<UpdateMoodEntry>,
) -> Result<ResponseJson<ApiResponse<MoodEntry>>, ApiError> {
    let entry = deployment
        .entries()
        .update_mood(&user.actor(), entry_id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(entry)))
}

/// Delete an owned mood
pub async fn delete_mood_entry(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path(entry_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.entries().delete_mood(&user.actor(), entry_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// Share an owned mood with another profile
pub async fn add_mood_viewer(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path(entry_id): Path<Uuid>,
    Json(payload): Json<ShareEntryRequest>,
) -> Result<ResponseJson<ApiResponse<MoodEntry>>, ApiError> {
    let entry = deployment
        .entries()
        .share_mood(&user.actor(), entry_id, payload.viewer_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(entry)))
}

/// Stop sharing an owned mood with a profile
pub async fn remove_mood_viewer(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path((entry_id, viewer_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<MoodEntry>>, ApiError> {
    let entry = deployment
        .entries()
        .unshare_mood(&user.actor(), entry_id, viewer_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(entry)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/mood",
        Router::new()
            .route("/", post(create_mood_entry).get(list_mood_entries))
            .route(
                "/{entry_id}",
                get(get_mood_entry)
                    .put(update_mood_entry)
                    .delete(delete_mood_entry),
            )
            .route("/{entry_id}/viewers", post(add_mood_viewer))
            .route("/{entry_id}/viewers/{viewer_id}", delete(remove_mood_viewer)),
    )
}
