//! The signed-in user's profile and partner linking.

use axum::{
    Json, Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::profile::{Profile, UpdateProfile};
use services::services::{
    invite_code,
    partner::{InvitePartnerRequest, LinkResponse},
};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::AuthUser};

/// Own profile; an invite code is assigned on first read if missing
pub async fn get_me(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let actor = user.actor();
    let pool = &deployment.db().pool;
    let profile = Profile::read(pool, &actor, user.id()).await?;
    let profile = invite_code::ensure_invite_code(pool, &actor, profile).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// Update name or read-receipt preference
pub async fn update_me(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Json(payload): Json<UpdateProfile>,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    if payload
        .full_name
        .as_deref()
        .is_some_and(|name| name.trim().is_empty())
    {
        return Err(ApiError::BadRequest("Name cannot be empty".to_string()));
    }
    let profile = Profile::update(&deployment.db().pool, &user.actor(), user.id(), &payload).await?;
    Ok(ResponseJson(ApiResponse::success(profile)))
}

/// The linked partner's profile
pub async fn get_partner(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
) -> Result<ResponseJson<ApiResponse<Profile>>, ApiError> {
    let partner = deployment.partners().partner_profile(&user.actor()).await?;
    Ok(ResponseJson(ApiResponse::success(partner)))
}

/// Link with the owner of an invite code
pub async fn invite_partner(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Json(payload): Json<InvitePartnerRequest>,
) -> Result<ResponseJson<ApiResponse<LinkResponse>>, ApiError> {
    let linked = deployment
        .partners()
        .link_with_code(&user.actor(), &payload.invite_code)
        .await?;
    Ok(ResponseJson(ApiResponse::success(linked)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/me", get(get_me).patch(update_me))
        .route("/partner", get(get_partner))
        .route("/invite-partner", post(invite_partner))
}
