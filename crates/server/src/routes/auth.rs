use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::post,
};
use services::services::auth::{AuthResponse, LoginRequest, RegisterRequest};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

/// Create an account and sign in
pub async fn register(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<AuthResponse>>), ApiError> {
    let response = deployment.auth().register(payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(response))))
}

/// Exchange email and password for a bearer token
pub async fn login(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<AuthResponse>>, ApiError> {
    let response = deployment.auth().login(payload).await?;
    Ok(ResponseJson(ApiResponse::success(response)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}
