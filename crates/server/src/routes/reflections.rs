use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use chrono::NaiveDate;
use db::models::shared_reflection::SharedReflection;
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::AuthUser};

#[derive(Debug, Default, Deserialize, TS)]
pub struct ReflectionQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Generate the couple's reflection for a day both partners wrote on
pub async fn generate_reflection(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path(date): Path<NaiveDate>,
) -> Result<ResponseJson<ApiResponse<SharedReflection>>, ApiError> {
    let reflection = deployment
        .reflections()
        .generate_for_requester(&user.actor(), date)
        .await?;
    Ok(ResponseJson(ApiResponse::success(reflection)))
}

/// The couple's reflections, optionally within a date range
pub async fn list_reflections(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Query(query): Query<ReflectionQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<SharedReflection>>>, ApiError> {
    let reflections = deployment
        .reflections()
        .list_for_requester(&user.actor(), query.from, query.to)
        .await?;
    Ok(ResponseJson(ApiResponse::success(reflections)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/generate-reflection/{date}", post(generate_reflection))
        .route("/reflections", get(list_reflections))
}
