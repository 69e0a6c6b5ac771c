//! Endpoints for an external scheduler. Guarded by the shared cron secret
//! rather than a user token, and run as the trusted service.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::post,
};
use chrono::{Days, NaiveDate, Utc};
use db::models::shared_reflection::SharedReflection;
use serde::Deserialize;
use services::services::reflection::{BackfillReflectionRequest, DailyRunSummary};
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::CronAuth};

#[derive(Debug, Default, Deserialize, TS)]
pub struct DailyRunQuery {
    /// Defaults to yesterday (UTC).
    pub date: Option<NaiveDate>,
}

fn yesterday() -> Result<NaiveDate, ApiError> {
    Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| ApiError::BadRequest("Date out of range".to_string()))
}

/// Generate missing reflections for every couple on a day
pub async fn generate_reflections(
    State(deployment): State<DeploymentImpl>,
    _cron: CronAuth,
    Query(query): Query<DailyRunQuery>,
) -> Result<ResponseJson<ApiResponse<DailyRunSummary>>, ApiError> {
    let date = match query.date {
        Some(date) => date,
        None => yesterday()?,
    };
    let summary = deployment.reflections().run_daily(date).await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

/// Generate the reflection for one couple and day
pub async fn backfill_reflection(
    State(deployment): State<DeploymentImpl>,
    _cron: CronAuth,
    Json(payload): Json<BackfillReflectionRequest>,
) -> Result<ResponseJson<ApiResponse<SharedReflection>>, ApiError> {
    let reflection = deployment.reflections().backfill(&payload).await?;
    Ok(ResponseJson(ApiResponse::success(reflection)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().nest(
        "/cron",
        Router::new()
            .route("/generate-reflections", post(generate_reflections))
            .route("/backfill-reflection", post(backfill_reflection)),
    )
}
