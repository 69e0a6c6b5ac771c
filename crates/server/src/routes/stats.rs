use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use services::services::stats::Statistics;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::AuthUser};

/// Entry counts, shared days and writing streaks
pub async fn get_stats(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
) -> Result<ResponseJson<ApiResponse<Statistics>>, ApiError> {
    let stats = deployment.stats().stats(&user.actor()).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/stats", get(get_stats))
}
