use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use services::services::calendar::CalendarDay;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::AuthUser};

/// One row per day of `month` (yyyy-mm)
pub async fn get_calendar(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path(month): Path<String>,
) -> Result<ResponseJson<ApiResponse<Vec<CalendarDay>>>, ApiError> {
    let days = deployment.calendar().month(&user.actor(), &month).await?;
    Ok(ResponseJson(ApiResponse::success(days)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/calendar/{month}", get(get_calendar))
}
