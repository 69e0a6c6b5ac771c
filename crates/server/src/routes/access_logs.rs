use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{entry::EntryKind, entry_access_log::EntryAccessLog};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::AuthUser};

/// Read receipts on an entry. Owners see every reader, readers see their own rows.
pub async fn list_access_logs(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path((kind, entry_id)): Path<(EntryKind, Uuid)>,
) -> Result<ResponseJson<ApiResponse<Vec<EntryAccessLog>>>, ApiError> {
    let logs = deployment
        .entries()
        .access_logs(&user.actor(), kind, entry_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(logs)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new().route("/access-logs/{kind}/{entry_id}", get(list_access_logs))
}
