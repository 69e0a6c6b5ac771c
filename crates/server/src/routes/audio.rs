//! Audio attachments for journal entries, stored under the data directory
//! and served back through the API so the read policy applies.

use axum::{
    Router,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json as ResponseJson, Response},
    routing::{get, post},
};
use services::services::audio::AudioUpload;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError, middleware::AuthUser};

const FILE_FIELD: &str = "file";

/// Store an uploaded voice note (multipart field `file`)
pub async fn upload_audio(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, ResponseJson<ApiResponse<AudioUpload>>), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;

        let upload = deployment
            .audio()
            .upload(&user.actor(), content_type.as_deref(), file_name.as_deref(), &bytes)
            .await?;
        return Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(upload))));
    }
    Err(ApiError::BadRequest("Missing file field".to_string()))
}

/// Stream an audio file to its owner or the owner's partner
pub async fn get_audio(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path((owner, name)): Path<(Uuid, String)>,
) -> Result<Response, ApiError> {
    let bytes = deployment.audio().read(&user.actor(), owner, &name).await?;
    let mime = mime_guess::from_path(&name).first_or_octet_stream();
    Ok(([(header::CONTENT_TYPE, mime.essence_str().to_string())], bytes).into_response())
}

/// Delete an owned audio file
pub async fn delete_audio(
    State(deployment): State<DeploymentImpl>,
    user: AuthUser,
    Path((owner, name)): Path<(Uuid, String)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    deployment.audio().delete(&user.actor(), owner, &name).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/upload-audio", post(upload_audio))
        .route("/audio/{owner}/{name}", get(get_audio).delete(delete_audio))
}
