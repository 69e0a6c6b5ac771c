use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::StoreError;
use services::services::{
    audio::AudioError, auth::AuthError, calendar::CalendarError, entries::EntryError,
    invite_code::InviteCodeError, partner::PartnerError, reflection::ReflectionError,
    stats::StatsError,
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Partner(#[from] PartnerError),
    #[error(transparent)]
    Entry(#[from] EntryError),
    #[error(transparent)]
    Reflection(#[from] ReflectionError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Stats(#[from] StatsError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    InviteCode(#[from] InviteCodeError),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::Denied(_) => StatusCode::FORBIDDEN,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(err) => store_status(err),
            ApiError::Database(_) | ApiError::InviteCode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Auth(err) => match err {
                AuthError::Store(err) => store_status(err),
                AuthError::Validation(_) => StatusCode::BAD_REQUEST,
                AuthError::EmailTaken => StatusCode::CONFLICT,
                AuthError::InvalidCredentials | AuthError::Token(_) => StatusCode::UNAUTHORIZED,
                AuthError::Database(_) | AuthError::InviteCode(_) | AuthError::Hashing(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Partner(err) => match err {
                PartnerError::Store(err) => store_status(err),
                PartnerError::InvalidCode | PartnerError::NotLinked => StatusCode::NOT_FOUND,
                PartnerError::SelfLink => StatusCode::BAD_REQUEST,
                PartnerError::AlreadyLinked => StatusCode::CONFLICT,
                PartnerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Entry(err) => match err {
                EntryError::Store(err) => store_status(err),
                EntryError::Validation(_) => StatusCode::BAD_REQUEST,
                EntryError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Reflection(err) => match err {
                ReflectionError::Store(err) => store_status(err),
                ReflectionError::NoPartner
                | ReflectionError::NotACouple
                | ReflectionError::MissingEntries => StatusCode::BAD_REQUEST,
                ReflectionError::AlreadyExists => StatusCode::CONFLICT,
                ReflectionError::Upstream(_) => StatusCode::BAD_GATEWAY,
                ReflectionError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Calendar(err) => match err {
                CalendarError::Store(err) => store_status(err),
                CalendarError::InvalidMonth(_) => StatusCode::BAD_REQUEST,
                CalendarError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Stats(err) => match err {
                StatsError::Store(err) => store_status(err),
                StatsError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Audio(err) => match err {
                AudioError::Store(err) => store_status(err),
                AudioError::UnsupportedType | AudioError::InvalidName => StatusCode::BAD_REQUEST,
                AudioError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                AudioError::NotFound => StatusCode::NOT_FOUND,
                AudioError::Io(_) | AudioError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Multipart(err) => err.status(),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            if status == StatusCode::BAD_GATEWAY {
                tracing::warn!(error = %self, "Upstream failure");
                "Failed to generate reflection".to_string()
            } else {
                tracing::error!(error = %self, status = %status, "Request failed");
                "Internal server error".to_string()
            }
        } else {
            self.to_string()
        };
        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}
