//! Request extractors for the two kinds of callers: signed-in users and the
//! scheduler hitting the cron endpoints.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use db::policy::Actor;
use services::services::auth::AuthError;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{DeploymentImpl, error::ApiError};

pub const CRON_SECRET_HEADER: &str = "cron-secret";

/// The profile a valid bearer token was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.0
    }

    pub fn actor(&self) -> Actor {
        Actor::User(self.0)
    }
}

impl FromRequestParts<DeploymentImpl> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        deployment: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

        match deployment.auth().authenticate(token).await {
            Ok(user_id) => Ok(AuthUser(user_id)),
            Err(err @ (AuthError::Database(_) | AuthError::Store(_))) => Err(err.into()),
            Err(err) => {
                tracing::debug!(error = %err, "Rejected bearer token");
                Err(ApiError::Unauthorized("Could not validate credentials".to_string()))
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(utils::jwt::extract_bearer)
}

/// Marker for requests carrying the configured cron secret.
#[derive(Debug, Clone, Copy)]
pub struct CronAuth;

impl FromRequestParts<DeploymentImpl> for CronAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        deployment: &DeploymentImpl,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = deployment.cron_secret() else {
            return Err(ApiError::Forbidden("Cron endpoints are disabled".to_string()));
        };
        let provided = parts
            .headers
            .get(CRON_SECRET_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if secrets_match(provided, expected) {
            Ok(CronAuth)
        } else {
            tracing::warn!("Rejected cron request with bad secret");
            Err(ApiError::Unauthorized("Unauthorized".to_string()))
        }
    }
}

fn secrets_match(provided: &str, expected: &str) -> bool {
    !provided.is_empty() && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}
