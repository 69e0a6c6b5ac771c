//! Local account registration and login.
//!
//! Passwords are hashed with Argon2id; sessions are HS256 bearer tokens whose
//! subject is the profile id.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use db::{
    DBService, StoreError,
    models::{credential::Credential, profile::Profile},
    policy::Actor,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;
use utils::jwt::{JwtError, JwtService};
use uuid::Uuid;

use super::invite_code::{self, InviteCodeError};

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    InviteCode(#[from] InviteCodeError),
    #[error(transparent)]
    Token(#[from] JwtError),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email already registered")]
    EmailTaken,
    #[error("{0}")]
    Validation(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub message: String,
    pub user: Profile,
}

#[derive(Clone)]
pub struct AuthService {
    db: DBService,
    jwt: Arc<JwtService>,
}

impl AuthService {
    pub fn new(db: DBService, jwt: Arc<JwtService>) -> Self {
        Self { db, jwt }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        let email = normalize_email(&request.email)?;
        if request.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let full_name = request
            .full_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());

        if Profile::find_by_email(&self.db.pool, &email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password_blocking(request.password).await?;

        let id = Uuid::new_v4();
        let actor = Actor::User(id);
        let mut tx = db::begin_write(&self.db.pool).await?;
        let profile = Profile::create(&mut tx, &actor, id, &email, full_name)
            .await
            .map_err(|e| if e.is_conflict() { AuthError::EmailTaken } else { e.into() })?;
        Credential::create(&mut tx, id, &password_hash).await?;
        tx.commit().await?;

        let profile = invite_code::ensure_invite_code(&self.db.pool, &actor, profile).await?;
        info!(user_id = %id, "Registered new profile");

        self.respond(profile, "Registration successful")
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = request.email.trim().to_lowercase();
        let Some(profile) = Profile::find_by_email(&self.db.pool, &email).await? else {
            debug!("Login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };
        let Some(credential) = Credential::find_by_user_id(&self.db.pool, profile.id).await? else {
            return Err(AuthError::InvalidCredentials);
        };

        let password = request.password;
        let hash = credential.password_hash;
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))??;
        if !valid {
            debug!(user_id = %profile.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        info!(user_id = %profile.id, "Login");
        self.respond(profile, "Login successful")
    }

    /// Resolves a bearer token to the profile it was issued for.
    pub async fn authenticate(&self, token: &str) -> Result<Uuid, AuthError> {
        let claims = self.jwt.verify(token)?;
        match Profile::find_by_id(&self.db.pool, claims.sub).await? {
            Some(profile) => Ok(profile.id),
            None => Err(AuthError::InvalidCredentials),
        }
    }

    fn respond(&self, user: Profile, message: &str) -> Result<AuthResponse, AuthError> {
        Ok(AuthResponse {
            access_token: self.jwt.issue(user.id)?,
            token_type: "bearer".to_string(),
            message: message.to_string(),
            user,
        })
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AuthError::Validation("Invalid email address".to_string()))
    }
}

async fn hash_password_blocking(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
}

/// PHC-formatted Argon2id hash with a random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash).map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
