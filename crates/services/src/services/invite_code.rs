//! Invite codes: short tokens a user hands to their partner out of band.

use db::{
    StoreError,
    models::profile::Profile,
    policy::Actor,
};
use rand::Rng;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, error};

/// No 0/O or 1/I, so codes survive being read aloud.
pub const INVITE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const INVITE_CODE_LEN: usize = 8;
pub const MAX_ATTEMPTS: usize = 16;

#[derive(Debug, Error)]
pub enum InviteCodeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("could not find a free invite code after {0} attempts")]
    Exhausted(usize),
}

pub fn generate() -> String {
    generate_with(&mut rand::thread_rng())
}

pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_ALPHABET[rng.gen_range(0..INVITE_ALPHABET.len())] as char)
        .collect()
}

/// Canonical form of a code typed by a user.
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn is_well_formed(code: &str) -> bool {
    code.len() == INVITE_CODE_LEN && code.bytes().all(|b| INVITE_ALPHABET.contains(&b))
}

/// Returns the profile with an invite code, generating one if it has none.
pub async fn ensure_invite_code(
    pool: &SqlitePool,
    actor: &Actor,
    profile: Profile,
) -> Result<Profile, InviteCodeError> {
    ensure_invite_code_with(pool, actor, profile, generate).await
}

pub async fn ensure_invite_code_with<F>(
    pool: &SqlitePool,
    actor: &Actor,
    profile: Profile,
    mut next_code: F,
) -> Result<Profile, InviteCodeError>
where
    F: FnMut() -> String,
{
    if profile.invite_code.is_some() {
        return Ok(profile);
    }

    for attempt in 1..=MAX_ATTEMPTS {
        let code = next_code();
        match Profile::assign_invite_code(pool, actor, profile.id, &code).await {
            Ok(_) => {
                // Either our code landed or a concurrent request set one first.
                let refreshed = Profile::find_by_id(pool, profile.id)
                    .await
                    .map_err(StoreError::from)?
                    .ok_or(StoreError::NotFound("profile"))?;
                if refreshed.invite_code.is_some() {
                    return Ok(refreshed);
                }
            }
            Err(e) if e.is_conflict() => {
                debug!(profile_id = %profile.id, attempt, "Invite code collision, drawing another");
            }
            Err(e) => return Err(e.into()),
        }
    }

    error!(profile_id = %profile.id, "Invite code space exhausted");
    Err(InviteCodeError::Exhausted(MAX_ATTEMPTS))
}
