use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    StoreError,
    policy::{Actor, Operation, RowPolicy, authorize},
};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub invite_code: Option<String>,
    pub partner_id: Option<Uuid>, // Derived from the couples relation
    pub allow_read_receipts: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateProfile {
    pub full_name: Option<String>,
    pub allow_read_receipts: Option<bool>,
}

const SELECT_PROFILE: &str = r#"SELECT
    p.id,
    p.email,
    p.full_name,
    p.invite_code,
    CASE WHEN c.member_low = p.id THEN c.member_high ELSE c.member_low END AS partner_id,
    p.allow_read_receipts,
    p.created_at,
    p.updated_at
FROM profiles p
LEFT JOIN couples c ON c.member_low = p.id OR c.member_high = p.id"#;

impl RowPolicy for Profile {
    const RESOURCE: &'static str = "profile";

    fn permits(&self, actor: &Actor, op: Operation) -> bool {
        match op {
            Operation::Read => {
                actor.is(self.id) || self.partner_id.is_some_and(|partner| actor.is(partner))
            }
            Operation::Insert | Operation::Update | Operation::Delete => actor.is(self.id),
        }
    }
}

impl Profile {
    /// Inserts a profile for a freshly registered identity.
    pub async fn create(
        conn: &mut SqliteConnection,
        actor: &Actor,
        id: Uuid,
        email: &str,
        full_name: Option<&str>,
    ) -> Result<Self, StoreError> {
        if !actor.is(id) {
            return Err(StoreError::Denied("cannot insert profile".to_string()));
        }

        sqlx::query("INSERT INTO profiles (id, email, full_name) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(email)
            .bind(full_name)
            .execute(&mut *conn)
            .await
            .map_err(|e| StoreError::from_write(e, "Email already registered"))?;

        Self::find_by_id(&mut *conn, id)
            .await?
            .ok_or(StoreError::NotFound("profile"))
    }

    /// Unchecked lookup for internal resolution (authentication, linking).
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Profile>(&format!("{SELECT_PROFILE} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Profile>(&format!("{SELECT_PROFILE} WHERE p.email = $1"))
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_invite_code<'e, E>(
        executor: E,
        code: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Profile>(&format!("{SELECT_PROFILE} WHERE p.invite_code = $1"))
            .bind(code)
            .fetch_optional(executor)
            .await
    }

    /// Policy-checked read of a single profile.
    pub async fn read(pool: &SqlitePool, actor: &Actor, id: Uuid) -> Result<Self, StoreError> {
        let profile = Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound("profile"))?;
        authorize(&profile, actor, Operation::Read)?;
        Ok(profile)
    }

    pub async fn update(
        pool: &SqlitePool,
        actor: &Actor,
        id: Uuid,
        data: &UpdateProfile,
    ) -> Result<Self, StoreError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound("profile"))?;
        authorize(&existing, actor, Operation::Update)?;

        let full_name = data.full_name.as_deref().or(existing.full_name.as_deref());
        let allow_read_receipts = data
            .allow_read_receipts
            .unwrap_or(existing.allow_read_receipts);

        sqlx::query(
            "UPDATE profiles
                SET full_name = $2, allow_read_receipts = $3, updated_at = datetime('now', 'subsec')
              WHERE id = $1",
        )
        .bind(id)
        .bind(full_name)
        .bind(allow_read_receipts)
        .execute(pool)
        .await?;

        Self::read(pool, actor, id).await
    }

    /// Sets the invite code if the profile has none yet. Returns `false` when a
    /// code was already present, `Conflict` when the code belongs to someone else.
    pub async fn assign_invite_code(
        pool: &SqlitePool,
        actor: &Actor,
        id: Uuid,
        code: &str,
    ) -> Result<bool, StoreError> {
        if !actor.is(id) && !actor.is_service() {
            return Err(StoreError::Denied("cannot update profile".to_string()));
        }

        let result = sqlx::query(
            "UPDATE profiles
                SET invite_code = $2, updated_at = datetime('now', 'subsec')
              WHERE id = $1 AND invite_code IS NULL",
        )
        .bind(id)
        .bind(code)
        .execute(pool)
        .await
        .map_err(|e| StoreError::from_write(e, "Invite code already in use"))?;

        Ok(result.rows_affected() > 0)
    }
}
