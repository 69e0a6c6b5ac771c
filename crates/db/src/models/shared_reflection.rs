use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::couple::CouplePair;
use crate::{
    StoreError,
    policy::{Actor, Operation, RowPolicy, authorize, retain_readable},
};

/// AI text for one couple and one day. Several versions may exist when the
/// deployment keeps history; readers see the highest one.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct SharedReflection {
    pub id: Uuid,
    #[sqlx(rename = "reflection_date")]
    pub date: NaiveDate,
    pub member_low: Uuid,
    pub member_high: Uuid,
    pub reflection: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

const SELECT_REFLECTION: &str = r#"SELECT
    r.id,
    r.reflection_date,
    r.member_low,
    r.member_high,
    r.reflection,
    r.version,
    r.created_at
FROM shared_reflections r"#;

const LATEST_ONLY: &str = r#"r.version = (
    SELECT MAX(s.version) FROM shared_reflections s
     WHERE s.reflection_date = r.reflection_date
       AND s.member_low = r.member_low
       AND s.member_high = r.member_high)"#;

impl RowPolicy for SharedReflection {
    const RESOURCE: &'static str = "shared reflection";

    fn permits(&self, actor: &Actor, op: Operation) -> bool {
        match op {
            Operation::Read => actor.is_service() || self.pair().is_member(actor),
            Operation::Insert | Operation::Update => actor.is_service(),
            Operation::Delete => false,
        }
    }
}

impl SharedReflection {
    pub fn pair(&self) -> CouplePair {
        CouplePair {
            low: self.member_low,
            high: self.member_high,
        }
    }

    /// Stores `version` of the reflection for (`date`, `pair`). An existing row
    /// with the same version is a `Conflict`.
    pub async fn create(
        pool: &SqlitePool,
        actor: &Actor,
        pair: CouplePair,
        date: NaiveDate,
        text: &str,
        version: i32,
    ) -> Result<Self, StoreError> {
        let draft = SharedReflection {
            id: Uuid::new_v4(),
            date,
            member_low: pair.low,
            member_high: pair.high,
            reflection: text.to_string(),
            version,
            created_at: Utc::now(),
        };
        authorize(&draft, actor, Operation::Insert)?;

        sqlx::query(
            "INSERT INTO shared_reflections (id, reflection_date, member_low, member_high, reflection, version)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(draft.id)
        .bind(date)
        .bind(pair.low)
        .bind(pair.high)
        .bind(text)
        .bind(version)
        .execute(pool)
        .await
        .map_err(|e| StoreError::from_write(e, "Reflection already exists for this date"))?;

        Self::find_by_id(pool, draft.id)
            .await?
            .ok_or(StoreError::NotFound("shared reflection"))
    }

    async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, SharedReflection>(&format!("{SELECT_REFLECTION} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Highest version for (`date`, `pair`). `Denied` if the actor is outside the pair.
    pub async fn find_latest(
        pool: &SqlitePool,
        actor: &Actor,
        pair: CouplePair,
        date: NaiveDate,
    ) -> Result<Option<Self>, StoreError> {
        let latest = sqlx::query_as::<_, SharedReflection>(&format!(
            "{SELECT_REFLECTION}
              WHERE r.reflection_date = $1 AND r.member_low = $2 AND r.member_high = $3
              ORDER BY r.version DESC
              LIMIT 1"
        ))
        .bind(date)
        .bind(pair.low)
        .bind(pair.high)
        .fetch_optional(pool)
        .await?;

        match latest {
            Some(reflection) => {
                authorize(&reflection, actor, Operation::Read)?;
                Ok(Some(reflection))
            }
            None => Ok(None),
        }
    }

    /// Replaces the text of an existing row in place.
    pub async fn overwrite(
        pool: &SqlitePool,
        actor: &Actor,
        id: Uuid,
        text: &str,
    ) -> Result<Self, StoreError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound("shared reflection"))?;
        authorize(&existing, actor, Operation::Update)?;

        sqlx::query("UPDATE shared_reflections SET reflection = $2 WHERE id = $1")
            .bind(id)
            .bind(text)
            .execute(pool)
            .await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound("shared reflection"))
    }

    /// Latest version of every reflection `member` takes part in, newest day first.
    pub async fn list_for_member(
        pool: &SqlitePool,
        actor: &Actor,
        member: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Self>, StoreError> {
        let rows = sqlx::query_as::<_, SharedReflection>(&format!(
            "{SELECT_REFLECTION}
              WHERE (r.member_low = $1 OR r.member_high = $1)
                AND ($2 IS NULL OR r.reflection_date >= $2)
                AND ($3 IS NULL OR r.reflection_date <= $3)
                AND {LATEST_ONLY}
              ORDER BY r.reflection_date DESC"
        ))
        .bind(member)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
        Ok(retain_readable(rows, actor))
    }

    /// Number of distinct reflected days for `member`.
    pub async fn count_for_member(
        pool: &SqlitePool,
        actor: &Actor,
        member: Uuid,
    ) -> Result<i64, StoreError> {
        if !actor.is(member) && !actor.is_service() {
            return Err(StoreError::Denied("cannot read shared reflection".to_string()));
        }
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM (
                SELECT DISTINCT reflection_date, member_low, member_high
                  FROM shared_reflections
                 WHERE member_low = $1 OR member_high = $1)",
        )
        .bind(member)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }
}
