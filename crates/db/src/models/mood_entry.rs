use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    entry::{EntryFilter, EntryKind, entry_permits, parse_viewers},
    entry_viewer,
};
use crate::{
    StoreError,
    policy::{Actor, Operation, RowPolicy, authorize, retain_readable},
};

const DUPLICATE_DAY: &str = "A mood entry already exists for this date";

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct MoodEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mood: String,
    pub date: NaiveDate,
    pub shared_with: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct MoodEntryRow {
    id: Uuid,
    user_id: Uuid,
    mood: String,
    entry_date: NaiveDate,
    viewers: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MoodEntryRow> for MoodEntry {
    type Error = StoreError;

    fn try_from(row: MoodEntryRow) -> Result<Self, Self::Error> {
        Ok(MoodEntry {
            shared_with: parse_viewers(row.viewers.as_deref())?,
            id: row.id,
            user_id: row.user_id,
            mood: row.mood,
            date: row.entry_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateMoodEntry {
    pub mood: String,
    pub date: NaiveDate,
    #[serde(default = "default_share")]
    pub share_with_partner: bool,
}

fn default_share() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateMoodEntry {
    pub mood: Option<String>,
    pub date: Option<NaiveDate>,
}

const SELECT_MOOD: &str = r#"SELECT
    e.id,
    e.user_id,
    e.mood,
    e.entry_date,
    (SELECT group_concat(lower(hex(v.viewer_id)), ',')
       FROM entry_viewers v
      WHERE v.entry_kind = 'mood' AND v.entry_id = e.id) AS viewers,
    e.created_at,
    e.updated_at
FROM mood_entries e"#;

impl RowPolicy for MoodEntry {
    const RESOURCE: &'static str = "mood entry";

    fn permits(&self, actor: &Actor, op: Operation) -> bool {
        entry_permits(self.user_id, &self.shared_with, actor, op)
    }
}

impl MoodEntry {
    pub const KIND: EntryKind = EntryKind::Mood;

    pub async fn create(
        pool: &SqlitePool,
        actor: &Actor,
        owner: Uuid,
        data: &CreateMoodEntry,
        viewers: &[Uuid],
    ) -> Result<Self, StoreError> {
        let id = Uuid::new_v4();
        let draft = MoodEntry {
            id,
            user_id: owner,
            mood: data.mood.clone(),
            date: data.date,
            shared_with: viewers.to_vec(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        authorize(&draft, actor, Operation::Insert)?;

        let mut tx = crate::begin_write(pool).await?;
        sqlx::query("INSERT INTO mood_entries (id, user_id, mood, entry_date) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(owner)
            .bind(&data.mood)
            .bind(data.date)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::from_write(e, DUPLICATE_DAY))?;
        entry_viewer::add_many(&mut tx, Self::KIND, id, viewers).await?;
        tx.commit().await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound("mood entry"))
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, StoreError> {
        sqlx::query_as::<_, MoodEntryRow>(&format!("{SELECT_MOOD} WHERE e.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(MoodEntry::try_from)
            .transpose()
    }

    pub async fn read(pool: &SqlitePool, actor: &Actor, id: Uuid) -> Result<Self, StoreError> {
        let entry = Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound("mood entry"))?;
        authorize(&entry, actor, Operation::Read)?;
        Ok(entry)
    }

    pub async fn find_for_owner_on(
        pool: &SqlitePool,
        actor: &Actor,
        owner: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Self>, StoreError> {
        let entry = sqlx::query_as::<_, MoodEntryRow>(&format!(
            "{SELECT_MOOD} WHERE e.user_id = $1 AND e.entry_date = $2"
        ))
        .bind(owner)
        .bind(date)
        .fetch_optional(pool)
        .await?
        .map(MoodEntry::try_from)
        .transpose()?;

        Ok(entry.filter(|e| e.permits(actor, Operation::Read)))
    }

    pub async fn list_visible(
        pool: &SqlitePool,
        actor: &Actor,
        filter: &EntryFilter,
    ) -> Result<Vec<Self>, StoreError> {
        let rows = sqlx::query_as::<_, MoodEntryRow>(&format!(
            r#"{SELECT_MOOD}
WHERE ($1 IS NULL OR e.user_id = $1 OR EXISTS (
        SELECT 1 FROM entry_viewers v
         WHERE v.entry_kind = 'mood' AND v.entry_id = e.id AND v.viewer_id = $1))
  AND ($2 IS NULL OR e.user_id = $2)
  AND ($3 IS NULL OR e.entry_date >= $3)
  AND ($4 IS NULL OR e.entry_date <= $4)
ORDER BY e.entry_date DESC, e.created_at DESC"#
        ))
        .bind(actor.user_id())
        .bind(filter.owner)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(MoodEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(retain_readable(entries, actor))
    }

    pub async fn update(
        pool: &SqlitePool,
        actor: &Actor,
        id: Uuid,
        data: &UpdateMoodEntry,
    ) -> Result<Self, StoreError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound("mood entry"))?;
        authorize(&existing, actor, Operation::Update)?;

        sqlx::query(
            "UPDATE mood_entries
                SET mood = $2, entry_date = $3, updated_at = datetime('now', 'subsec')
              WHERE id = $1",
        )
        .bind(id)
        .bind(data.mood.as_deref().unwrap_or(&existing.mood))
        .bind(data.date.unwrap_or(existing.date))
        .execute(pool)
        .await
        .map_err(|e| StoreError::from_write(e, DUPLICATE_DAY))?;

        Self::read(pool, actor, id).await
    }

    pub async fn delete(pool: &SqlitePool, actor: &Actor, id: Uuid) -> Result<(), StoreError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound("mood entry"))?;
        authorize(&existing, actor, Operation::Delete)?;

        sqlx::query("DELETE FROM mood_entries WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn add_viewer(
        pool: &SqlitePool,
        actor: &Actor,
        id: Uuid,
        viewer: Uuid,
    ) -> Result<Self, StoreError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound("mood entry"))?;
        authorize(&existing, actor, Operation::Update)?;

        entry_viewer::add(pool, Self::KIND, id, viewer).await?;
        Self::read(pool, actor, id).await
    }

    pub async fn remove_viewer(
        pool: &SqlitePool,
        actor: &Actor,
        id: Uuid,
        viewer: Uuid,
    ) -> Result<Self, StoreError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound("mood entry"))?;
        authorize(&existing, actor, Operation::Update)?;

        if !entry_viewer::remove(pool, Self::KIND, id, viewer).await? {
            return Err(StoreError::NotFound("viewer"));
        }
        Self::read(pool, actor, id).await
    }

    pub async fn share_all_with(
        conn: &mut SqliteConnection,
        actor: &Actor,
        owner: Uuid,
        viewer: Uuid,
    ) -> Result<u64, StoreError> {
        if !actor.is_service() {
            return Err(StoreError::Denied("cannot update mood entry".to_string()));
        }
        Ok(entry_viewer::share_owner_entries(conn, Self::KIND, owner, viewer).await?)
    }
}
