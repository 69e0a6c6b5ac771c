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

const DUPLICATE_DAY: &str = "A journal entry already exists for this date";

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct JournalEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub date: NaiveDate,
    pub mood: Option<String>,
    pub audio_url: Option<String>,
    pub shared_with: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct JournalEntryRow {
    id: Uuid,
    user_id: Uuid,
    content: String,
    entry_date: NaiveDate,
    mood: Option<String>,
    audio_url: Option<String>,
    viewers: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JournalEntryRow> for JournalEntry {
    type Error = StoreError;

    fn try_from(row: JournalEntryRow) -> Result<Self, Self::Error> {
        Ok(JournalEntry {
            shared_with: parse_viewers(row.viewers.as_deref())?,
            id: row.id,
            user_id: row.user_id,
            content: row.content,
            date: row.entry_date,
            mood: row.mood,
            audio_url: row.audio_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateJournalEntry {
    pub content: String,
    pub date: NaiveDate,
    pub mood: Option<String>,
    pub audio_url: Option<String>,
    /// Seed the allow-list with the linked partner. Defaults to true.
    #[serde(default = "default_share")]
    pub share_with_partner: bool,
}

fn default_share() -> bool {
    true
}

/// Partial update. For `mood` and `audio_url` an absent field keeps the
/// stored value and an explicit `null` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateJournalEntry {
    pub content: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub mood: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub audio_url: Option<Option<String>>,
}

fn merged<'a>(update: &'a Option<Option<String>>, existing: &'a Option<String>) -> Option<&'a str> {
    match update {
        Some(value) => value.as_deref(),
        None => existing.as_deref(),
    }
}

const SELECT_JOURNAL: &str = r#"SELECT
    e.id,
    e.user_id,
    e.content,
    e.entry_date,
    e.mood,
    e.audio_url,
    (SELECT group_concat(lower(hex(v.viewer_id)), ',')
       FROM entry_viewers v
      WHERE v.entry_kind = 'journal' AND v.entry_id = e.id) AS viewers,
    e.created_at,
    e.updated_at
FROM journal_entries e"#;

impl RowPolicy for JournalEntry {
    const RESOURCE: &'static str = "journal entry";

    fn permits(&self, actor: &Actor, op: Operation) -> bool {
        entry_permits(self.user_id, &self.shared_with, actor, op)
    }
}

impl JournalEntry {
    pub const KIND: EntryKind = EntryKind::Journal;

    pub async fn create(
        pool: &SqlitePool,
        actor: &Actor,
        owner: Uuid,
        data: &CreateJournalEntry,
        viewers: &[Uuid],
    ) -> Result<Self, StoreError> {
        let id = Uuid::new_v4();
        let draft = JournalEntry {
            id,
            user_id: owner,
            content: data.content.clone(),
            date: data.date,
            mood: data.mood.clone(),
            audio_url: data.audio_url.clone(),
            shared_with: viewers.to_vec(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        authorize(&draft, actor, Operation::Insert)?;

        let mut tx = crate::begin_write(pool).await?;
        sqlx::query(
            "INSERT INTO journal_entries (id, user_id, content, entry_date, mood, audio_url)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(owner)
        .bind(&data.content)
        .bind(data.date)
        .bind(data.mood.as_deref())
        .bind(data.audio_url.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::from_write(e, DUPLICATE_DAY))?;
        entry_viewer::add_many(&mut tx, Self::KIND, id, viewers).await?;
        tx.commit().await?;

        Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound("journal entry"))
    }

    /// Unchecked lookup; callers apply the policy.
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, StoreError> {
        sqlx::query_as::<_, JournalEntryRow>(&format!("{SELECT_JOURNAL} WHERE e.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?
            .map(JournalEntry::try_from)
            .transpose()
    }

    pub async fn read(pool: &SqlitePool, actor: &Actor, id: Uuid) -> Result<Self, StoreError> {
        let entry = Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound("journal entry"))?;
        authorize(&entry, actor, Operation::Read)?;
        Ok(entry)
    }

    /// The owner's entry for `date`, if it exists and `actor` may read it.
    pub async fn find_for_owner_on(
        pool: &SqlitePool,
        actor: &Actor,
        owner: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Self>, StoreError> {
        let entry = sqlx::query_as::<_, JournalEntryRow>(&format!(
            "{SELECT_JOURNAL} WHERE e.user_id = $1 AND e.entry_date = $2"
        ))
        .bind(owner)
        .bind(date)
        .fetch_optional(pool)
        .await?
        .map(JournalEntry::try_from)
        .transpose()?;

        Ok(entry.filter(|e| e.permits(actor, Operation::Read)))
    }

    /// Entries `actor` may read, newest day first.
    pub async fn list_visible(
        pool: &SqlitePool,
        actor: &Actor,
        filter: &EntryFilter,
    ) -> Result<Vec<Self>, StoreError> {
        let rows = sqlx::query_as::<_, JournalEntryRow>(&format!(
            r#"{SELECT_JOURNAL}
WHERE ($1 IS NULL OR e.user_id = $1 OR EXISTS (
        SELECT 1 FROM entry_viewers v
         WHERE v.entry_kind = 'journal' AND v.entry_id = e.id AND v.viewer_id = $1))
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
            .map(JournalEntry::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(retain_readable(entries, actor))
    }

    pub async fn update(
        pool: &SqlitePool,
        actor: &Actor,
        id: Uuid,
        data: &UpdateJournalEntry,
    ) -> Result<Self, StoreError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound("journal entry"))?;
        authorize(&existing, actor, Operation::Update)?;

        sqlx::query(
            "UPDATE journal_entries
                SET content = $2, entry_date = $3, mood = $4, audio_url = $5,
                    updated_at = datetime('now', 'subsec')
              WHERE id = $1",
        )
        .bind(id)
        .bind(data.content.as_deref().unwrap_or(&existing.content))
        .bind(data.date.unwrap_or(existing.date))
        .bind(merged(&data.mood, &existing.mood))
        .bind(merged(&data.audio_url, &existing.audio_url))
        .execute(pool)
        .await
        .map_err(|e| StoreError::from_write(e, DUPLICATE_DAY))?;

        Self::read(pool, actor, id).await
    }

    pub async fn delete(pool: &SqlitePool, actor: &Actor, id: Uuid) -> Result<(), StoreError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound("journal entry"))?;
        authorize(&existing, actor, Operation::Delete)?;

        sqlx::query("DELETE FROM journal_entries WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Grants `viewer` read access. Changing the allow-list is an update.
    pub async fn add_viewer(
        pool: &SqlitePool,
        actor: &Actor,
        id: Uuid,
        viewer: Uuid,
    ) -> Result<Self, StoreError> {
        let existing = Self::find_by_id(pool, id)
            .await?
            .ok_or(StoreError::NotFound("journal entry"))?;
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
            .ok_or(StoreError::NotFound("journal entry"))?;
        authorize(&existing, actor, Operation::Update)?;

        if !entry_viewer::remove(pool, Self::KIND, id, viewer).await? {
            return Err(StoreError::NotFound("viewer"));
        }
        Self::read(pool, actor, id).await
    }

    /// Adds `viewer` to every journal entry of `owner`. Only the trusted
    /// process does this, as part of partner linking.
    pub async fn share_all_with(
        conn: &mut SqliteConnection,
        actor: &Actor,
        owner: Uuid,
        viewer: Uuid,
    ) -> Result<u64, StoreError> {
        if !actor.is_service() {
            return Err(StoreError::Denied(
                "cannot update journal entry".to_string(),
            ));
        }
        Ok(entry_viewer::share_owner_entries(conn, Self::KIND, owner, viewer).await?)
    }
}
