use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::entry::EntryKind;
use crate::{
    StoreError,
    policy::{Actor, Operation, RowPolicy, authorize, retain_readable},
};

/// A user's own annotation on an entry they can read. Visible to its author only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PrivateNote {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entry_id: Uuid,
    pub entry_kind: EntryKind,
    pub note_content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpsertPrivateNote {
    pub note_content: String,
}

impl RowPolicy for PrivateNote {
    const RESOURCE: &'static str = "private note";

    fn permits(&self, actor: &Actor, _op: Operation) -> bool {
        actor.is(self.user_id)
    }
}

const SELECT_NOTE: &str = "SELECT id, user_id, entry_id, entry_kind, note_content, created_at, updated_at
                             FROM private_notes";

impl PrivateNote {
    /// Creates or replaces `author`'s note on the entry.
    pub async fn upsert(
        pool: &SqlitePool,
        actor: &Actor,
        author: Uuid,
        entry_kind: EntryKind,
        entry_id: Uuid,
        note_content: &str,
    ) -> Result<Self, StoreError> {
        let draft = PrivateNote {
            id: Uuid::new_v4(),
            user_id: author,
            entry_id,
            entry_kind,
            note_content: note_content.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        authorize(&draft, actor, Operation::Insert)?;

        sqlx::query(
            "INSERT INTO private_notes (id, user_id, entry_id, entry_kind, note_content)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id, entry_id, entry_kind) DO UPDATE
                SET note_content = excluded.note_content,
                    updated_at = datetime('now', 'subsec')",
        )
        .bind(draft.id)
        .bind(author)
        .bind(entry_id)
        .bind(entry_kind)
        .bind(note_content)
        .execute(pool)
        .await?;

        Self::find(pool, actor, entry_kind, entry_id)
            .await?
            .ok_or(StoreError::NotFound("private note"))
    }

    /// The actor's own note on the entry.
    pub async fn find(
        pool: &SqlitePool,
        actor: &Actor,
        entry_kind: EntryKind,
        entry_id: Uuid,
    ) -> Result<Option<Self>, StoreError> {
        let Some(author) = actor.user_id() else {
            return Err(StoreError::Denied("cannot read private note".to_string()));
        };
        let note = sqlx::query_as::<_, PrivateNote>(&format!(
            "{SELECT_NOTE} WHERE user_id = $1 AND entry_kind = $2 AND entry_id = $3"
        ))
        .bind(author)
        .bind(entry_kind)
        .bind(entry_id)
        .fetch_optional(pool)
        .await?;
        Ok(note)
    }

    /// Every note on the entry that `actor` may read, which is at most their own.
    pub async fn list_for_entry(
        pool: &SqlitePool,
        actor: &Actor,
        entry_kind: EntryKind,
        entry_id: Uuid,
    ) -> Result<Vec<Self>, StoreError> {
        let notes = sqlx::query_as::<_, PrivateNote>(&format!(
            "{SELECT_NOTE} WHERE entry_kind = $1 AND entry_id = $2 ORDER BY created_at"
        ))
        .bind(entry_kind)
        .bind(entry_id)
        .fetch_all(pool)
        .await?;
        Ok(retain_readable(notes, actor))
    }

    pub async fn delete(
        pool: &SqlitePool,
        actor: &Actor,
        entry_kind: EntryKind,
        entry_id: Uuid,
    ) -> Result<(), StoreError> {
        let note = Self::find(pool, actor, entry_kind, entry_id)
            .await?
            .ok_or(StoreError::NotFound("private note"))?;
        authorize(&note, actor, Operation::Delete)?;

        sqlx::query("DELETE FROM private_notes WHERE id = $1")
            .bind(note.id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
