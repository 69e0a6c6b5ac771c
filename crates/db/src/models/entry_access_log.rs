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

/// Append-only record of a non-owner reading an entry.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct EntryAccessLog {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub entry_kind: EntryKind,
    pub accessed_by: Uuid,
    pub entry_owner: Uuid,
    pub accessed_at: DateTime<Utc>,
}

impl RowPolicy for EntryAccessLog {
    const RESOURCE: &'static str = "entry access log";

    fn permits(&self, actor: &Actor, op: Operation) -> bool {
        match op {
            Operation::Read => actor.is(self.accessed_by) || actor.is(self.entry_owner),
            // Self-attested: the viewer records their own read.
            Operation::Insert => actor.is(self.accessed_by),
            Operation::Update | Operation::Delete => false,
        }
    }
}

impl EntryAccessLog {
    pub async fn append(
        pool: &SqlitePool,
        actor: &Actor,
        entry_kind: EntryKind,
        entry_id: Uuid,
        entry_owner: Uuid,
        accessed_by: Uuid,
    ) -> Result<Self, StoreError> {
        let record = EntryAccessLog {
            id: Uuid::new_v4(),
            entry_id,
            entry_kind,
            accessed_by,
            entry_owner,
            accessed_at: Utc::now(),
        };
        authorize(&record, actor, Operation::Insert)?;

        sqlx::query(
            "INSERT INTO entry_access_logs (id, entry_id, entry_kind, accessed_by, entry_owner, accessed_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(record.id)
        .bind(record.entry_id)
        .bind(record.entry_kind)
        .bind(record.accessed_by)
        .bind(record.entry_owner)
        .bind(record.accessed_at)
        .execute(pool)
        .await?;

        Ok(record)
    }

    /// Log records for one entry that `actor` may see, newest first.
    pub async fn list_for_entry(
        pool: &SqlitePool,
        actor: &Actor,
        entry_kind: EntryKind,
        entry_id: Uuid,
    ) -> Result<Vec<Self>, StoreError> {
        let records = sqlx::query_as::<_, EntryAccessLog>(
            "SELECT id, entry_id, entry_kind, accessed_by, entry_owner, accessed_at
               FROM entry_access_logs
              WHERE entry_kind = $1 AND entry_id = $2
                AND ($3 IS NULL OR accessed_by = $3 OR entry_owner = $3)
              ORDER BY accessed_at DESC",
        )
        .bind(entry_kind)
        .bind(entry_id)
        .bind(actor.user_id())
        .fetch_all(pool)
        .await?;
        Ok(retain_readable(records, actor))
    }
}
