//! Allow-list rows shared by journal and mood entries.

use sqlx::{Executor, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::entry::EntryKind;

pub(crate) async fn add<'e, E>(
    executor: E,
    kind: EntryKind,
    entry_id: Uuid,
    viewer_id: Uuid,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT OR IGNORE INTO entry_viewers (entry_kind, entry_id, viewer_id) VALUES ($1, $2, $3)",
    )
    .bind(kind)
    .bind(entry_id)
    .bind(viewer_id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn add_many(
    conn: &mut SqliteConnection,
    kind: EntryKind,
    entry_id: Uuid,
    viewers: &[Uuid],
) -> Result<(), sqlx::Error> {
    for viewer in viewers {
        add(&mut *conn, kind, entry_id, *viewer).await?;
    }
    Ok(())
}

/// Returns whether a row was removed.
pub(crate) async fn remove<'e, E>(
    executor: E,
    kind: EntryKind,
    entry_id: Uuid,
    viewer_id: Uuid,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "DELETE FROM entry_viewers WHERE entry_kind = $1 AND entry_id = $2 AND viewer_id = $3",
    )
    .bind(kind)
    .bind(entry_id)
    .bind(viewer_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Adds `viewer_id` to every entry of `kind` owned by `owner`.
pub(crate) async fn share_owner_entries<'e, E>(
    executor: E,
    kind: EntryKind,
    owner: Uuid,
    viewer_id: Uuid,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "INSERT OR IGNORE INTO entry_viewers (entry_kind, entry_id, viewer_id)
         SELECT $1, e.id, $2 FROM {} e WHERE e.user_id = $3",
        kind.table()
    );
    let result = sqlx::query(&sql)
        .bind(kind)
        .bind(viewer_id)
        .bind(owner)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
