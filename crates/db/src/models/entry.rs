use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::Type;
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    StoreError,
    policy::{Actor, Operation},
};

/// The two kinds of per-day entry a user can write.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[sqlx(type_name = "entry_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntryKind {
    Journal,
    Mood,
}

impl EntryKind {
    pub(crate) fn table(&self) -> &'static str {
        match self {
            EntryKind::Journal => "journal_entries",
            EntryKind::Mood => "mood_entries",
        }
    }
}

/// Optional narrowing of an entry listing. Visibility is always applied on top.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, TS)]
pub struct EntryFilter {
    pub owner: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl EntryFilter {
    pub fn owner(owner: Uuid) -> Self {
        Self {
            owner: Some(owner),
            ..Default::default()
        }
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

/// Shared row rule for journal and mood entries: readable by the owner, by
/// anyone on the allow-list, and by the service; writable by the owner alone.
pub(crate) fn entry_permits(owner: Uuid, shared_with: &[Uuid], actor: &Actor, op: Operation) -> bool {
    match op {
        Operation::Read => match actor {
            Actor::Service => true,
            Actor::User(id) => *id == owner || shared_with.contains(id),
        },
        Operation::Insert | Operation::Update | Operation::Delete => actor.is(owner),
    }
}

/// Viewer ids come back from SQLite as a comma separated list of hex blobs.
pub(crate) fn parse_viewers(raw: Option<&str>) -> Result<Vec<Uuid>, StoreError> {
    let Some(raw) = raw.filter(|s| !s.is_empty()) else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(|hex| {
            Uuid::parse_str(hex)
                .map_err(|e| StoreError::Database(sqlx::Error::Decode(Box::new(e))))
        })
        .collect()
}
