//! Row-level access control.
//!
//! Every store operation names the acting identity explicitly through an
//! [`Actor`]; nothing reads an ambient "current user". Each record type
//! implements [`RowPolicy`] and the model functions call [`authorize`]
//! before touching a row, or [`retain_readable`] after a listing query.

use serde::{Deserialize, Serialize};
use strum_macros::Display;
use tracing::debug;
use uuid::Uuid;

use crate::StoreError;

/// Identity on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Actor {
    /// An authenticated end user.
    User(Uuid),
    /// The trusted automated process (reflection generation, partner linking backfill).
    Service,
}

impl Actor {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Actor::User(id) => Some(*id),
            Actor::Service => None,
        }
    }

    /// True when the actor is the end user `id`.
    pub fn is(&self, id: Uuid) -> bool {
        matches!(self, Actor::User(user) if *user == id)
    }

    pub fn is_service(&self) -> bool {
        matches!(self, Actor::Service)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Read,
    Insert,
    Update,
    Delete,
}

impl Operation {
    pub fn is_write(&self) -> bool {
        !matches!(self, Operation::Read)
    }
}

pub trait RowPolicy {
    /// Name used in denial messages.
    const RESOURCE: &'static str;

    fn permits(&self, actor: &Actor, op: Operation) -> bool;
}

pub fn authorize<R: RowPolicy>(row: &R, actor: &Actor, op: Operation) -> Result<(), StoreError> {
    if row.permits(actor, op) {
        Ok(())
    } else {
        debug!(resource = R::RESOURCE, operation = %op, actor = ?actor, "Access denied");
        Err(StoreError::Denied(format!("cannot {} {}", op, R::RESOURCE)))
    }
}

/// Drops rows the actor may not read.
pub fn retain_readable<R: RowPolicy>(mut rows: Vec<R>, actor: &Actor) -> Vec<R> {
    rows.retain(|row| row.permits(actor, Operation::Read));
    rows
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::models::{
        couple::{Couple, CouplePair},
        entry::EntryKind,
        entry_access_log::EntryAccessLog,
        journal_entry::JournalEntry,
        mood_entry::MoodEntry,
        private_note::PrivateNote,
        profile::Profile,
        shared_reflection::SharedReflection,
    };

    fn ids() -> (Uuid, Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
    }

    fn profile(id: Uuid, partner_id: Option<Uuid>) -> Profile {
        Profile {
            id,
            email: format!("{id}@example.com"),
            full_name: None,
            invite_code: None,
            partner_id,
            allow_read_receipts: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn journal(owner: Uuid, shared_with: Vec<Uuid>) -> JournalEntry {
        JournalEntry {
            id: Uuid::new_v4(),
            user_id: owner,
            content: "walked by the river".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            mood: None,
            audio_url: None,
            shared_with,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn profile_visible_to_self_and_partner_only() {
        let (me, partner, stranger) = ids();
        let row = profile(me, Some(partner));

        assert!(row.permits(&Actor::User(me), Operation::Read));
        assert!(row.permits(&Actor::User(partner), Operation::Read));
        assert!(!row.permits(&Actor::User(stranger), Operation::Read));

        assert!(row.permits(&Actor::User(me), Operation::Update));
        assert!(!row.permits(&Actor::User(partner), Operation::Update));
        assert!(!row.permits(&Actor::Service, Operation::Update));
    }

    #[test]
    fn journal_entry_readable_by_listed_viewers_writable_by_owner() {
        let (owner, viewer, stranger) = ids();
        let mut row = journal(owner, vec![]);

        assert!(row.permits(&Actor::User(owner), Operation::Read));
        assert!(!row.permits(&Actor::User(viewer), Operation::Read));

        row.shared_with.push(viewer);
        assert!(row.permits(&Actor::User(viewer), Operation::Read));
        assert!(!row.permits(&Actor::User(stranger), Operation::Read));
        assert!(row.permits(&Actor::Service, Operation::Read));

        for op in [Operation::Insert, Operation::Update, Operation::Delete] {
            assert!(row.permits(&Actor::User(owner), op));
            assert!(!row.permits(&Actor::User(viewer), op));
            assert!(!row.permits(&Actor::Service, op));
        }
    }

    #[test]
    fn mood_entry_follows_journal_rules() {
        let (owner, viewer, _) = ids();
        let row = MoodEntry {
            id: Uuid::new_v4(),
            user_id: owner,
            mood: "calm".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            shared_with: vec![viewer],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(row.permits(&Actor::User(viewer), Operation::Read));
        assert!(!row.permits(&Actor::User(viewer), Operation::Update));
    }

    #[test]
    fn reflections_are_written_only_by_service() {
        let (a, b, stranger) = ids();
        let pair = CouplePair::new(a, b).unwrap();
        let row = SharedReflection {
            id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            member_low: pair.low,
            member_high: pair.high,
            reflection: "Two rivers, one sea.".to_string(),
            version: 1,
            created_at: Utc::now(),
        };

        assert!(row.permits(&Actor::User(a), Operation::Read));
        assert!(row.permits(&Actor::User(b), Operation::Read));
        assert!(!row.permits(&Actor::User(stranger), Operation::Read));
        assert!(!row.permits(&Actor::User(a), Operation::Insert));
        assert!(row.permits(&Actor::Service, Operation::Insert));
        assert!(!row.permits(&Actor::Service, Operation::Delete));
    }

    #[test]
    fn access_logs_are_self_attested_and_append_only() {
        let (owner, viewer, stranger) = ids();
        let row = EntryAccessLog {
            id: Uuid::new_v4(),
            entry_id: Uuid::new_v4(),
            entry_kind: EntryKind::Journal,
            accessed_by: viewer,
            entry_owner: owner,
            accessed_at: Utc::now(),
        };

        assert!(row.permits(&Actor::User(viewer), Operation::Insert));
        assert!(!row.permits(&Actor::User(owner), Operation::Insert));
        assert!(!row.permits(&Actor::Service, Operation::Insert));

        assert!(row.permits(&Actor::User(viewer), Operation::Read));
        assert!(row.permits(&Actor::User(owner), Operation::Read));
        assert!(!row.permits(&Actor::User(stranger), Operation::Read));

        assert!(!row.permits(&Actor::User(viewer), Operation::Update));
        assert!(!row.permits(&Actor::User(owner), Operation::Delete));
    }

    #[test]
    fn private_notes_belong_to_their_author_alone() {
        let (author, owner, _) = ids();
        let row = PrivateNote {
            id: Uuid::new_v4(),
            user_id: author,
            entry_id: Uuid::new_v4(),
            entry_kind: EntryKind::Mood,
            note_content: "ask about the interview".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        for op in [
            Operation::Read,
            Operation::Insert,
            Operation::Update,
            Operation::Delete,
        ] {
            assert!(row.permits(&Actor::User(author), op));
            assert!(!row.permits(&Actor::User(owner), op));
            assert!(!row.permits(&Actor::Service, op));
        }
    }

    #[test]
    fn couple_created_by_member_never_updated() {
        let (a, b, stranger) = ids();
        let pair = CouplePair::new(a, b).unwrap();
        let row = Couple {
            id: Uuid::new_v4(),
            member_low: pair.low,
            member_high: pair.high,
            created_at: Utc::now(),
        };
        assert!(row.permits(&Actor::User(a), Operation::Insert));
        assert!(!row.permits(&Actor::User(stranger), Operation::Insert));
        assert!(row.permits(&Actor::User(b), Operation::Read));
        assert!(!row.permits(&Actor::User(a), Operation::Update));
    }

    #[test]
    fn retain_readable_excludes_hidden_rows() {
        let (me, partner, _) = ids();
        let rows = vec![
            journal(me, vec![]),
            journal(partner, vec![me]),
            journal(partner, vec![]),
        ];
        let visible = retain_readable(rows, &Actor::User(me));
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|e| e.user_id == me || e.shared_with.contains(&me)));
    }

    #[test]
    fn authorize_reports_denied() {
        let (owner, other, _) = ids();
        let row = journal(owner, vec![]);
        let err = authorize(&row, &Actor::User(other), Operation::Delete).unwrap_err();
        assert!(matches!(err, StoreError::Denied(msg) if msg.contains("journal entry")));
    }
}
