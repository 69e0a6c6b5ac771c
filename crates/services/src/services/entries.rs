//! Journal and mood entries on behalf of an authenticated user, plus the
//! read receipts (access logs) that non-owner reads leave behind.

use db::{
    DBService, StoreError,
    models::{
        couple::Couple,
        entry::{EntryFilter, EntryKind},
        entry_access_log::EntryAccessLog,
        journal_entry::{CreateJournalEntry, JournalEntry, UpdateJournalEntry},
        mood_entry::{CreateMoodEntry, MoodEntry, UpdateMoodEntry},
        private_note::PrivateNote,
        profile::Profile,
    },
    policy::Actor,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct ShareEntryRequest {
    pub viewer_id: Uuid,
}

#[derive(Clone)]
pub struct EntryService {
    db: DBService,
}

fn user_of(actor: &Actor) -> Result<Uuid, EntryError> {
    actor
        .user_id()
        .ok_or_else(|| EntryError::Store(StoreError::Denied("entries are written by users".to_string())))
}

impl EntryService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    /// Allow-list seed for a new entry.
    async fn initial_viewers(&self, owner: Uuid, share_with_partner: bool) -> Result<Vec<Uuid>, EntryError> {
        if !share_with_partner {
            return Ok(Vec::new());
        }
        Ok(Couple::partner_of(&self.db.pool, owner).await?.into_iter().collect())
    }

    pub async fn create_journal(
        &self,
        actor: &Actor,
        data: CreateJournalEntry,
    ) -> Result<JournalEntry, EntryError> {
        let owner = user_of(actor)?;
        if data.content.trim().is_empty() {
            return Err(EntryError::Validation("Journal content cannot be empty".to_string()));
        }
        let viewers = self.initial_viewers(owner, data.share_with_partner).await?;
        let entry = JournalEntry::create(&self.db.pool, actor, owner, &data, &viewers).await?;
        info!(user_id = %owner, entry_id = %entry.id, date = %entry.date, "Created journal entry");
        Ok(entry)
    }

    pub async fn list_journal(
        &self,
        actor: &Actor,
        filter: &EntryFilter,
    ) -> Result<Vec<JournalEntry>, EntryError> {
        let entries = JournalEntry::list_visible(&self.db.pool, actor, filter).await?;
        for entry in &entries {
            self.record_access(actor, EntryKind::Journal, entry.id, entry.user_id).await;
        }
        Ok(entries)
    }

    pub async fn get_journal(&self, actor: &Actor, id: Uuid) -> Result<JournalEntry, EntryError> {
        let entry = JournalEntry::read(&self.db.pool, actor, id).await?;
        self.record_access(actor, EntryKind::Journal, entry.id, entry.user_id).await;
        Ok(entry)
    }

    pub async fn update_journal(
        &self,
        actor: &Actor,
        id: Uuid,
        data: UpdateJournalEntry,
    ) -> Result<JournalEntry, EntryError> {
        if data.content.is_none() && data.date.is_none() && data.mood.is_none() && data.audio_url.is_none() {
            return Err(EntryError::Validation("No data to update".to_string()));
        }
        if data.content.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(EntryError::Validation("Journal content cannot be empty".to_string()));
        }
        Ok(JournalEntry::update(&self.db.pool, actor, id, &data).await?)
    }

    pub async fn delete_journal(&self, actor: &Actor, id: Uuid) -> Result<(), EntryError> {
        JournalEntry::delete(&self.db.pool, actor, id).await?;
        info!(entry_id = %id, "Deleted journal entry");
        Ok(())
    }

    pub async fn share_journal(&self, actor: &Actor, id: Uuid, viewer: Uuid) -> Result<JournalEntry, EntryError> {
        self.check_viewer(actor, viewer).await?;
        Ok(JournalEntry::add_viewer(&self.db.pool, actor, id, viewer).await?)
    }

    pub async fn unshare_journal(&self, actor: &Actor, id: Uuid, viewer: Uuid) -> Result<JournalEntry, EntryError> {
        Ok(JournalEntry::remove_viewer(&self.db.pool, actor, id, viewer).await?)
    }

    pub async fn create_mood(&self, actor: &Actor, data: CreateMoodEntry) -> Result<MoodEntry, EntryError> {
        let owner = user_of(actor)?;
        if data.mood.trim().is_empty() {
            return Err(EntryError::Validation("Mood cannot be empty".to_string()));
        }
        let viewers = self.initial_viewers(owner, data.share_with_partner).await?;
        let entry = MoodEntry::create(&self.db.pool, actor, owner, &data, &viewers).await?;
        info!(user_id = %owner, entry_id = %entry.id, date = %entry.date, "Created mood entry");
        Ok(entry)
    }

    pub async fn list_mood(&self, actor: &Actor, filter: &EntryFilter) -> Result<Vec<MoodEntry>, EntryError> {
        let entries = MoodEntry::list_visible(&self.db.pool, actor, filter).await?;
        for entry in &entries {
            self.record_access(actor, EntryKind::Mood, entry.id, entry.user_id).await;
        }
        Ok(entries)
    }

    pub async fn get_mood(&self, actor: &Actor, id: Uuid) -> Result<MoodEntry, EntryError> {
        let entry = MoodEntry::read(&self.db.pool, actor, id).await?;
        self.record_access(actor, EntryKind::Mood, entry.id, entry.user_id).await;
        Ok(entry)
    }

    pub async fn update_mood(&self, actor: &Actor, id: Uuid, data: UpdateMoodEntry) -> Result<MoodEntry, EntryError> {
        if data.mood.is_none() && data.date.is_none() {
            return Err(EntryError::Validation("No data to update".to_string()));
        }
        if data.mood.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(EntryError::Validation("Mood cannot be empty".to_string()));
        }
        Ok(MoodEntry::update(&self.db.pool, actor, id, &data).await?)
    }

    pub async fn delete_mood(&self, actor: &Actor, id: Uuid) -> Result<(), EntryError> {
        MoodEntry::delete(&self.db.pool, actor, id).await?;
        info!(entry_id = %id, "Deleted mood entry");
        Ok(())
    }

    pub async fn share_mood(&self, actor: &Actor, id: Uuid, viewer: Uuid) -> Result<MoodEntry, EntryError> {
        self.check_viewer(actor, viewer).await?;
        Ok(MoodEntry::add_viewer(&self.db.pool, actor, id, viewer).await?)
    }

    pub async fn unshare_mood(&self, actor: &Actor, id: Uuid, viewer: Uuid) -> Result<MoodEntry, EntryError> {
        Ok(MoodEntry::remove_viewer(&self.db.pool, actor, id, viewer).await?)
    }

    async fn check_viewer(&self, actor: &Actor, viewer: Uuid) -> Result<(), EntryError> {
        if actor.is(viewer) {
            return Err(EntryError::Validation("Owners always see their own entries".to_string()));
        }
        if Profile::find_by_id(&self.db.pool, viewer).await?.is_none() {
            return Err(StoreError::NotFound("profile").into());
        }
        Ok(())
    }

    /// Owner of the entry if it exists and `actor` may read it.
    async fn readable_owner(&self, actor: &Actor, kind: EntryKind, entry_id: Uuid) -> Result<Uuid, EntryError> {
        let owner = match kind {
            EntryKind::Journal => JournalEntry::read(&self.db.pool, actor, entry_id).await?.user_id,
            EntryKind::Mood => MoodEntry::read(&self.db.pool, actor, entry_id).await?.user_id,
        };
        Ok(owner)
    }

    /// Leaves a read receipt for a non-owner read. Never fails the read itself.
    async fn record_access(&self, actor: &Actor, kind: EntryKind, entry_id: Uuid, owner: Uuid) {
        let Some(viewer) = actor.user_id() else {
            return;
        };
        if viewer == owner {
            return;
        }

        match Profile::find_by_id(&self.db.pool, viewer).await {
            Ok(Some(profile)) if !profile.allow_read_receipts => return,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, viewer_id = %viewer, "Could not load read receipt preference");
                return;
            }
        }

        if let Err(e) = EntryAccessLog::append(&self.db.pool, actor, kind, entry_id, owner, viewer).await {
            warn!(
                error = %e,
                entry_id = %entry_id,
                entry_kind = %kind,
                "Failed to record entry access"
            );
        }
    }

    pub async fn access_logs(
        &self,
        actor: &Actor,
        kind: EntryKind,
        entry_id: Uuid,
    ) -> Result<Vec<EntryAccessLog>, EntryError> {
        Ok(EntryAccessLog::list_for_entry(&self.db.pool, actor, kind, entry_id).await?)
    }

    /// Creates or replaces the actor's note on an entry they can read.
    pub async fn put_private_note(
        &self,
        actor: &Actor,
        kind: EntryKind,
        entry_id: Uuid,
        content: &str,
    ) -> Result<PrivateNote, EntryError> {
        let author = user_of(actor)?;
        if content.trim().is_empty() {
            return Err(EntryError::Validation("Note cannot be empty".to_string()));
        }
        self.readable_owner(actor, kind, entry_id).await?;
        Ok(PrivateNote::upsert(&self.db.pool, actor, author, kind, entry_id, content).await?)
    }

    pub async fn private_note(
        &self,
        actor: &Actor,
        kind: EntryKind,
        entry_id: Uuid,
    ) -> Result<Option<PrivateNote>, EntryError> {
        Ok(PrivateNote::find(&self.db.pool, actor, kind, entry_id).await?)
    }

    pub async fn delete_private_note(&self, actor: &Actor, kind: EntryKind, entry_id: Uuid) -> Result<(), EntryError> {
        Ok(PrivateNote::delete(&self.db.pool, actor, kind, entry_id).await?)
    }

    /// Every note on the entry the actor may see, which is never anyone else's.
    pub async fn private_notes_on(
        &self,
        actor: &Actor,
        kind: EntryKind,
        entry_id: Uuid,
    ) -> Result<Vec<PrivateNote>, EntryError> {
        Ok(PrivateNote::list_for_entry(&self.db.pool, actor, kind, entry_id).await?)
    }
}
