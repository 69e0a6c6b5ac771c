use db::{
    DBService, StoreError,
    models::{
        couple::{Couple, CouplePair},
        journal_entry::JournalEntry,
        mood_entry::MoodEntry,
        profile::Profile,
    },
    policy::Actor,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

use super::invite_code;

#[derive(Debug, Error)]
pub enum PartnerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Invalid invite code")]
    InvalidCode,
    #[error("You cannot use your own invite code")]
    SelfLink,
    #[error("Already linked with a partner")]
    AlreadyLinked,
    #[error("No partner linked")]
    NotLinked,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct InvitePartnerRequest {
    pub invite_code: String,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct LinkResponse {
    pub partner: Profile,
    pub message: String,
}

#[derive(Clone)]
pub struct PartnerService {
    db: DBService,
}

impl PartnerService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    /// Links the actor with the owner of `code`. The couple row and the
    /// allow-list backfill commit together or not at all.
    pub async fn link_with_code(&self, actor: &Actor, code: &str) -> Result<LinkResponse, PartnerError> {
        let requester = actor
            .user_id()
            .ok_or_else(|| StoreError::Denied("cannot insert couple".to_string()))?;
        let code = invite_code::normalize(code);
        if !invite_code::is_well_formed(&code) {
            return Err(PartnerError::InvalidCode);
        }

        let mut tx = db::begin_write(&self.db.pool).await?;

        let inviter = Profile::find_by_invite_code(&mut *tx, &code)
            .await?
            .ok_or(PartnerError::InvalidCode)?;
        let pair = CouplePair::new(requester, inviter.id).ok_or(PartnerError::SelfLink)?;

        if inviter.partner_id.is_some() || Couple::find_for_user(&mut *tx, requester).await?.is_some() {
            return Err(PartnerError::AlreadyLinked);
        }

        Couple::create(&mut *tx, actor, pair).await.map_err(|e| {
            if e.is_conflict() {
                PartnerError::AlreadyLinked
            } else {
                e.into()
            }
        })?;

        let service = Actor::Service;
        let mut shared = 0;
        for (owner, viewer) in [(requester, inviter.id), (inviter.id, requester)] {
            shared += JournalEntry::share_all_with(&mut tx, &service, owner, viewer).await?;
            shared += MoodEntry::share_all_with(&mut tx, &service, owner, viewer).await?;
        }

        tx.commit().await?;
        info!(
            user_id = %requester,
            partner_id = %inviter.id,
            entries_shared = shared,
            "Linked partners"
        );

        let partner = Profile::read(&self.db.pool, actor, inviter.id).await?;
        Ok(LinkResponse {
            partner,
            message: "Successfully linked with partner".to_string(),
        })
    }

    pub async fn partner_of(&self, user_id: Uuid) -> Result<Option<Uuid>, PartnerError> {
        Ok(Couple::partner_of(&self.db.pool, user_id).await?)
    }

    /// The actor's partner, read through the profile policy.
    pub async fn partner_profile(&self, actor: &Actor) -> Result<Profile, PartnerError> {
        let user_id = actor
            .user_id()
            .ok_or_else(|| StoreError::Denied("cannot read profile".to_string()))?;
        let partner_id = self.partner_of(user_id).await?.ok_or(PartnerError::NotLinked)?;
        Ok(Profile::read(&self.db.pool, actor, partner_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use db::models::{entry::EntryFilter, journal_entry::CreateJournalEntry};

    use super::*;

    async fn profile_with_code(db: &DBService, email: &str) -> Profile {
        let id = Uuid::new_v4();
        let actor = Actor::User(id);
        let profile = {
            let mut conn = db.pool.acquire().await.unwrap();
            Profile::create(&mut conn, &actor, id, email, None).await.unwrap()
        };
        invite_code::ensure_invite_code(&db.pool, &actor, profile)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn linking_is_symmetric_and_final() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = PartnerService::new(db.clone());
        let ana = profile_with_code(&db, "ana@example.com").await;
        let ben = profile_with_code(&db, "ben@example.com").await;
        let cy = profile_with_code(&db, "cy@example.com").await;

        let code = ana.invite_code.clone().unwrap().to_lowercase();
        let linked = service.link_with_code(&Actor::User(ben.id), &code).await.unwrap();
        assert_eq!(linked.partner.id, ana.id);
        assert_eq!(linked.partner.partner_id, Some(ben.id));

        let ben_now = Profile::read(&db.pool, &Actor::User(ben.id), ben.id).await.unwrap();
        assert_eq!(ben_now.partner_id, Some(ana.id));

        let err = service
            .link_with_code(&Actor::User(ana.id), ben.invite_code.as_deref().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, PartnerError::AlreadyLinked));

        let err = service
            .link_with_code(&Actor::User(cy.id), ana.invite_code.as_deref().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, PartnerError::AlreadyLinked));

        assert_eq!(service.partner_of(cy.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn rejects_unknown_and_own_codes() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = PartnerService::new(db.clone());
        let ana = profile_with_code(&db, "ana@example.com").await;

        let err = service.link_with_code(&Actor::User(ana.id), "ZZZZZZZZ").await.unwrap_err();
        assert!(matches!(err, PartnerError::InvalidCode));
        let err = service.link_with_code(&Actor::User(ana.id), "nope").await.unwrap_err();
        assert!(matches!(err, PartnerError::InvalidCode));

        let err = service
            .link_with_code(&Actor::User(ana.id), ana.invite_code.as_deref().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, PartnerError::SelfLink));

        let err = service.partner_profile(&Actor::User(ana.id)).await.unwrap_err();
        assert!(matches!(err, PartnerError::NotLinked));
    }

    #[tokio::test]
    async fn linking_shares_existing_entries_both_ways() {
        let db = DBService::new_in_memory().await.unwrap();
        let service = PartnerService::new(db.clone());
        let ana = profile_with_code(&db, "ana@example.com").await;
        let ben = profile_with_code(&db, "ben@example.com").await;

        let entry = CreateJournalEntry {
            content: "before we linked".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            mood: None,
            audio_url: None,
            share_with_partner: true,
        };
        for who in [ana.id, ben.id] {
            JournalEntry::create(&db.pool, &Actor::User(who), who, &entry, &[])
                .await
                .unwrap();
        }

        service
            .link_with_code(&Actor::User(ben.id), ana.invite_code.as_deref().unwrap())
            .await
            .unwrap();

        for (who, partner) in [(ana.id, ben.id), (ben.id, ana.id)] {
            let visible = JournalEntry::list_visible(&db.pool, &Actor::User(who), &EntryFilter::owner(partner))
                .await
                .unwrap();
            assert_eq!(visible.len(), 1);
        }
    }
}
