//! Races against a file-backed database, where the pool really runs
//! requests on separate connections.

use chrono::NaiveDate;
use db::{
    DBService, StoreError,
    models::{journal_entry::CreateJournalEntry, profile::Profile},
    policy::Actor,
};
use services::services::{
    entries::{EntryError, EntryService},
    invite_code,
    partner::{PartnerError, PartnerService},
};
use tempfile::TempDir;
use uuid::Uuid;

async fn file_db() -> (TempDir, DBService) {
    let dir = TempDir::new().unwrap();
    let db = DBService::new(&dir.path().join("quebella.sqlite")).await.unwrap();
    (dir, db)
}

async fn profile(db: &DBService, email: &str) -> Profile {
    let id = Uuid::new_v4();
    let actor = Actor::User(id);
    let profile = {
        let mut conn = db.pool.acquire().await.unwrap();
        Profile::create(&mut conn, &actor, id, email, None).await.unwrap()
    };
    invite_code::ensure_invite_code(&db.pool, &actor, profile).await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unrelated_couples_link_at_the_same_time() {
    let (_dir, db) = file_db().await;
    let partners = PartnerService::new(db.clone());

    let mut pairs = Vec::new();
    for i in 0..16 {
        let inviter = profile(&db, &format!("inviter{i}@example.com")).await;
        let joiner = profile(&db, &format!("joiner{i}@example.com")).await;
        pairs.push((inviter, joiner));
    }

    let handles: Vec<_> = pairs
        .iter()
        .map(|(inviter, joiner)| {
            let partners = partners.clone();
            let actor = Actor::User(joiner.id);
            let code = inviter.invite_code.clone().unwrap();
            tokio::spawn(async move { partners.link_with_code(&actor, &code).await })
        })
        .collect();

    let mut failures = Vec::new();
    for handle in handles {
        if let Err(e) = handle.await.unwrap() {
            failures.push(e.to_string());
        }
    }
    assert!(failures.is_empty(), "failed links: {failures:?}");

    for (inviter, joiner) in &pairs {
        assert_eq!(partners.partner_of(joiner.id).await.unwrap(), Some(inviter.id));
        assert_eq!(partners.partner_of(inviter.id).await.unwrap(), Some(joiner.id));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn only_one_suitor_wins_an_invite_code() {
    let (_dir, db) = file_db().await;
    let partners = PartnerService::new(db.clone());
    let inviter = profile(&db, "inviter@example.com").await;
    let code = inviter.invite_code.clone().unwrap();

    let mut suitors = Vec::new();
    for i in 0..8 {
        suitors.push(profile(&db, &format!("suitor{i}@example.com")).await);
    }

    let handles: Vec<_> = suitors
        .iter()
        .map(|suitor| {
            let partners = partners.clone();
            let actor = Actor::User(suitor.id);
            let code = code.clone();
            tokio::spawn(async move { partners.link_with_code(&actor, &code).await })
        })
        .collect();

    let mut linked = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(response) => {
                assert_eq!(response.partner.id, inviter.id);
                linked += 1;
            }
            Err(PartnerError::AlreadyLinked) => {}
            Err(other) => panic!("unexpected link error: {other}"),
        }
    }
    assert_eq!(linked, 1);

    let winner = partners.partner_of(inviter.id).await.unwrap().unwrap();
    assert!(suitors.iter().any(|s| s.id == winner));
    for suitor in suitors.iter().filter(|s| s.id != winner) {
        assert_eq!(partners.partner_of(suitor.id).await.unwrap(), None);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_entries_for_one_day_keep_a_single_row() {
    let (_dir, db) = file_db().await;
    let entries = EntryService::new(db.clone());
    let owner = profile(&db, "writer@example.com").await;
    let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let entries = entries.clone();
            let actor = Actor::User(owner.id);
            tokio::spawn(async move {
                entries
                    .create_journal(
                        &actor,
                        CreateJournalEntry {
                            content: format!("draft {i}"),
                            date,
                            mood: None,
                            audio_url: None,
                            share_with_partner: true,
                        },
                    )
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(EntryError::Store(StoreError::Conflict(_))) => {}
            Err(other) => panic!("unexpected create error: {other}"),
        }
    }
    assert_eq!(created, 1);

    let listed = entries
        .list_journal(&Actor::User(owner.id), &Default::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].date, date);
}
