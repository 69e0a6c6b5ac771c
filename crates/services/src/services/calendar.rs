use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use db::{
    DBService, StoreError,
    models::{
        couple::Couple,
        entry::EntryFilter,
        journal_entry::JournalEntry,
        mood_entry::MoodEntry,
        shared_reflection::SharedReflection,
    },
    policy::Actor,
};
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Invalid month '{0}', expected yyyy-mm")]
    InvalidMonth(String),
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub user_entry: Option<JournalEntry>,
    pub partner_entry: Option<JournalEntry>,
    pub user_mood: Option<MoodEntry>,
    pub partner_mood: Option<MoodEntry>,
    pub shared_reflection: Option<SharedReflection>,
}

/// First and last day of a `yyyy-mm` month.
pub fn parse_month(month: &str) -> Result<(NaiveDate, NaiveDate), CalendarError> {
    let invalid = || CalendarError::InvalidMonth(month.to_string());

    let (year, mon) = month.trim().split_once('-').ok_or_else(invalid)?;
    if year.len() != 4 || mon.len() != 2 {
        return Err(invalid());
    }
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let mon: u32 = mon.parse().map_err(|_| invalid())?;

    let first = NaiveDate::from_ymd_opt(year, mon, 1).ok_or_else(invalid)?;
    let next = if mon == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, mon + 1, 1)
    };
    let last = next.and_then(|d| d.pred_opt()).ok_or_else(invalid)?;
    Ok((first, last))
}

#[derive(Clone)]
pub struct CalendarService {
    db: DBService,
}

impl CalendarService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    /// One day per calendar day of `month`, holding what the actor may see.
    pub async fn month(&self, actor: &Actor, month: &str) -> Result<Vec<CalendarDay>, CalendarError> {
        let user = actor
            .user_id()
            .ok_or_else(|| StoreError::Denied("cannot read calendar".to_string()))?;
        let (first, last) = parse_month(month)?;
        let pool = &self.db.pool;

        let partner = Couple::partner_of(pool, user).await?;
        let range = EntryFilter::default().between(first, last);

        let mut journals: HashMap<(Uuid, NaiveDate), JournalEntry> =
            JournalEntry::list_visible(pool, actor, &range)
                .await?
                .into_iter()
                .map(|e| ((e.user_id, e.date), e))
                .collect();
        let mut moods: HashMap<(Uuid, NaiveDate), MoodEntry> = MoodEntry::list_visible(pool, actor, &range)
            .await?
            .into_iter()
            .map(|e| ((e.user_id, e.date), e))
            .collect();
        let mut reflections: HashMap<NaiveDate, SharedReflection> =
            SharedReflection::list_for_member(pool, actor, user, Some(first), Some(last))
                .await?
                .into_iter()
                .filter(|r| partner.is_some_and(|p| r.pair().contains(p)))
                .map(|r| (r.date, r))
                .collect();

        let days = first
            .iter_days()
            .take_while(|d| *d <= last)
            .map(|date| CalendarDay {
                date,
                user_entry: journals.remove(&(user, date)),
                partner_entry: partner.and_then(|p| journals.remove(&(p, date))),
                user_mood: moods.remove(&(user, date)),
                partner_mood: partner.and_then(|p| moods.remove(&(p, date))),
                shared_reflection: reflections.remove(&date),
            })
            .collect::<Vec<_>>();

        debug_assert_eq!(days.len() as u32, last.day());
        Ok(days)
    }
}
