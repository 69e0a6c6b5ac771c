use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use db::{
    DBService, StoreError,
    models::{
        couple::Couple, entry::EntryFilter, journal_entry::JournalEntry,
        shared_reflection::SharedReflection,
    },
    policy::Actor,
};
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
pub struct Statistics {
    pub total_entries: usize,
    pub partner_entries: usize,
    pub shared_days: usize,
    pub total_reflections: usize,
    pub current_streak: usize,
    pub longest_streak: usize,
    pub has_partner: bool,
}

/// (current, longest) runs of consecutive days. The current run only counts
/// if it reaches today or yesterday.
pub fn compute_streaks(dates: &[NaiveDate], today: NaiveDate) -> (usize, usize) {
    let days: Vec<NaiveDate> = dates.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    let Some(&latest) = days.last() else {
        return (0, 0);
    };

    let mut longest = 1;
    let mut run = 1;
    for pair in days.windows(2) {
        if pair[0].succ_opt() == Some(pair[1]) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 1;
        }
    }

    let current = if latest == today || latest.succ_opt() == Some(today) {
        // `run` is the length of the run ending at `latest`.
        run
    } else {
        0
    };
    (current, longest)
}

#[derive(Clone)]
pub struct StatsService {
    db: DBService,
}

impl StatsService {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }

    pub async fn stats(&self, actor: &Actor) -> Result<Statistics, StatsError> {
        self.stats_on(actor, Utc::now().date_naive()).await
    }

    pub async fn stats_on(&self, actor: &Actor, today: NaiveDate) -> Result<Statistics, StatsError> {
        let user = actor
            .user_id()
            .ok_or_else(|| StoreError::Denied("cannot read statistics".to_string()))?;
        let pool = &self.db.pool;

        let own: Vec<NaiveDate> = JournalEntry::list_visible(pool, actor, &EntryFilter::owner(user))
            .await?
            .into_iter()
            .map(|e| e.date)
            .collect();
        let (current_streak, longest_streak) = compute_streaks(&own, today);

        let partner = Couple::partner_of(pool, user).await?;
        let (partner_entries, shared_days) = match partner {
            Some(partner) => {
                let theirs: BTreeSet<NaiveDate> =
                    JournalEntry::list_visible(pool, actor, &EntryFilter::owner(partner))
                        .await?
                        .into_iter()
                        .map(|e| e.date)
                        .collect();
                let shared = own.iter().filter(|d| theirs.contains(d)).count();
                (theirs.len(), shared)
            }
            None => (0, 0),
        };

        let total_reflections = SharedReflection::count_for_member(pool, actor, user).await?;

        Ok(Statistics {
            total_entries: own.len(),
            partner_entries,
            shared_days,
            total_reflections: usize::try_from(total_reflections).unwrap_or_default(),
            current_streak,
            longest_streak,
            has_partner: partner.is_some(),
        })
    }
}
