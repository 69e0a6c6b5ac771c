//! Shared reflections: AI text written for a couple once both partners have
//! journaled on the same day.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use db::{
    DBService, StoreError,
    models::{
        couple::{Couple, CouplePair},
        journal_entry::JournalEntry,
        shared_reflection::SharedReflection,
    },
    policy::Actor,
};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use super::claude_api::{ClaudeApiClient, ClaudeApiError};

const SYSTEM_PROMPT: &str =
    "You are a relationship counselor and poet who writes short, warm reflections for couples.";
const MAX_TOKENS: u32 = 200;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("reflection generator is not configured")]
    NotConfigured,
    #[error(transparent)]
    Claude(#[from] ClaudeApiError),
    #[error("generator returned an empty reflection")]
    Empty,
}

/// Boundary to whatever writes the reflection text.
#[async_trait]
pub trait ReflectionGenerator: Send + Sync {
    async fn generate(&self, first: &str, second: &str) -> Result<String, GeneratorError>;
}

pub struct ClaudeReflectionGenerator {
    client: ClaudeApiClient,
}

impl ClaudeReflectionGenerator {
    pub fn new(client: ClaudeApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReflectionGenerator for ClaudeReflectionGenerator {
    async fn generate(&self, first: &str, second: &str) -> Result<String, GeneratorError> {
        let text = self
            .client
            .ask_with_max_tokens(&reflection_prompt(first, second), Some(SYSTEM_PROMPT.to_string()), MAX_TOKENS)
            .await?;
        clean_reflection(&text).ok_or(GeneratorError::Empty)
    }
}

fn reflection_prompt(first: &str, second: &str) -> String {
    format!(
        "Two partners wrote in their journals on the same day.\n\n\
         First person wrote: \"{first}\"\n\
         Second person wrote: \"{second}\"\n\n\
         Write a 1-2 sentence reflection that captures the essence of their shared day \
         and their emotional connection. Make it poetic, warm and insightful. \
         Reply with the reflection only."
    )
}

/// Trims whitespace and wrapping quotes. `None` if nothing is left.
pub fn clean_reflection(text: &str) -> Option<String> {
    let trimmed = text
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\u{201c}' | '\u{201d}'))
        .trim();
    let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

/// What to do when a reflection for the day already exists.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RegenerationPolicy {
    /// Refuse with a conflict.
    #[default]
    Reject,
    /// Replace the stored text.
    Overwrite,
    /// Keep the old row and add a higher version.
    Version,
}

#[derive(Debug, Error)]
pub enum ReflectionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("No partner linked")]
    NoPartner,
    #[error("Profiles are not linked partners")]
    NotACouple,
    #[error("Both partners need journal entries for this date")]
    MissingEntries,
    #[error("Reflection already exists for this date")]
    AlreadyExists,
    #[error("reflection generation failed: {0}")]
    Upstream(#[from] GeneratorError),
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct BackfillReflectionRequest {
    pub user_id: Uuid,
    pub partner_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
pub struct DailyRunSummary {
    pub date: NaiveDate,
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct ReflectionService {
    db: DBService,
    generator: Option<Arc<dyn ReflectionGenerator>>,
    policy: RegenerationPolicy,
}

impl ReflectionService {
    pub fn new(
        db: DBService,
        generator: Option<Arc<dyn ReflectionGenerator>>,
        policy: RegenerationPolicy,
    ) -> Self {
        Self {
            db,
            generator,
            policy,
        }
    }

    pub fn policy(&self) -> RegenerationPolicy {
        self.policy
    }

    /// Generation requested by one of the partners for `date`.
    pub async fn generate_for_requester(
        &self,
        actor: &Actor,
        date: NaiveDate,
    ) -> Result<SharedReflection, ReflectionError> {
        let requester = actor
            .user_id()
            .ok_or_else(|| StoreError::Denied("cannot request reflection".to_string()))?;
        let partner = Couple::partner_of(&self.db.pool, requester)
            .await?
            .ok_or(ReflectionError::NoPartner)?;
        let pair = CouplePair::new(requester, partner).ok_or(ReflectionError::NoPartner)?;

        let stored = self.generate_for_pair(pair, date, self.policy).await?;
        // Hand back what the requester is allowed to see.
        Ok(SharedReflection::find_latest(&self.db.pool, actor, pair, date)
            .await?
            .unwrap_or(stored))
    }

    /// Trusted backfill for two named profiles, which must be a couple.
    pub async fn backfill(
        &self,
        request: &BackfillReflectionRequest,
    ) -> Result<SharedReflection, ReflectionError> {
        let pair = CouplePair::new(request.user_id, request.partner_id)
            .ok_or(ReflectionError::NotACouple)?;
        let linked = Couple::find_for_user(&self.db.pool, request.user_id)
            .await?
            .is_some_and(|couple| couple.pair() == pair);
        if !linked {
            return Err(ReflectionError::NotACouple);
        }
        self.generate_for_pair(pair, request.date, self.policy).await
    }

    /// Writes the reflection for (`date`, `pair`) as the trusted process.
    pub async fn generate_for_pair(
        &self,
        pair: CouplePair,
        date: NaiveDate,
        policy: RegenerationPolicy,
    ) -> Result<SharedReflection, ReflectionError> {
        let service = Actor::Service;
        let pool = &self.db.pool;

        let first = JournalEntry::find_for_owner_on(pool, &service, pair.low, date).await?;
        let second = JournalEntry::find_for_owner_on(pool, &service, pair.high, date).await?;
        let (Some(first), Some(second)) = (first, second) else {
            return Err(ReflectionError::MissingEntries);
        };

        let existing = SharedReflection::find_latest(pool, &service, pair, date).await?;
        if existing.is_some() && policy == RegenerationPolicy::Reject {
            return Err(ReflectionError::AlreadyExists);
        }

        let generator = self.generator.as_ref().ok_or(GeneratorError::NotConfigured)?;
        let text = generator.generate(&first.content, &second.content).await?;

        let stored = match (existing, policy) {
            (None, _) => SharedReflection::create(pool, &service, pair, date, &text, 1).await,
            (Some(current), RegenerationPolicy::Overwrite) => {
                SharedReflection::overwrite(pool, &service, current.id, &text).await
            }
            (Some(current), RegenerationPolicy::Version) => {
                SharedReflection::create(pool, &service, pair, date, &text, current.version + 1).await
            }
            (Some(_), RegenerationPolicy::Reject) => return Err(ReflectionError::AlreadyExists),
        }
        .map_err(|e| match e {
            StoreError::Conflict(_) => ReflectionError::AlreadyExists,
            other => other.into(),
        })?;

        info!(
            date = %date,
            member_low = %pair.low,
            member_high = %pair.high,
            version = stored.version,
            policy = %policy,
            "Stored shared reflection"
        );
        Ok(stored)
    }

    pub async fn list_for_requester(
        &self,
        actor: &Actor,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<SharedReflection>, ReflectionError> {
        let member = actor
            .user_id()
            .ok_or_else(|| StoreError::Denied("cannot read shared reflection".to_string()))?;
        Ok(SharedReflection::list_for_member(&self.db.pool, actor, member, from, to).await?)
    }

    /// Generates missing reflections for `date` for every couple. Existing
    /// reflections are never touched, whatever the configured policy.
    pub async fn run_daily(&self, date: NaiveDate) -> Result<DailyRunSummary, ReflectionError> {
        let couples = Couple::list_all(&self.db.pool, &Actor::Service).await?;
        let mut summary = DailyRunSummary {
            date,
            ..Default::default()
        };

        for couple in couples {
            let pair = couple.pair();
            match self.generate_for_pair(pair, date, RegenerationPolicy::Reject).await {
                Ok(_) => summary.generated += 1,
                Err(ReflectionError::MissingEntries | ReflectionError::AlreadyExists) => {
                    debug!(couple_id = %couple.id, date = %date, "No reflection needed");
                    summary.skipped += 1;
                }
                Err(e) => {
                    warn!(couple_id = %couple.id, date = %date, error = %e, "Reflection generation failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            date = %date,
            generated = summary.generated,
            skipped = summary.skipped,
            failed = summary.failed,
            "Daily reflection run finished"
        );
        Ok(summary)
    }
}
