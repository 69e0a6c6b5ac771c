//! Shared application state handed to every route.

use std::{path::PathBuf, sync::Arc};

use db::DBService;
use services::services::{
    audio::AudioStore,
    auth::AuthService,
    calendar::CalendarService,
    entries::EntryService,
    partner::PartnerService,
    reflection::{ReflectionGenerator, ReflectionService, RegenerationPolicy},
    stats::StatsService,
};
use thiserror::Error;
use utils::jwt::{JwtError, JwtService};

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Jwt(#[from] JwtError),
}

pub struct DeploymentOptions {
    pub audio_root: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub cron_secret: Option<String>,
    pub generator: Option<Arc<dyn ReflectionGenerator>>,
    pub regeneration: RegenerationPolicy,
}

#[derive(Clone)]
pub struct Deployment {
    db: DBService,
    auth: AuthService,
    partners: PartnerService,
    entries: EntryService,
    reflections: ReflectionService,
    calendar: CalendarService,
    stats: StatsService,
    audio: AudioStore,
    cron_secret: Option<Arc<str>>,
}

impl Deployment {
    pub fn new(db: DBService, options: DeploymentOptions) -> Result<Self, DeploymentError> {
        let jwt = Arc::new(JwtService::new(&options.jwt_secret, options.token_ttl)?);
        if options.generator.is_none() {
            tracing::warn!("No reflection generator configured; reflection requests will fail");
        }

        Ok(Self {
            auth: AuthService::new(db.clone(), jwt),
            partners: PartnerService::new(db.clone()),
            entries: EntryService::new(db.clone()),
            reflections: ReflectionService::new(db.clone(), options.generator, options.regeneration),
            calendar: CalendarService::new(db.clone()),
            stats: StatsService::new(db.clone()),
            audio: AudioStore::new(db.clone(), options.audio_root),
            cron_secret: options.cron_secret.map(Arc::from),
            db,
        })
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn partners(&self) -> &PartnerService {
        &self.partners
    }

    pub fn entries(&self) -> &EntryService {
        &self.entries
    }

    pub fn reflections(&self) -> &ReflectionService {
        &self.reflections
    }

    pub fn calendar(&self) -> &CalendarService {
        &self.calendar
    }

    pub fn stats(&self) -> &StatsService {
        &self.stats
    }

    pub fn audio(&self) -> &AudioStore {
        &self.audio
    }

    /// `None` disables the cron endpoints.
    pub fn cron_secret(&self) -> Option<&str> {
        self.cron_secret.as_deref()
    }
}
