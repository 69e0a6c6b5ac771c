//! Command line and environment configuration.

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use services::services::{reflection::RegenerationPolicy, reflection_scheduler::DEFAULT_RUN_HOUR_UTC};
use thiserror::Error;
use utils::jwt::MIN_SECRET_LEN;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("QUEBELLA_JWT_SECRET must be at least {MIN_SECRET_LEN} characters")]
    WeakJwtSecret,
    #[error("token lifetime must be at least one day")]
    InvalidTokenTtl,
    #[error("reflection hour must be between 0 and 23, got {0}")]
    InvalidRunHour(u32),
}

#[derive(Debug, Clone, Parser)]
#[command(name = "que-bella", version, about = "Que Bella couples journal API server")]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "QUEBELLA_BIND", default_value = "127.0.0.1:8001")]
    pub bind: SocketAddr,

    /// Directory holding the database and audio uploads
    #[arg(long, env = "QUEBELLA_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// HS256 signing secret for access tokens
    #[arg(long, env = "QUEBELLA_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "QUEBELLA_TOKEN_TTL_DAYS", default_value_t = 30)]
    pub token_ttl_days: i64,

    /// Shared secret for the cron endpoints; they are disabled when unset
    #[arg(long, env = "CRON_SECRET", hide_env_values = true)]
    pub cron_secret: Option<String>,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    #[arg(long, env = "QUEBELLA_REFLECTION_MODEL")]
    pub reflection_model: Option<String>,

    /// reject | overwrite | version
    #[arg(long, env = "QUEBELLA_REFLECTION_REGENERATION", default_value = "reject")]
    pub reflection_regeneration: RegenerationPolicy,

    #[arg(long, env = "QUEBELLA_REFLECTION_HOUR_UTC", default_value_t = DEFAULT_RUN_HOUR_UTC)]
    pub reflection_hour_utc: u32,

    #[arg(long, env = "QUEBELLA_DISABLE_SCHEDULER", default_value_t = false)]
    pub disable_scheduler: bool,

    #[arg(long, env = "SENTRY_DSN")]
    pub sentry_dsn: Option<String>,

    /// Default level for workspace crates when RUST_LOG is unset
    #[arg(long, env = "QUEBELLA_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub cron_secret: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub reflection_model: Option<String>,
    pub regeneration: RegenerationPolicy,
    pub reflection_hour_utc: u32,
    pub scheduler_enabled: bool,
    pub sentry_dsn: Option<String>,
    pub log_level: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl TryFrom<Cli> for Config {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        if cli.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakJwtSecret);
        }
        if cli.token_ttl_days < 1 {
            return Err(ConfigError::InvalidTokenTtl);
        }
        if cli.reflection_hour_utc > 23 {
            return Err(ConfigError::InvalidRunHour(cli.reflection_hour_utc));
        }

        Ok(Config {
            bind: cli.bind,
            data_dir: cli.data_dir.unwrap_or_else(utils::assets::default_data_dir),
            jwt_secret: cli.jwt_secret,
            token_ttl: chrono::Duration::days(cli.token_ttl_days),
            cron_secret: non_empty(cli.cron_secret),
            anthropic_api_key: non_empty(cli.anthropic_api_key),
            reflection_model: non_empty(cli.reflection_model),
            regeneration: cli.reflection_regeneration,
            reflection_hour_utc: cli.reflection_hour_utc,
            scheduler_enabled: !cli.disable_scheduler,
            sentry_dsn: non_empty(cli.sentry_dsn),
            log_level: cli.log_level,
        })
    }
}
