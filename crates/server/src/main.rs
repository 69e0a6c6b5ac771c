use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use db::DBService;
use server::{
    config::{Cli, Config},
    deployment::{Deployment, DeploymentOptions},
    routes,
};
use services::services::{
    claude_api::ClaudeApiClient,
    database_validator::DatabaseValidator,
    reflection::{ClaudeReflectionGenerator, ReflectionGenerator},
    reflection_scheduler::ReflectionScheduler,
};
use tracing::{info, warn};

const REFLECTION_TEMPERATURE: f32 = 0.7;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::try_from(Cli::parse())?;

    let _sentry = utils::sentry::init_once(config.sentry_dsn.as_deref());
    utils::logging::init_tracing(&config.log_level);

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
    let db = DBService::new(&utils::assets::database_path(&config.data_dir)).await?;
    let validation = DatabaseValidator::new(db.pool.clone())
        .ensure_ready(db::REQUIRED_TABLES)
        .await?;
    info!(
        migrations = validation.migrations_applied,
        latest = ?validation.latest_migration,
        "Database ready"
    );

    let generator = match &config.anthropic_api_key {
        Some(key) => {
            let client = ClaudeApiClient::new(key.clone(), config.reflection_model.clone())?
                .with_temperature(REFLECTION_TEMPERATURE);
            info!(model = client.model(), "Reflection generator enabled");
            Some(Arc::new(ClaudeReflectionGenerator::new(client)) as Arc<dyn ReflectionGenerator>)
        }
        None => None,
    };

    let deployment = Deployment::new(
        db,
        DeploymentOptions {
            audio_root: utils::assets::audio_dir(&config.data_dir),
            jwt_secret: config.jwt_secret.clone(),
            token_ttl: config.token_ttl,
            cron_secret: config.cron_secret.clone(),
            generator,
            regeneration: config.regeneration,
        },
    )?;

    if config.scheduler_enabled {
        ReflectionScheduler::spawn(deployment.reflections().clone(), config.reflection_hour_utc);
    } else {
        warn!("Reflection scheduler disabled");
    }
    if config.cron_secret.is_none() {
        warn!("CRON_SECRET not set; cron endpoints are disabled");
    }

    let app = routes::router(deployment);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
