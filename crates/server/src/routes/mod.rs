use axum::{Router, extract::DefaultBodyLimit};
use services::services::audio::MAX_AUDIO_BYTES;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::DeploymentImpl;

pub mod access_logs;
pub mod audio;
pub mod auth;
pub mod calendar;
pub mod cron;
pub mod health;
pub mod journal;
pub mod mood;
pub mod private_notes;
pub mod profile;
pub mod reflections;
pub mod stats;

// Multipart framing on top of the largest accepted audio file.
const BODY_LIMIT: usize = MAX_AUDIO_BYTES + 64 * 1024;

pub fn router(deployment: DeploymentImpl) -> Router {
    let api = Router::new()
        .merge(health::router(&deployment))
        .merge(auth::router(&deployment))
        .merge(profile::router(&deployment))
        .merge(journal::router(&deployment))
        .merge(mood::router(&deployment))
        .merge(reflections::router(&deployment))
        .merge(calendar::router(&deployment))
        .merge(stats::router(&deployment))
        .merge(access_logs::router(&deployment))
        .merge(private_notes::router(&deployment))
        .merge(audio::router(&deployment))
        .merge(cron::router(&deployment));

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(deployment)
}
