use sentry_tracing::EventFilter;
use tracing::Level;

/// Initialises the sentry client when a DSN is configured.
///
/// The returned guard flushes pending events on drop and must be held for
/// the lifetime of the process.
pub fn init_once(dsn: Option<&str>) -> Option<sentry::ClientInitGuard> {
    let dsn = dsn.filter(|d| !d.trim().is_empty())?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(
                if cfg!(debug_assertions) {
                    "dev"
                } else {
                    "production"
                }
                .into(),
            ),
            ..Default::default()
        },
    ));
    Some(guard)
}

/// Forwards `error` events to sentry and records everything from `info`
/// upwards as breadcrumbs.
pub fn sentry_layer<S>() -> sentry_tracing::SentryLayer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    sentry_tracing::layer().event_filter(|metadata| match *metadata.level() {
        Level::ERROR => EventFilter::Event,
        Level::WARN | Level::INFO => EventFilter::Breadcrumb,
        _ => EventFilter::Ignore,
    })
}
