use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

const WORKSPACE_CRATES: &[&str] = &["server", "services", "db", "utils"];

/// Builds the default filter directive, e.g. `warn,server=info,services=info,...`.
pub fn default_filter(level: &str) -> String {
    let mut directive = String::from("warn");
    for krate in WORKSPACE_CRATES {
        directive.push_str(&format!(",{krate}={level}"));
    }
    directive.push_str(&format!(",tower_http={level}"));
    directive
}

/// Installs the global subscriber: fmt output filtered by `RUST_LOG` (or
/// `default_level` for the workspace crates) plus the sentry layer.
pub fn init_tracing(default_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(default_level)));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .with(crate::sentry::sentry_layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_every_workspace_crate() {
        let filter = default_filter("debug");
        assert!(filter.starts_with("warn,"));
        for krate in WORKSPACE_CRATES {
            assert!(filter.contains(&format!("{krate}=debug")));
        }
    }
}
