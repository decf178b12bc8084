//! Logging setup utilities for the classroom coordinator.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// The log level can be overridden using the `RUST_LOG` environment variable.
/// Hyphens in the application name are normalized to underscores so the
/// default directive matches the tracing target of the calling crate, which
/// this function cannot see from here.
///
/// # Arguments
///
/// * `app_name` - The crate/binary name (e.g., "terakoya-server")
/// * `default_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use terakoya_shared::logger::setup_logger;
///
/// setup_logger("terakoya-server", "debug");
/// ```
pub fn setup_logger(app_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(app_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn default_directive(app_name: &str, default_log_level: &str) -> String {
    format!("{}={}", app_name.replace('-', "_"), default_log_level)
}
