//! Log setup shared by the `segstore` binaries.

use tracing::metadata::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the filter directives, e.g. `SEGSTORE_LOG=segstore=debug`.
pub const LOG_ENV_VAR: &str = "SEGSTORE_LOG";

/// Logs to stderr, filtered by [`LOG_ENV_VAR`], falling back to `default_level` for anything the
/// variable doesn't mention.
pub fn configure(default_level: LevelFilter) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .with(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .with_env_var(LOG_ENV_VAR)
                .from_env_lossy(),
        )
        .init();
}
