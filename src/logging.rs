use std::path::Path;
use std::sync::Once;

use anyhow::{Result, anyhow};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE: &str = "beacon.log";

/// Install stdout and daily-rotated file logging. Only the first call has an effect.
///
/// `RUST_LOG` takes precedence over `default_level`.
pub fn init(logs_dir: &Path, default_level: &str) -> Result<()> {
    static INIT: Once = Once::new();
    let mut result = Ok(());

    INIT.call_once(|| {
        if let Err(e) = std::fs::create_dir_all(logs_dir) {
            result = Err(anyhow!("Failed to create logs directory {}: {}", logs_dir.display(), e));
            return;
        }

        let file_appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, LOG_FILE);

        if let Err(e) = tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .with(fmt::layer().with_target(true).with_ansi(false).with_writer(file_appender))
            .try_init()
        {
            result = Err(anyhow!("Failed to initialize tracing: {}", e));
        }
    });

    result
}
