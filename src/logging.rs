//! Process-wide log setup: console plus an append-only log file.

use std::fs::OpenOptions;

use anyhow::Context;
use tracing::dispatcher;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber.
///
/// Safe to call more than once; once a global subscriber is in place further
/// calls do nothing.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    if dispatcher::has_been_set() {
        return Ok(());
    }

    if let Some(dir) = config.file.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .with_context(|| format!("failed to open log file {}", config.file.display()))?;

    let filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("invalid log level {:?}", config.level))?;

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(
            fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_target(true),
        )
        .try_init();

    match installed {
        Ok(()) => Ok(()),
        // Lost a race with a concurrent caller
        Err(_) if dispatcher::has_been_set() => Ok(()),
        Err(e) => Err(e).context("failed to install global log subscriber"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let dir = std::env::temp_dir().join(format!("moodmirror-log-{}", std::process::id()));
        let config = LoggingConfig {
            file: dir.join("emotion_detector.log"),
            level: "info".to_string(),
        };

        init(&config).unwrap();
        init(&config).unwrap();

        tracing::info!(target: "moodmirror::logging", "written to file");

        let contents = std::fs::read_to_string(&config.file).unwrap();
        assert_eq!(contents.matches("written to file").count(), 1);
        assert!(contents.contains("INFO"));
        assert!(!contents.contains('\u{1b}'));

        let _ = std::fs::remove_dir_all(dir);
    }
}
