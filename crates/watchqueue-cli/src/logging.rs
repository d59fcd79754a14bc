use anyhow::Result;
use std::io::{self, IsTerminal};
use std::path::Path;
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
};
use tracing_subscriber::fmt::{self, time::ChronoUtc};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use watch_queue_config::LoggingConfig;

pub fn init_logging(verbose_level: u8, quiet: bool, config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::new(filter_directive(verbose_level, quiet, config));

    // RUST_LOG_JSON wins over the config file
    let json = std::env::var("RUST_LOG_JSON")
        .map(|v| v == "true")
        .unwrap_or_else(|_| config.json || !io::stdout().is_terminal());

    let registry = Registry::default().with(filter);

    match &config.file {
        Some(log_path) => {
            let file_appender = rolling_appender(log_path)?;
            if json {
                let json_layer = fmt::layer()
                    .json()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(file_appender);

                registry.with(json_layer).init();
            } else {
                let fmt_layer = fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(file_appender);

                registry.with(fmt_layer).init();
            }
        }
        None => {
            if json {
                let json_layer = fmt::layer()
                    .json()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(io::stderr);

                registry.with(json_layer).init();
            } else {
                let fmt_layer = fmt::layer()
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(io::stderr);

                registry.with(fmt_layer).init();
            }
        }
    }

    Ok(())
}

/// quiet = errors only, -v = debug, -vv = trace, otherwise RUST_LOG or the
/// configured level
fn filter_directive(verbose_level: u8, quiet: bool, config: &LoggingConfig) -> String {
    if quiet {
        return "error".to_string();
    }
    match verbose_level {
        0 => std::env::var("RUST_LOG").unwrap_or_else(|_| config.level.clone()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Daily rotated log file: `watchqueue.log` rotates to `watchqueue.2026-01-17`
fn rolling_appender(log_path: &Path) -> Result<RollingFileAppender> {
    let log_dir = log_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Log file path has no parent directory"))?;
    std::fs::create_dir_all(log_dir)?;

    let log_filename = log_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid log filename"))?;
    let log_prefix = log_filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(log_filename);

    Ok(RollingFileAppender::new(Rotation::DAILY, log_dir, log_prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            json: false,
            file: None,
        }
    }

    #[test]
    fn test_quiet_and_verbose_override_config() {
        assert_eq!(filter_directive(0, true, &config("info")), "error");
        assert_eq!(filter_directive(1, false, &config("warn")), "debug");
        assert_eq!(filter_directive(3, false, &config("warn")), "trace");
    }

    #[test]
    fn test_appender_creates_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("watchqueue.log");
        rolling_appender(&path).unwrap();
        assert!(dir.path().join("logs").is_dir());
    }
}
