//! Logging Infrastructure
//!
//! Structured logging setup with optional daily-rolling file output.

use crate::core::Config;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize the logger at `info`
pub fn init_logger() {
    init_logger_with_file(None, None);
}

/// Initialize the logger from [`Config`]
pub fn init_logger_from_config(config: &Config) {
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());
}

/// Initialize the logger with optional file output
///
/// `RUST_LOG` wins over `log_level` when set. Calling this twice is harmless:
/// the second global subscriber is rejected and ignored.
pub fn init_logger_with_file(log_level: Option<&str>, log_dir: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(false);

    // Add file output if log_dir is provided
    if let Some(dir) = log_dir {
        let log_path = Path::new(dir);
        if log_path.exists()
            && let Some(dir_str) = log_path.to_str()
        {
            let file_appender = tracing_appender::rolling::daily(dir_str, "order-engine");
            let _ = subscriber.with_writer(file_appender).try_init();
            return;
        }
    }

    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_log_dir_falls_back_to_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-created");
        init_logger_with_file(Some("debug"), missing.to_str());
        assert!(!missing.exists());
        tracing::info!("logger initialized without file output");
    }
}
