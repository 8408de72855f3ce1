//! Logging utilities for cql_sync
//!
//! This module provides logging setup and configuration.

use std::fs::File;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging based on configuration
pub fn init_logging(config: &Option<LoggingConfig>) -> Result<()> {
    let config = match config {
        Some(cfg) => cfg,
        None => return Ok(()),
    };

    let directive: Directive = format!("cql_sync={}", parse_level(&config.level))
        .parse()
        .map_err(|e| Error::ConfigError(format!("Invalid log level: {}", e)))?;
    let env_filter = EnvFilter::from_default_env().add_directive(directive);
    let json = config.format.eq_ignore_ascii_case("json");

    let installed = if let Some(file_path) = &config.file {
        if let Some(parent) = Path::new(file_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(file_path)?;

        if json {
            let subscriber = fmt::Subscriber::builder()
                .json()
                .with_env_filter(env_filter)
                .with_writer(file)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        } else {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .with_writer(file)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    } else if config.stdout {
        if json {
            let subscriber = fmt::Subscriber::builder().json().with_env_filter(env_filter).finish();
            tracing::subscriber::set_global_default(subscriber)
        } else {
            let subscriber = fmt::Subscriber::builder().with_env_filter(env_filter).finish();
            tracing::subscriber::set_global_default(subscriber)
        }
    } else {
        return Ok(());
    };

    installed.map_err(|e| Error::Unknown(e.to_string()))
}
