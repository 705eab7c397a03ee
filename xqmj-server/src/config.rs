//! Startup configuration (C9, §4.8): environment-driven, validated once
//! before the socket is bound. Misconfiguration aborts the process rather
//! than surfacing as a per-connection error.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tracing::Level;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub log_directory: Option<PathBuf>,
    pub log_level: Level,
}

impl ServerConfig {
    /// Loads a `.env` file if present (silently ignored if absent, the way
    /// `dotenvy` is conventionally used), then reads and validates the
    /// documented environment variables.
    pub fn from_env() -> Result<Self> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                return Err(anyhow!(err)).context("failed to load .env file");
            }
        }

        let port = match std::env::var("XQMJ_PORT") {
            Ok(raw) => raw.parse().context("XQMJ_PORT is not a valid port number")?,
            Err(_) => 3001,
        };

        let log_directory = std::env::var("XQMJ_LOG_DIR").ok().map(PathBuf::from);

        let log_level = match std::env::var("XQMJ_LOG_LEVEL") {
            Ok(raw) => parse_level(&raw)?,
            Err(_) => Level::INFO,
        };

        Ok(Self {
            port,
            log_directory,
            log_level,
        })
    }
}

fn parse_level(raw: &str) -> Result<Level> {
    match raw.to_ascii_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        other => Err(anyhow!("XQMJ_LOG_LEVEL must be one of error/warn/info/debug, got {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_accepts_documented_values() {
        assert_eq!(Level::ERROR, parse_level("Error").unwrap());
        assert_eq!(Level::DEBUG, parse_level("debug").unwrap());
    }

    #[test]
    fn parse_level_rejects_unknown_values() {
        assert!(parse_level("verbose").is_err());
    }
}
