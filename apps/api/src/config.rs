//! API server configuration

use std::env;

use anyhow::{bail, Context, Result};
use potluck_shared_config::{CommonConfig, Environment, PartyConfig, DEFAULT_LOG_FILTER};
use tracing_subscriber::EnvFilter;

/// Default HTTP port
const DEFAULT_PORT: u16 = 8080;

/// API server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Common configuration shared with other services
    pub common: CommonConfig,

    /// Server port (default: 8080)
    pub port: u16,

    /// CORS allowed origins (optional)
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// In production mode a wildcard `CORS_ORIGINS` is refused; list the
    /// allowed origins explicitly instead.
    pub fn from_env() -> Result<Self> {
        let common = CommonConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

        let cors_allowed_origins = Self::load_cors_origins(common.environment.is_production())?;

        Ok(Self {
            common,
            port: Self::load_port()?,
            cors_allowed_origins,
        })
    }

    fn load_port() -> Result<u16> {
        match env::var("PORT") {
            Ok(port) if !port.trim().is_empty() => {
                port.trim().parse().context("Invalid PORT value")
            }
            _ => Ok(DEFAULT_PORT),
        }
    }

    /// Load CORS_ORIGINS as a comma separated list
    ///
    /// `*` means "any origin": accepted in development (same as unset),
    /// rejected in production. Runs before tracing is initialised, so it
    /// does not log.
    fn load_cors_origins(is_production: bool) -> Result<Option<Vec<String>>> {
        let Ok(raw) = env::var("CORS_ORIGINS") else {
            return Ok(None);
        };

        let origins: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if origins.iter().any(|o| o == "*") {
            if is_production {
                bail!(
                    "CORS_ORIGINS='*' is not allowed in production. \
                     Please list the allowed origins explicitly."
                );
            }
            return Ok(None);
        }

        Ok(Some(origins))
    }

    /// Tracing filter built from the configured log level
    ///
    /// Directives that do not parse fall back to [`DEFAULT_LOG_FILTER`].
    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.common.log_level)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    }

    // Convenience accessors for common config fields

    /// Get watch-party configuration
    pub fn party(&self) -> &PartyConfig {
        &self.common.party
    }

    /// Get environment mode
    pub fn environment(&self) -> Environment {
        self.common.environment
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.common.environment.is_production()
    }
}
