//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables carry the `SKUS` prefix and
//! nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use skus::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod mobile;
mod payment;
mod server;
mod telemetry;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use mobile::{AppStoreEnvironment, AppStoreSettings, PlayStoreSettings};
pub use payment::{RadomSettings, StripeSettings};
pub use server::ServerConfig;
pub use telemetry::TelemetryConfig;

use serde::Deserialize;

use crate::domain::catalog::Environment;

/// Root application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    /// Selects catalog locations, Radom networks and default checkout URLs
    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub stripe: StripeSettings,

    #[serde(default)]
    pub radom: RadomSettings,

    #[serde(default)]
    pub app_store: AppStoreSettings,

    #[serde(default)]
    pub play_store: PlayStoreSettings,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with the `SKUS` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// - `SKUS__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `SKUS__STRIPE__API_KEY=...` -> `stripe.api_key = ...`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::Environment::default().prefix("SKUS").separator("__"))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.stripe.validate()?;
        self.radom.validate()?;
        self.app_store.validate()?;
        self.play_store.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment.is_production()
    }
}
