//! Configuration shared by every rentflow service.
//!
//! Each service layers its own settings (database, SMTP, billing knobs) on
//! top of this; only what every deployment needs lives here.

use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Settings common to all rentflow services.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// HTTP listen port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Config {
    /// Reads `configuration.*` if present, then `APP__`-prefixed environment
    /// variables (a `.env` file is honored in development).
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
