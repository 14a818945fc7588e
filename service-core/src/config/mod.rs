use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Default request body limit (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1_048_576;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

impl Config {
    /// Load the common settings, falling back to `default_port` when neither
    /// `APP__PORT` nor `PORT` is set.
    ///
    /// Precedence (lowest first): built-in defaults, `configuration.*` file,
    /// `APP__*` environment variables, plain `PORT`.
    pub fn load(default_port: u16) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .set_default("port", i64::from(default_port))?
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .set_override_option("port", std::env::var("PORT").ok())?
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Settings for an in-process test server on a random port.
    pub fn ephemeral() -> Self {
        Self {
            port: 0,
            log_level: default_log_level(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}
