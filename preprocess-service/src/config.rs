use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;

/// Port used when neither `APP__PORT` nor `PORT` is set.
pub const DEFAULT_PORT: u16 = 5001;

#[derive(Debug, Clone, Deserialize)]
pub struct PreprocessConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
}

impl PreprocessConfig {
    pub fn load() -> Result<Self, AppError> {
        Ok(PreprocessConfig {
            common: core_config::Config::load(DEFAULT_PORT)?,
        })
    }

    /// Configuration for an in-process server on a random port.
    pub fn ephemeral() -> Self {
        PreprocessConfig {
            common: core_config::Config::ephemeral(),
        }
    }
}
