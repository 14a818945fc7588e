use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Port used when neither `APP__PORT` nor `PORT` is set.
pub const DEFAULT_PORT: u16 = 8080;

/// Hub repository of the default model.
pub const DEFAULT_MODEL_ID: &str = "openai-community/gpt2";

/// Total token budget per candidate, prompt included.
pub const DEFAULT_MAX_LENGTH: usize = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub model: ModelConfig,
    pub sampling: SamplingConfig,
    pub runtime: RuntimeConfig,
}

/// Which generator backs `/generate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Gpt2,
    Mock,
}

impl FromStr for Backend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gpt2" => Ok(Backend::Gpt2),
            "mock" => Ok(Backend::Mock),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "unknown GENERATION_BACKEND '{}', expected 'gpt2' or 'mock'",
                other
            ))),
        }
    }
}

/// Compute device for the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Cuda,
}

impl FromStr for DeviceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(DeviceKind::Cpu),
            "cuda" => Ok(DeviceKind::Cuda),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "unknown GENERATION_DEVICE '{}', expected 'cpu' or 'cuda'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub backend: Backend,
    /// Hub repository id (e.g. openai-community/gpt2)
    pub model_id: String,
    pub revision: String,
    /// Local directory with config.json, tokenizer.json and model.safetensors.
    /// Takes precedence over the hub when set.
    pub local_path: Option<PathBuf>,
    pub device: DeviceKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    pub max_length: usize,
    pub num_return_sequences: usize,
    pub top_k: usize,
    pub temperature: f64,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    pub timeout_secs: u64,
    pub max_concurrency: usize,
}

impl RuntimeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl GenerationConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load(DEFAULT_PORT)?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let config = GenerationConfig {
            common: common_config,
            model: ModelConfig {
                backend: get_env("GENERATION_BACKEND", Some("gpt2"), is_prod)?.parse()?,
                model_id: get_env("GENERATION_MODEL_ID", Some(DEFAULT_MODEL_ID), is_prod)?,
                revision: get_env("GENERATION_MODEL_REVISION", Some("main"), is_prod)?,
                local_path: env::var("GENERATION_MODEL_PATH").ok().map(PathBuf::from),
                device: get_env("GENERATION_DEVICE", Some("cpu"), is_prod)?.parse()?,
            },
            sampling: SamplingConfig {
                max_length: get_parsed(
                    "GENERATION_MAX_LENGTH",
                    &DEFAULT_MAX_LENGTH.to_string(),
                    is_prod,
                )?,
                num_return_sequences: get_parsed("GENERATION_NUM_RETURN_SEQUENCES", "1", is_prod)?,
                top_k: get_parsed("GENERATION_TOP_K", "50", is_prod)?,
                temperature: get_parsed("GENERATION_TEMPERATURE", "1.0", is_prod)?,
                seed: match env::var("GENERATION_SEED") {
                    Ok(raw) => Some(parse_value("GENERATION_SEED", &raw)?),
                    Err(_) => None,
                },
            },
            runtime: RuntimeConfig {
                timeout_secs: get_parsed("GENERATION_TIMEOUT_SECS", "30", is_prod)?,
                max_concurrency: get_parsed("GENERATION_MAX_CONCURRENCY", "1", is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Configuration for tests: mock backend, random port, default sampling.
    pub fn for_tests() -> Self {
        GenerationConfig {
            common: core_config::Config::ephemeral(),
            model: ModelConfig {
                backend: Backend::Mock,
                model_id: "mock".to_string(),
                revision: "main".to_string(),
                local_path: None,
                device: DeviceKind::Cpu,
            },
            sampling: SamplingConfig {
                max_length: DEFAULT_MAX_LENGTH,
                num_return_sequences: 1,
                top_k: 50,
                temperature: 1.0,
                seed: Some(42),
            },
            runtime: RuntimeConfig {
                timeout_secs: 5,
                max_concurrency: 1,
            },
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        let checks = [
            (self.sampling.max_length > 0, "GENERATION_MAX_LENGTH must be > 0"),
            (
                self.sampling.num_return_sequences > 0,
                "GENERATION_NUM_RETURN_SEQUENCES must be > 0",
            ),
            (self.sampling.top_k > 0, "GENERATION_TOP_K must be > 0"),
            (
                self.sampling.temperature.is_finite() && self.sampling.temperature > 0.0,
                "GENERATION_TEMPERATURE must be a finite number > 0",
            ),
            (self.runtime.timeout_secs > 0, "GENERATION_TIMEOUT_SECS must be > 0"),
            (
                self.runtime.max_concurrency > 0,
                "GENERATION_MAX_CONCURRENCY must be > 0",
            ),
        ];

        match checks.iter().find(|(ok, _)| !ok) {
            Some((_, message)) => Err(AppError::ConfigError(anyhow::anyhow!(*message))),
            None => Ok(()),
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn get_parsed<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(default), is_prod)?;
    parse_value(key, &raw)
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_names() {
        assert_eq!("gpt2".parse::<Backend>().unwrap(), Backend::Gpt2);
        assert_eq!("MOCK".parse::<Backend>().unwrap(), Backend::Mock);
        assert!("llama".parse::<Backend>().is_err());
    }

    #[test]
    fn parses_device_names() {
        assert_eq!("cpu".parse::<DeviceKind>().unwrap(), DeviceKind::Cpu);
        assert_eq!("Cuda".parse::<DeviceKind>().unwrap(), DeviceKind::Cuda);
        assert!("tpu".parse::<DeviceKind>().is_err());
    }

    #[test]
    fn rejects_non_numeric_values() {
        let err = parse_value::<usize>("GENERATION_MAX_LENGTH", "fifty").unwrap_err();
        assert!(err.to_string().contains("GENERATION_MAX_LENGTH"));
    }

    #[test]
    fn test_config_uses_default_sampling() {
        let config = GenerationConfig::for_tests();
        assert_eq!(config.sampling.max_length, 50);
        assert_eq!(config.sampling.num_return_sequences, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_invalid() {
        let mut config = GenerationConfig::for_tests();
        config.runtime.max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_finite_temperature_is_invalid() {
        for temperature in [f64::INFINITY, f64::NAN, 0.0] {
            let mut config = GenerationConfig::for_tests();
            config.sampling.temperature = temperature;
            assert!(config.validate().is_err(), "temperature {} accepted", temperature);
        }
    }
}
