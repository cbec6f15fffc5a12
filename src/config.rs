use crate::query::DEFAULT_MODEL;
use camino::Utf8PathBuf;
use std::time::Duration;
use thiserror::Error;

const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    MissingVar(&'static str),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Settings for a recipe finder session.
#[derive(Debug, Clone)]
pub struct FinderConfig {
    pub api_key: String,
    pub model: String,
    pub favorites_path: Utf8PathBuf,
    pub min_query_length: usize,
    pub request_timeout: Duration,
    /// Sampling temperature; the model default when unset
    pub temperature: Option<f32>,
}

impl FinderConfig {
    pub fn new(api_key: impl Into<String>, favorites_path: impl Into<Utf8PathBuf>) -> Self {
        FinderConfig {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_owned(),
            favorites_path: favorites_path.into(),
            min_query_length: 3,
            request_timeout: Duration::from_secs(30),
            temperature: None,
        }
    }

    /// Reads the configuration from the environment.
    ///
    /// `GEMINI_API_KEY` is required. `GEMINI_MODEL`, `GEMINI_TEMPERATURE`,
    /// `RECIPE_FAVORITES_PATH`, `RECIPE_MIN_QUERY_LENGTH` and
    /// `RECIPE_REQUEST_TIMEOUT_SECS` override the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| ConfigError::MissingVar(API_KEY_ENV))?;
        let favorites_path =
            std::env::var("RECIPE_FAVORITES_PATH").unwrap_or_else(|_| "favorites.json".into());

        let mut config = Self::new(api_key, favorites_path);
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        if let Some(length) = parse_var("RECIPE_MIN_QUERY_LENGTH")? {
            config.min_query_length = length;
        }
        if let Some(secs) = parse_var("RECIPE_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        config.temperature = parse_var("GEMINI_TEMPERATURE")?;
        Ok(config)
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_min_query_length(mut self, length: usize) -> Self {
        self.min_query_length = length;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(None),
    }
}
