use std::{env, time::Duration};

use crate::error::{PlannerError, Result};

pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_PLACES_BASE_URL: &str = "https://places.googleapis.com/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-4.1-mini";

/// Runtime settings shared by the pipeline and the modification engine.
#[derive(Clone, Debug)]
pub struct PlannerConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub places_api_key: String,
    pub places_base_url: String,
    /// Enables ticket price lookup when present
    pub jina_api_key: Option<String>,
    /// Upper bound for a single discovery or price lookup call
    pub call_timeout: Duration,
    /// Upper bound for a single completion call
    pub completion_timeout: Duration,
    pub price_lookup_concurrency: usize,
    pub min_theme_relevance: f64,
}

impl PlannerConfig {
    pub fn new(api_key: impl Into<String>, places_api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_COMPLETION_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            max_tokens: Some(2000),
            places_api_key: places_api_key.into(),
            places_base_url: DEFAULT_PLACES_BASE_URL.to_string(),
            jina_api_key: None,
            call_timeout: Duration::from_secs(30),
            completion_timeout: Duration::from_secs(60),
            price_lookup_concurrency: 5,
            min_theme_relevance: 0.3,
        }
    }

    /// Build the configuration from environment variables.
    ///
    /// `OPENAI_API_KEY` is required, as is one of `GOOGLE_PLACES_API_KEY` / `GOOGLE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| PlannerError::Config("Missing OPENAI_API_KEY env var".to_string()))?;

        let places_api_key = env::var("GOOGLE_PLACES_API_KEY")
            .or_else(|_| env::var("GOOGLE_API_KEY"))
            .map_err(|_| {
                PlannerError::Config(
                    "Missing GOOGLE_PLACES_API_KEY (or GOOGLE_API_KEY) env var".to_string(),
                )
            })?;

        let mut config = Self::new(api_key, places_api_key);

        if let Some(base_url) = env::var("OPENAI_BASE_URL")
            .ok()
            .or_else(|| env::var("OPENROUTER_BASE_URL").ok())
        {
            config.base_url = base_url;
        }

        if let Ok(model) = env::var("MODEL") {
            config.model = model;
        }

        if let Ok(places_base_url) = env::var("GOOGLE_PLACES_BASE_URL") {
            config.places_base_url = places_base_url;
        }

        config.jina_api_key = env::var("JINA_API_KEY").ok().filter(|key| !key.is_empty());

        if let Ok(raw) = env::var("PLANNER_CALL_TIMEOUT_SECS") {
            let secs: u64 = raw.parse().map_err(|_| {
                PlannerError::Config(format!("PLANNER_CALL_TIMEOUT_SECS is not a number: {raw}"))
            })?;
            config.call_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_places_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.places_base_url = base_url.into();
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub fn with_price_lookup_concurrency(mut self, concurrency: usize) -> Self {
        self.price_lookup_concurrency = concurrency.max(1);
        self
    }
}
