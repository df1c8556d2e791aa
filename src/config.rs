use std::{env, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::error::{PlannerError, Result};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_GEMINI_API_VERSION: &str = "v1beta";

/// Connection settings for the Gemini `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_version: String,
    pub base_url: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_version: DEFAULT_GEMINI_API_VERSION.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// The key never ends up in logs.
impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_version", &self.api_version)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Backoff schedule for provider calls made by the AI client.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total provider calls allowed for one dispatch, including the first
    pub max_attempts: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay, including provider `Retry-After` hints
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Randomize each delay to 50-100% of its nominal value
    pub jitter: bool,
    /// Timeout for a single provider call; the request deadline may shorten it
    pub call_timeout: Duration,
    /// How many times a timed-out call is retried
    pub max_timeout_retries: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            multiplier: 2.0,
            jitter: true,
            call_timeout: Duration::from_secs(60),
            max_timeout_retries: 1,
        }
    }
}

impl RetryPolicy {
    /// No waiting between retries. Meant for tests and fakes.
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

/// Orchestrator-level knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisConfig {
    /// Generation attempts (dispatch, parse, reconcile) before giving up
    pub max_attempts: usize,
    /// Allowed budget overrun as a fraction, e.g. 0.10 for 10%
    pub overrun_tolerance: f64,
    /// Feed the previous failure's diagnostics into the next prompt
    pub feedback_on_retry: bool,
    /// Attach identical concurrent requests to one in-flight synthesis
    pub deduplicate: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            overrun_tolerance: 0.10,
            feedback_on_retry: true,
            deduplicate: true,
        }
    }
}

impl SynthesisConfig {
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_overrun_tolerance(mut self, tolerance: f64) -> Self {
        self.overrun_tolerance = tolerance.max(0.0);
        self
    }

    pub fn with_feedback_on_retry(mut self, enabled: bool) -> Self {
        self.feedback_on_retry = enabled;
        self
    }

    pub fn with_deduplication(mut self, enabled: bool) -> Self {
        self.deduplicate = enabled;
        self
    }
}

/// Everything needed to stand up a planner against the live provider.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub gemini: GeminiConfig,
    pub retry: RetryPolicy,
    pub synthesis: SynthesisConfig,
}

impl PlannerConfig {
    pub fn new(gemini: GeminiConfig) -> Self {
        Self {
            gemini,
            retry: RetryPolicy::default(),
            synthesis: SynthesisConfig::default(),
        }
    }

    /// Build from the process environment, loading `.env` first when present.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_api_key(None)
    }

    /// Like [`PlannerConfig::from_env`], with an explicit key taking
    /// precedence over `GEMINI_API_KEY`.
    pub fn from_env_with_api_key(api_key: Option<String>) -> Result<Self> {
        if dotenvy::dotenv().is_ok() {
            info!("Loaded .env file");
        }

        let api_key = match api_key {
            Some(key) => key,
            None => env::var("GEMINI_API_KEY").map_err(|_| {
                PlannerError::Config(
                    "GEMINI_API_KEY environment variable must be set before creating a planner"
                        .to_string(),
                )
            })?,
        };

        let mut gemini = GeminiConfig::new(api_key);
        if let Ok(model) = env::var("GEMINI_MODEL_NAME") {
            gemini = gemini.with_model(model);
        }
        if let Ok(version) = env::var("GEMINI_API_VERSION") {
            gemini = gemini.with_api_version(version);
        }
        if let Ok(base_url) = env::var("GEMINI_BASE_URL") {
            gemini = gemini.with_base_url(base_url);
        }

        let mut config = Self::new(gemini);
        if let Some(attempts) = env_parse::<usize>("NUSATRIP_MAX_ATTEMPTS")? {
            config.synthesis = config.synthesis.with_max_attempts(attempts);
        }
        if let Some(tolerance) = env_parse::<f64>("NUSATRIP_OVERRUN_TOLERANCE")? {
            config.synthesis = config.synthesis.with_overrun_tolerance(tolerance);
        }
        if let Some(secs) = env_parse::<u64>("NUSATRIP_CALL_TIMEOUT_SECS")? {
            config.retry = config.retry.with_call_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Reject unusable settings and warn about suspicious ones.
    pub fn validate(&self) -> Result<()> {
        if self.gemini.api_key.trim().is_empty() {
            return Err(PlannerError::Config("Gemini API key is empty".to_string()));
        }
        if self.gemini.model.trim().is_empty() {
            return Err(PlannerError::Config("Gemini model name is empty".to_string()));
        }
        if self.synthesis.overrun_tolerance > 1.0 {
            warn!(
                tolerance = self.synthesis.overrun_tolerance,
                "Budget overrun tolerance above 100%"
            );
        }
        if self.retry.call_timeout.is_zero() {
            warn!("Provider call timeout is zero; every call will time out");
        }

        info!(
            model = %self.gemini.model,
            api_version = %self.gemini.api_version,
            max_attempts = self.synthesis.max_attempts,
            overrun_tolerance = self.synthesis.overrun_tolerance,
            "Planner configuration validated"
        );
        Ok(())
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| PlannerError::Config(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}
