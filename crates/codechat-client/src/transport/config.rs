use std::time::Duration;

use crate::errors::ChatError;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Configuration for the HTTP client of the analysis service.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the service; paths are appended to it.
    pub base_url: String,
    /// Connect timeout for every request, and total timeout for the
    /// non-streaming collaborator requests. Answer streams are never cut off.
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientConfig {
    /// Creates a config for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
            user_agent: concat!("codechat/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Builds a config from `CODECHAT_API_URL` and `CODECHAT_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ChatError> {
        let base_url = std::env::var("CODECHAT_API_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(base_url);
        if let Ok(raw) = std::env::var("CODECHAT_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ChatError::Config(format!("CODECHAT_TIMEOUT_SECS must be whole seconds, got `{raw}`"))
            })?;
            config = config.timeout(Duration::from_secs(secs));
        }
        config.validate()?;
        Ok(config)
    }

    /// Overrides the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ChatError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(ChatError::Config("base_url must not be empty".into()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ChatError::Config(format!(
                "base_url must start with http:// or https://, got `{base}`"
            )));
        }
        Ok(())
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
