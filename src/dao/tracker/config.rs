use super::error::{TrackerError, TrackerResult};

/// Runtime configuration describing how to reach the issue tracker API.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Tracker base URL, without a trailing slash.
    pub base_url: String,
    /// Basic-auth user (account email), if the tracker requires it.
    pub email: Option<String>,
    /// API token paired with `email`.
    pub api_token: Option<String>,
}

impl TrackerConfig {
    /// Construct a configuration from an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            email: None,
            api_token: None,
        }
    }

    /// Attach basic-auth credentials to the configuration.
    pub fn with_credentials(
        mut self,
        email: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        self.email = Some(email.into());
        self.api_token = Some(api_token.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> TrackerResult<Self> {
        let base_url =
            std::env::var("TRACKER_BASE_URL").map_err(|_| TrackerError::MissingEnvVar {
                var: "TRACKER_BASE_URL",
            })?;

        let mut config = Self::new(base_url);

        if let (Some(email), Some(token)) = (
            std::env::var("TRACKER_EMAIL").ok(),
            std::env::var("TRACKER_API_TOKEN").ok(),
        ) {
            config = config.with_credentials(email, token);
        }

        Ok(config)
    }
}
