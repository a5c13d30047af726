use std::env;
use std::time::Duration;

use crate::error::LmsError;

/// Runtime configuration for one LMS deployment.
#[derive(Clone, Debug)]
pub struct LmsConfig {
    /// Site root, e.g. `https://lms.example.edu` (no trailing slash).
    pub base_url: String,
    /// Bound on every outbound fetch. A timed-out request fails that one
    /// operation and is surfaced; nothing in the engine retries.
    pub request_timeout: Duration,
    /// Substitute duration for lectures whose embed reports zero seconds.
    pub vod_fallback_duration_secs: u64,
    /// Worker-pool bound for batch lecture watching.
    pub watch_concurrency: usize,
}

impl LmsConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            request_timeout: Duration::from_secs(10),
            vod_fallback_duration_secs: 900,
            watch_concurrency: 4,
        }
    }

    pub fn from_env() -> Result<Self, LmsError> {
        dotenvy::dotenv().ok();

        let base_url = env::var("LMS_BASE_URL")
            .map_err(|_| LmsError::Config("LMS_BASE_URL is not set".to_string()))?;
        let mut config = Self::new(base_url);

        if let Ok(secs) = env::var("LMS_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|_| LmsError::Config("LMS_REQUEST_TIMEOUT_SECS must be an integer".to_string()))?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(secs) = env::var("LMS_VOD_FALLBACK_DURATION_SECS") {
            config.vod_fallback_duration_secs = secs
                .parse()
                .map_err(|_| LmsError::Config("LMS_VOD_FALLBACK_DURATION_SECS must be an integer".to_string()))?;
        }
        if let Ok(n) = env::var("LMS_WATCH_CONCURRENCY") {
            config.watch_concurrency = n
                .parse()
                .map_err(|_| LmsError::Config("LMS_WATCH_CONCURRENCY must be an integer".to_string()))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = LmsConfig::new("https://lms.example.edu/");
        assert_eq!(config.base_url, "https://lms.example.edu");
    }
}
