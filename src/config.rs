//! Client configuration and the browser-imitating HTTP client.

use std::env;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// Default backend origin.
pub const DEFAULT_BASE_URL: &str = "https://chat.openai.com";

/// Browser user agent sent on every request and hashed into the proof of work.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

const DEFAULT_SESSION_ATTEMPTS: u32 = 5;
const DEFAULT_SESSION_RETRY_DELAY_MS: u64 = 500;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Environment variable overriding the backend origin.
pub const BASE_URL_ENV_VAR: &str = "ANONCHAT_BASE_URL";

/// Environment variable overriding the request timeout (seconds).
pub const TIMEOUT_ENV_VAR: &str = "ANONCHAT_TIMEOUT";

/// Environment variable overriding the number of session attempts.
pub const SESSION_RETRIES_ENV_VAR: &str = "ANONCHAT_SESSION_RETRIES";

/// Settings shared by session acquisition and the conversation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Origin of the backend, without a trailing slash.
    pub base_url: String,
    /// User agent header; also the client identity hashed into the proof.
    pub user_agent: String,
    pub session_attempts: u32,
    pub session_retry_delay: Duration,
    /// Timeout for the challenge request and for establishing the stream.
    pub request_timeout: Duration,
    /// Fixed seed for puzzle randomness. `None` draws from OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            session_attempts: DEFAULT_SESSION_ATTEMPTS,
            session_retry_delay: Duration::from_millis(DEFAULT_SESSION_RETRY_DELAY_MS),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            rng_seed: None,
        }
    }
}

impl ClientConfig {
    /// Defaults with overrides from `ANONCHAT_*` environment variables.
    ///
    /// Invalid values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var(BASE_URL_ENV_VAR)
            && !url.trim().is_empty()
        {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }

        if let Some(secs) = read_u64(TIMEOUT_ENV_VAR) {
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(attempts) = read_u64(SESSION_RETRIES_ENV_VAR) {
            match u32::try_from(attempts) {
                Ok(n) if n > 0 => config.session_attempts = n,
                _ => warn!(
                    "Invalid {} value '{}', using default {}",
                    SESSION_RETRIES_ENV_VAR, attempts, DEFAULT_SESSION_ATTEMPTS
                ),
            }
        }

        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn session_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.session_attempts, self.session_retry_delay)
    }

    pub fn challenge_url(&self) -> String {
        format!("{}/backend-anon/sentinel/chat-requirements", self.base_url)
    }

    pub fn conversation_url(&self) -> String {
        format!("{}/backend-anon/conversation", self.base_url)
    }

    /// Build the HTTP client carrying the browser default headers.
    pub fn build_http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .default_headers(self.browser_headers()?)
            .connect_timeout(self.request_timeout)
            .no_proxy()
            .build()
            .map_err(ConfigError::Http)
    }

    fn browser_headers(&self) -> Result<HeaderMap, ConfigError> {
        let pairs: [(&'static str, &str); 15] = [
            ("accept", "*/*"),
            ("accept-language", "en-US,en;q=0.9"),
            ("cache-control", "no-cache"),
            ("content-type", "application/json"),
            ("oai-language", "en-US"),
            ("origin", &self.base_url),
            ("pragma", "no-cache"),
            ("referer", &self.base_url),
            (
                "sec-ch-ua",
                r#""Google Chrome";v="123", "Not:A-Brand";v="8", "Chromium";v="123""#,
            ),
            ("sec-ch-ua-mobile", "?0"),
            ("sec-ch-ua-platform", r#""Windows""#),
            ("sec-fetch-dest", "empty"),
            ("sec-fetch-mode", "cors"),
            ("sec-fetch-site", "same-origin"),
            ("user-agent", &self.user_agent),
        ];

        let mut headers = HeaderMap::with_capacity(pairs.len());
        for (name, value) in pairs {
            let value = HeaderValue::from_str(value)
                .map_err(|_| ConfigError::InvalidHeader(format!("{name}: {value}")))?;
            headers.insert(HeaderName::from_static(name), value);
        }
        Ok(headers)
    }
}

/// Read a non-negative integer from the environment.
///
/// Logs a warning if the variable is set but is not a valid number.
fn read_u64(var: &str) -> Option<u64> {
    match env::var(var) {
        Ok(v) if !v.is_empty() => match v.trim().parse::<u64>() {
            Ok(n) => Some(n),
            Err(_) => {
                warn!("Invalid {} value '{}', using default", var, v);
                None
            }
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn all_unset<F: FnOnce()>(f: F) {
        temp_env::with_vars_unset(
            [BASE_URL_ENV_VAR, TIMEOUT_ENV_VAR, SESSION_RETRIES_ENV_VAR],
            f,
        );
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        all_unset(|| {
            assert_eq!(ClientConfig::from_env(), ClientConfig::default());
        });
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        temp_env::with_vars(
            [
                (BASE_URL_ENV_VAR, Some("http://127.0.0.1:9000/")),
                (TIMEOUT_ENV_VAR, Some("30")),
                (SESSION_RETRIES_ENV_VAR, Some("2")),
            ],
            || {
                let config = ClientConfig::from_env();
                assert_eq!(config.base_url, "http://127.0.0.1:9000");
                assert_eq!(config.request_timeout, Duration::from_secs(30));
                assert_eq!(config.session_attempts, 2);
            },
        );
    }

    #[test]
    #[serial]
    fn test_invalid_env_values_use_defaults() {
        temp_env::with_vars(
            [
                (BASE_URL_ENV_VAR, None),
                (TIMEOUT_ENV_VAR, Some("soon")),
                (SESSION_RETRIES_ENV_VAR, Some("0")),
            ],
            || {
                let config = ClientConfig::from_env();
                assert_eq!(config.request_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
                assert_eq!(config.session_attempts, DEFAULT_SESSION_ATTEMPTS);
            },
        );
    }

    #[test]
    fn test_endpoint_urls() {
        let config = ClientConfig::default().with_base_url("http://localhost:1234/");
        assert_eq!(
            config.challenge_url(),
            "http://localhost:1234/backend-anon/sentinel/chat-requirements"
        );
        assert_eq!(
            config.conversation_url(),
            "http://localhost:1234/backend-anon/conversation"
        );
    }

    #[test]
    fn test_browser_headers_include_origin_and_agent() {
        let config = ClientConfig::default();
        let headers = config.browser_headers().unwrap();
        assert_eq!(headers["origin"], DEFAULT_BASE_URL);
        assert_eq!(headers["user-agent"], DEFAULT_USER_AGENT);
        assert_eq!(headers["oai-language"], "en-US");
    }

    #[test]
    fn test_session_policy_uses_config() {
        let config = ClientConfig::default();
        let policy = config.session_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, Duration::from_millis(500));
    }
}
