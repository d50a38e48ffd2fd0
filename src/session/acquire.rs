//! Challenge request with bounded retry.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::retry::{RetryPolicy, retry_with_delay};

/// Puzzle parameters from the challenge endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProofOfWorkChallenge {
    pub seed: String,
    pub difficulty: String,
}

/// Body of a successful challenge response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChallengeGrant {
    pub proofofwork: ProofOfWorkChallenge,
    pub token: String,
}

/// An anonymous session good for exactly one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub device_id: String,
    pub seed: String,
    pub difficulty: String,
    pub challenge_token: String,
}

impl Session {
    pub fn from_grant(device_id: String, grant: ChallengeGrant) -> Self {
        Self {
            device_id,
            seed: grant.proofofwork.seed,
            difficulty: grant.proofofwork.difficulty,
            challenge_token: grant.token,
        }
    }
}

/// One round trip to the challenge endpoint.
///
/// This abstraction allows mocking the network in retry tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChallengeFetcher: Send + Sync {
    /// Request a challenge while presenting `device_id`.
    async fn fetch(&self, device_id: &str) -> Result<ChallengeGrant, SessionError>;
}

/// Fetcher that posts to the real challenge endpoint.
pub struct HttpChallengeFetcher {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpChallengeFetcher {
    pub fn new(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            url: config.challenge_url(),
            timeout: config.request_timeout,
        }
    }
}

#[async_trait]
impl ChallengeFetcher for HttpChallengeFetcher {
    async fn fetch(&self, device_id: &str) -> Result<ChallengeGrant, SessionError> {
        let response = self
            .http
            .post(&self.url)
            .header("oai-device-id", device_id)
            .json(&serde_json::json!({}))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(SessionError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(SessionError::Transport)?;

        if !status.is_success() {
            return Err(SessionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| SessionError::InvalidChallenge(e.to_string()))
    }
}

/// Acquires sessions, retrying with a fresh device id each time.
pub struct SessionAcquirer<F = HttpChallengeFetcher> {
    fetcher: F,
    policy: RetryPolicy,
}

impl SessionAcquirer<HttpChallengeFetcher> {
    /// Acquirer for the configured backend.
    pub fn from_config(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self::new(HttpChallengeFetcher::new(http, config), config.session_policy())
    }
}

impl<F: ChallengeFetcher> SessionAcquirer<F> {
    pub fn new(fetcher: F, policy: RetryPolicy) -> Self {
        Self { fetcher, policy }
    }

    /// Acquire a session.
    ///
    /// Fails with `SessionError::RetriesExhausted` once every attempt failed.
    pub async fn acquire(&self) -> Result<Session, SessionError> {
        retry_with_delay(
            self.policy,
            |attempt| async move {
                let device_id = Uuid::new_v4().to_string();
                debug!("Requesting challenge (attempt {}) as device {}", attempt, device_id);

                let fetched = self.fetcher.fetch(&device_id).await;
                fetched.map(|grant| Session::from_grant(device_id, grant))
            },
            |attempts, last| SessionError::RetriesExhausted {
                attempts,
                last: Box::new(last),
            },
        )
        .await
    }
}
