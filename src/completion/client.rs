//! End-to-end completion: session, proof of work, streamed conversation.

use std::sync::Arc;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{CompletionError, ConfigError};
use crate::pow::{ProofOfWorkSolver, ProofToken};
use crate::session::{Session, SessionAcquirer};
use crate::stream::decode_messages;

use super::aggregator::ResponseAggregator;
use super::request::ConversationRequest;
use super::tokenizer::{CharEstimateTokenizer, Tokenizer};
use super::types::{ChatMessage, CompletionResult};

/// Client for the anonymous conversation backend.
///
/// Each call to [`ChatClient::complete`] acquires its own session and owns
/// all of its state, so one client can serve concurrent completions.
pub struct ChatClient {
    http: reqwest::Client,
    config: ClientConfig,
    acquirer: SessionAcquirer,
    solver: ProofOfWorkSolver,
    tokenizer: Arc<dyn Tokenizer>,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let http = config.build_http_client()?;
        let acquirer = SessionAcquirer::from_config(http.clone(), &config);

        Ok(Self {
            http,
            config,
            acquirer,
            solver: ProofOfWorkSolver::new(),
            tokenizer: Arc::new(CharEstimateTokenizer),
        })
    }

    /// Replace the default token estimator.
    pub fn with_tokenizer(mut self, tokenizer: impl Tokenizer + 'static) -> Self {
        self.tokenizer = Arc::new(tokenizer);
        self
    }

    pub fn with_solver(mut self, solver: ProofOfWorkSolver) -> Self {
        self.solver = solver;
        self
    }

    /// Run one completion for `messages`.
    ///
    /// Fails with [`CompletionError::Session`] if no session could be
    /// acquired; no conversation request is sent in that case.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
    ) -> Result<CompletionResult, CompletionError> {
        let prompt_tokens = self.count_prompt(messages);
        let session = self.acquirer.acquire().await?;
        self.run(messages, session, prompt_tokens).await
    }

    /// Run one completion on a session the caller already holds.
    pub async fn complete_with_session(
        &self,
        messages: &[ChatMessage],
        session: Session,
    ) -> Result<CompletionResult, CompletionError> {
        let prompt_tokens = self.count_prompt(messages);
        self.run(messages, session, prompt_tokens).await
    }

    fn count_prompt(&self, messages: &[ChatMessage]) -> usize {
        messages.iter().map(|m| self.tokenizer.count(&m.content)).sum()
    }

    async fn run(
        &self,
        messages: &[ChatMessage],
        session: Session,
        prompt_tokens: usize,
    ) -> Result<CompletionResult, CompletionError> {
        let proof = self.solve(&session).await?;
        if !proof.is_solved() {
            warn!("Sending fallback proof token; the backend may reject it");
        }

        let body = serde_json::to_vec(&ConversationRequest::new(messages))
            .map_err(CompletionError::Serialization)?;

        let request = self
            .http
            .post(self.config.conversation_url())
            .header("oai-device-id", &session.device_id)
            .header(
                "openai-sentinel-chat-requirements-token",
                &session.challenge_token,
            )
            .header("openai-sentinel-proof-token", proof.as_str())
            .body(body);

        let created = Utc::now();
        let timeout_secs = self.config.request_timeout.as_secs();
        let response = timeout(self.config.request_timeout, request.send())
            .await
            .map_err(|_| CompletionError::Timeout(timeout_secs))?
            .map_err(CompletionError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Conversation stream opened for device {}", session.device_id);

        let mut aggregator = ResponseAggregator::new(messages, self.tokenizer.as_ref());
        aggregator
            .consume(decode_messages(response.bytes_stream()))
            .await
            .map_err(CompletionError::Transport)?;

        Ok(CompletionResult::from_aggregate(
            aggregator.finish(),
            prompt_tokens,
            created,
        ))
    }

    /// Solve the session puzzle on the blocking pool.
    async fn solve(&self, session: &Session) -> Result<ProofToken, CompletionError> {
        let solver = self.solver;
        let seed = session.seed.clone();
        let difficulty = session.difficulty.clone();
        let identity = self.config.user_agent.clone();
        let rng_seed = self.config.rng_seed;

        tokio::task::spawn_blocking(move || {
            let mut rng = match rng_seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };
            solver.solve_with(&seed, &difficulty, &identity, &mut rng, Utc::now())
        })
        .await
        .map_err(|e| CompletionError::Solver(e.to_string()))
    }
}
