//! SHA3-512 proof-of-work solver.
//!
//! The backend hands out a `seed` and a hex `difficulty`. A browser proves
//! work by finding a base64 payload whose `SHA3-512(seed + payload)` hex
//! digest starts with a prefix that is lexicographically no greater than
//! `difficulty`. The payload is a small JSON array fingerprinting the client.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use sha3::{Digest, Sha3_512};
use tracing::{debug, warn};

/// Maximum number of counter values tried before giving up.
pub const MAX_ATTEMPTS: u32 = 100_000;

/// Prefix of a token built from a payload that met the difficulty.
pub const SOLVED_PREFIX: &str = "gAAAAAB";

/// Prefix of the token sent when no payload met the difficulty.
pub const FALLBACK_PREFIX: &str = "gAAAAABwQ8Lk5FbGpA2NcR9dShT6gYjU7VxZ4D";

const CORE_COUNTS: [u32; 4] = [8, 12, 16, 24];
const SCREEN_SIZES: [u32; 3] = [3000, 4000, 6000];
const MAGIC: u64 = 4_294_705_152;
const CLOCK_SKEW_HOURS: i64 = 8;

/// Token presented in the `openai-sentinel-proof-token` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofToken {
    /// A payload met the difficulty bound.
    Solved(String),
    /// No payload met the bound; derived from the seed alone.
    Fallback(String),
}

impl ProofToken {
    pub fn as_str(&self) -> &str {
        match self {
            ProofToken::Solved(token) | ProofToken::Fallback(token) => token,
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, ProofToken::Solved(_))
    }

    pub fn into_string(self) -> String {
        match self {
            ProofToken::Solved(token) | ProofToken::Fallback(token) => token,
        }
    }
}

impl fmt::Display for ProofToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-solve client fingerprint: drawn once, reused for every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Core count plus screen size.
    pub hardware: u32,
    /// Skewed HTTP-date with a fabricated timezone label.
    pub timestamp: String,
}

impl Fingerprint {
    /// Pick hardware values from the candidate sets and render `now - 8h`.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> Self {
        let core = CORE_COUNTS.choose(rng).copied().unwrap_or(CORE_COUNTS[0]);
        let screen = SCREEN_SIZES.choose(rng).copied().unwrap_or(SCREEN_SIZES[0]);
        let skewed = now - Duration::hours(CLOCK_SKEW_HOURS);

        Self {
            hardware: core + screen,
            timestamp: skewed
                .format("%a, %d %b %Y %H:%M:%S GMT-0500 (Eastern Time)")
                .to_string(),
        }
    }

    /// Base64 of the compact JSON payload for one attempt.
    fn encode(&self, attempt: u32, client_identity: &str) -> String {
        let payload = serde_json::json!([
            self.hardware,
            self.timestamp,
            MAGIC,
            attempt,
            client_identity
        ]);
        STANDARD.encode(payload.to_string())
    }
}

/// Whether a hex digest satisfies `difficulty`.
///
/// Compares the first `difficulty.len() / 2` characters of the digest with
/// the whole difficulty string as plain strings, not as numbers.
pub fn meets_difficulty(hash_hex: &str, difficulty: &str) -> bool {
    let prefix_len = (difficulty.len() / 2).min(hash_hex.len());
    &hash_hex[..prefix_len] <= difficulty
}

/// Deterministic token used when the search is exhausted.
pub fn fallback_token(seed: &str) -> String {
    format!("{}{}", FALLBACK_PREFIX, STANDARD.encode(format!("\"{seed}\"")))
}

/// Searches counter values for a payload meeting the difficulty.
#[derive(Debug, Clone, Copy)]
pub struct ProofOfWorkSolver {
    max_attempts: u32,
}

impl Default for ProofOfWorkSolver {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl ProofOfWorkSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the search; mainly useful to force the fallback in tests.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Solve with thread-local randomness and the wall clock.
    pub fn solve(&self, seed: &str, difficulty: &str, client_identity: &str) -> ProofToken {
        self.solve_with(
            seed,
            difficulty,
            client_identity,
            &mut rand::thread_rng(),
            Utc::now(),
        )
    }

    /// Solve with an injected randomness source and clock.
    pub fn solve_with<R: Rng + ?Sized>(
        &self,
        seed: &str,
        difficulty: &str,
        client_identity: &str,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> ProofToken {
        let fingerprint = Fingerprint::draw(rng, now);
        self.solve_fingerprint(seed, difficulty, client_identity, &fingerprint)
    }

    /// Solve for a fixed fingerprint. Fully deterministic.
    pub fn solve_fingerprint(
        &self,
        seed: &str,
        difficulty: &str,
        client_identity: &str,
        fingerprint: &Fingerprint,
    ) -> ProofToken {
        for attempt in 0..self.max_attempts {
            let payload = fingerprint.encode(attempt, client_identity);

            let mut hasher = Sha3_512::new();
            hasher.update(seed.as_bytes());
            hasher.update(payload.as_bytes());
            let hash_hex = hex::encode(hasher.finalize());

            if meets_difficulty(&hash_hex, difficulty) {
                debug!("Proof of work solved after {} attempt(s)", attempt + 1);
                return ProofToken::Solved(format!("{SOLVED_PREFIX}{payload}"));
            }
        }

        warn!(
            "No proof of work found for difficulty '{}' within {} attempts",
            difficulty, self.max_attempts
        );
        ProofToken::Fallback(fallback_token(seed))
    }
}
