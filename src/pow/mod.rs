//! Proof-of-work puzzle solving for the sentinel challenge.

pub mod solver;

pub use solver::{
    FALLBACK_PREFIX, Fingerprint, MAX_ATTEMPTS, ProofOfWorkSolver, ProofToken, SOLVED_PREFIX,
    fallback_token, meets_difficulty,
};
