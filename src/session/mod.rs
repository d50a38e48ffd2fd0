//! Anonymous session acquisition.

pub mod acquire;

pub use acquire::{
    ChallengeFetcher, ChallengeGrant, HttpChallengeFetcher, ProofOfWorkChallenge, Session,
    SessionAcquirer,
};
