//! Crush Match - mutual-opt-in matching between wallet identities
//!
//! A user declares a one-way crush on another address. Nothing is revealed
//! unless the other side declares the same crush back, at which point both
//! parties learn of the match. This library holds the client-side session
//! lifecycle and submission protocol, plus an in-memory reference store.

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use client::CrushClient;
pub use config::Settings;
pub use error::CrushError;
pub use models::{CompatibilityResult, Match, MatchEvent, Reveal, Session, SessionState, SubmissionOutcome, UserStats};
