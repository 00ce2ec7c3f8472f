use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::address;

/// An authenticated identity session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Minted on every successful connect; a replaced session never comes back
    pub id: Uuid,
    pub address: String,
    pub chain_id: String,
    pub connected: bool,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(address: String, chain_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            address,
            chain_id,
            connected: true,
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle state of the session manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected(Session),
    /// Handshake failed; reverts to `Disconnected` once `until` passes
    Failed { until: tokio::time::Instant },
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Connected(session) => Some(session),
            _ => None,
        }
    }
}

/// A one-way declaration of interest, as seen by its creator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrushSubmission {
    pub crusher: String,
    pub crush: String,
    pub submitted_at: DateTime<Utc>,
}

/// Non-binding compatibility preview for a candidate pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityResult {
    pub score: u8,
    pub level_index: u8,
    pub level: String,
    pub message: String,
    pub color: String,
    #[serde(default)]
    pub emoji: String,
}

/// Two reciprocal crush submissions between the same pair
///
/// Party order carries no meaning; use [`Match::same_pair`] to compare.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub party_a: String,
    pub party_b: String,
    pub matched_at: DateTime<Utc>,
}

impl Match {
    pub fn new(party_a: impl Into<String>, party_b: impl Into<String>, matched_at: DateTime<Utc>) -> Self {
        Self {
            party_a: party_a.into(),
            party_b: party_b.into(),
            matched_at,
        }
    }

    /// Normalized, order-independent pair identity
    pub fn pair_key(&self) -> (String, String) {
        address::pair_key(&self.party_a, &self.party_b)
    }

    pub fn same_pair(&self, other: &Match) -> bool {
        self.pair_key() == other.pair_key()
    }

    pub fn involves(&self, who: &str) -> bool {
        address::equals_ignore_case(&self.party_a, who) || address::equals_ignore_case(&self.party_b, who)
    }

    /// The party that is not `who`
    pub fn counterpart(&self, who: &str) -> Option<&str> {
        if address::equals_ignore_case(&self.party_a, who) {
            Some(&self.party_b)
        } else if address::equals_ignore_case(&self.party_b, who) {
            Some(&self.party_a)
        } else {
            None
        }
    }
}

/// Aggregated counters for one identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub wallet_address: String,
    #[serde(default)]
    pub crushes_sent: u64,
    #[serde(default)]
    pub matches_count: u64,
    #[serde(default)]
    pub matches: Vec<String>,
}

impl UserStats {
    /// Zero-valued stats used when nothing better is known
    pub fn empty(address: &str) -> Self {
        Self {
            wallet_address: address.to_string(),
            ..Self::default()
        }
    }
}

/// Result of a successful submission call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub submission: CrushSubmission,
    pub submission_id: Option<String>,
    pub message: String,
    pub matched: bool,
    /// When `MatchDetected` fires, if the store reported a match
    pub reveal_at: Option<tokio::time::Instant>,
}

/// Events raised by the submission coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    MatchDetected {
        party_a: String,
        party_b: String,
        matched_at: DateTime<Utc>,
        /// Session that made the submission
        session_id: Option<Uuid>,
    },
}

/// An active match reveal held by the notifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reveal {
    pub party_a: String,
    pub party_b: String,
    pub matched_at: DateTime<Utc>,
}
