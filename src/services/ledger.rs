use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::core::address;
use crate::models::UserStats;

/// Errors raised by the ledger
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("You can't have a crush on yourself")]
    SelfCrush,
}

/// Outcome of recording one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub submission_id: String,
    /// Both directions now exist for this pair
    pub matched: bool,
    /// This submission created the match
    pub new_match: bool,
}

#[derive(Default)]
struct LedgerState {
    /// crusher -> crush -> submitted at, all keys normalized
    crushes: HashMap<String, HashMap<String, DateTime<Utc>>>,
    /// Keyed by the order-independent pair
    matches: HashMap<(String, String), DateTime<Utc>>,
    /// wallet -> last active
    users: HashMap<String, DateTime<Utc>>,
}

impl LedgerState {
    fn has_crush(&self, crusher: &str, crush: &str) -> bool {
        self.crushes
            .get(crusher)
            .map(|targets| targets.contains_key(crush))
            .unwrap_or(false)
    }
}

/// In-memory authoritative store of submissions and matches
///
/// Crush targets are write-only: no read method returns who someone declared
/// interest in, only counts and reciprocated pairs.
#[derive(Default)]
pub struct CrushLedger {
    state: RwLock<LedgerState>,
}

impl CrushLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a crush and create the match if the reverse direction exists
    pub async fn record_crush(&self, crusher: &str, crush: &str) -> Result<RecordOutcome, LedgerError> {
        for candidate in [crusher, crush] {
            if !address::validate(candidate) {
                return Err(LedgerError::InvalidAddress(candidate.to_string()));
            }
        }
        if address::equals_ignore_case(crusher, crush) {
            return Err(LedgerError::SelfCrush);
        }

        let crusher = address::normalize(crusher);
        let crush = address::normalize(crush);
        let now = Utc::now();
        let submission_id = uuid::Uuid::new_v4().simple().to_string()[..16].to_string();

        let mut state = self.state.write().await;

        state.users.insert(crusher.clone(), now);
        state.crushes.entry(crusher.clone()).or_default().insert(crush.clone(), now);

        let matched = state.has_crush(&crush, &crusher);
        let mut new_match = false;
        if matched {
            let key = address::pair_key(&crusher, &crush);
            if !state.matches.contains_key(&key) {
                state.matches.insert(key, now);
                new_match = true;
                tracing::info!("New match recorded between {} and {}", crusher, crush);
            }
        }

        Ok(RecordOutcome {
            submission_id,
            matched,
            new_match,
        })
    }

    /// Whether both directions exist for the pair
    pub async fn check_mutual(&self, a: &str, b: &str) -> bool {
        let a = address::normalize(a);
        let b = address::normalize(b);
        let state = self.state.read().await;
        state.has_crush(&a, &b) && state.has_crush(&b, &a)
    }

    /// Counterparts and match times for one wallet, oldest first
    pub async fn matches_for(&self, wallet: &str) -> Vec<(String, DateTime<Utc>)> {
        let wallet = address::normalize(wallet);
        let state = self.state.read().await;

        let mut found: Vec<(String, DateTime<Utc>)> = state
            .matches
            .iter()
            .filter_map(|((a, b), at)| {
                if *a == wallet {
                    Some((b.clone(), *at))
                } else if *b == wallet {
                    Some((a.clone(), *at))
                } else {
                    None
                }
            })
            .collect();

        found.sort_by(|x, y| x.1.cmp(&y.1).then_with(|| x.0.cmp(&y.0)));
        found
    }

    pub async fn stats(&self, wallet: &str) -> UserStats {
        let crushes_sent = {
            let state = self.state.read().await;
            state
                .crushes
                .get(&address::normalize(wallet))
                .map(|targets| targets.len() as u64)
                .unwrap_or(0)
        };
        let matches: Vec<String> = self.matches_for(wallet).await.into_iter().map(|(who, _)| who).collect();

        UserStats {
            wallet_address: wallet.to_string(),
            crushes_sent,
            matches_count: matches.len() as u64,
            matches,
        }
    }

    /// Register a wallet or refresh its last-active time
    pub async fn register(&self, wallet: &str) -> Result<String, LedgerError> {
        if !address::validate(wallet) {
            return Err(LedgerError::InvalidAddress(wallet.to_string()));
        }
        let wallet = address::normalize(wallet);
        self.state.write().await.users.insert(wallet.clone(), Utc::now());
        Ok(wallet)
    }
}
