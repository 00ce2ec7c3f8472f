use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::session::SessionManager;
use crate::models::{Match, UserStats};
use crate::services::{CacheKey, CrushStore, SnapshotCache};

/// Read-side counters and match lists for an address
///
/// Reads never fail. A remote error falls back to the last value seen for
/// the address, then to an empty value.
pub struct StatsAggregator {
    store: Arc<dyn CrushStore>,
    sessions: Arc<SessionManager>,
    cache: SnapshotCache,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn CrushStore>, sessions: Arc<SessionManager>, cache: SnapshotCache) -> Self {
        Self { store, sessions, cache }
    }

    pub async fn stats(&self, address: &str) -> UserStats {
        let key = CacheKey::stats(address);

        match self.store.stats(address).await {
            Ok(stats) => {
                if let Err(e) = self.cache.set(&key, &stats).await {
                    warn!("Failed to cache stats: {}", e);
                }
                stats
            }
            Err(e) => {
                warn!("Stats unavailable for {}: {}", address, e);
                self.cache.get(&key).await.unwrap_or_else(|_| {
                    debug!("No cached stats for {}", address);
                    UserStats::empty(address)
                })
            }
        }
    }

    pub async fn matches(&self, address: &str) -> Vec<Match> {
        let key = CacheKey::matches(address);

        match self.store.matches(address).await {
            Ok(matches) => {
                if let Err(e) = self.cache.set(&key, &matches).await {
                    warn!("Failed to cache matches: {}", e);
                }
                matches
            }
            Err(e) => {
                warn!("Matches unavailable for {}: {}", address, e);
                self.cache.get(&key).await.unwrap_or_default()
            }
        }
    }

    /// Re-read `address` after it changed remotely, e.g. after a submission
    ///
    /// A successful read replaces the cached snapshot; a failed one leaves it
    /// in place as the fallback.
    pub async fn refresh(&self, address: &str) {
        self.stats(address).await;
        self.matches(address).await;
    }

    /// Stats for the session address; `None` when disconnected
    pub async fn current_stats(&self) -> Option<UserStats> {
        let address = self.sessions.address()?;
        Some(self.stats(&address).await)
    }

    pub async fn current_matches(&self) -> Option<Vec<Match>> {
        let address = self.sessions.address()?;
        Some(self.matches(&address).await)
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}
