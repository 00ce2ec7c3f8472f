use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::OracleSettings;
use crate::core::address;
use crate::core::session::SessionManager;
use crate::models::CompatibilityResult;
use crate::services::CompatibilityOracle;

#[derive(Debug, Clone, Copy)]
pub struct OracleConfig {
    /// Quiet period after the last candidate change before a probe is issued
    pub debounce: Duration,
    pub timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self::from(&OracleSettings::default())
    }
}

impl From<&OracleSettings> for OracleConfig {
    fn from(settings: &OracleSettings) -> Self {
        Self {
            debounce: Duration::from_millis(settings.debounce_ms),
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

/// Latest published preview and the ticket it belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeSnapshot {
    pub seq: u64,
    pub result: Option<CompatibilityResult>,
}

/// Debounced, cancellable compatibility lookups for the session identity
///
/// Every candidate change and every direct probe takes a ticket from one
/// increasing sequence. A result is published only while its ticket is still
/// the latest, so out-of-order completions are dropped silently.
#[derive(Clone)]
pub struct CompatibilityProbe {
    inner: Arc<ProbeInner>,
}

struct ProbeInner {
    oracle: Arc<dyn CompatibilityOracle>,
    sessions: Arc<SessionManager>,
    config: OracleConfig,
    snapshot: watch::Sender<ProbeSnapshot>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl CompatibilityProbe {
    pub fn new(oracle: Arc<dyn CompatibilityOracle>, sessions: Arc<SessionManager>, config: OracleConfig) -> Self {
        let (snapshot, _) = watch::channel(ProbeSnapshot::default());
        Self {
            inner: Arc::new(ProbeInner {
                oracle,
                sessions,
                config,
                snapshot,
                pending: Mutex::new(None),
            }),
        }
    }

    /// Probe `candidate` against the session identity right away
    ///
    /// Returns `None` when there is no session, the candidate is invalid or is
    /// the caller, the oracle is unavailable, or a newer probe superseded this
    /// one before it completed.
    pub async fn probe(&self, candidate: &str) -> Option<CompatibilityResult> {
        let ticket = self.inner.issue();
        let result = self.inner.run(ticket, candidate).await;
        self.inner.publish(ticket, result.clone());
        result
    }

    /// Record a candidate change; the probe fires after the debounce window
    ///
    /// Must be called from within a Tokio runtime.
    pub fn candidate_changed(&self, candidate: impl Into<String>) {
        // Ticket order must match the order tasks land in `pending`
        let mut pending = self.inner.pending.lock().unwrap_or_else(|e| e.into_inner());
        let ticket = self.inner.issue();
        let candidate = candidate.into();
        let inner = Arc::clone(&self.inner);

        let task = tokio::spawn(async move {
            tokio::time::sleep(inner.config.debounce).await;
            if !inner.is_current(ticket) {
                return;
            }
            let result = inner.run(ticket, &candidate).await;
            inner.publish(ticket, result);
        });

        if let Some(previous) = pending.replace(task) {
            previous.abort();
        }
    }

    /// Result for the most recent input, if it has arrived
    pub fn latest(&self) -> Option<CompatibilityResult> {
        self.inner.snapshot.borrow().result.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProbeSnapshot> {
        self.inner.snapshot.subscribe()
    }
}

impl ProbeInner {
    /// Take the next ticket; the previous input's result is no longer current
    fn issue(&self) -> u64 {
        let mut ticket = 0;
        self.snapshot.send_if_modified(|snapshot| {
            snapshot.seq += 1;
            ticket = snapshot.seq;
            snapshot.result.take().is_some()
        });
        ticket
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.snapshot.borrow().seq == ticket
    }

    fn publish(&self, ticket: u64, result: Option<CompatibilityResult>) {
        self.snapshot.send_if_modified(|snapshot| {
            if snapshot.seq != ticket || snapshot.result == result {
                return false;
            }
            snapshot.result = result;
            true
        });
    }

    async fn run(&self, ticket: u64, candidate: &str) -> Option<CompatibilityResult> {
        let own = self.sessions.address()?;
        if !address::validate(candidate) || address::equals_ignore_case(&own, candidate) {
            return None;
        }

        let result = match tokio::time::timeout(self.config.timeout, self.oracle.compatibility(&own, candidate)).await {
            Ok(Ok(result)) => Some(result),
            Ok(Err(e)) => {
                debug!("Compatibility preview unavailable: {}", e);
                None
            }
            Err(_) => {
                debug!("Compatibility preview timed out after {:?}", self.config.timeout);
                None
            }
        };

        if !self.is_current(ticket) {
            debug!("Dropping superseded compatibility result (ticket {})", ticket);
            return None;
        }
        result
    }
}
