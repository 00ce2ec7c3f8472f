use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::address;
use crate::core::session::SessionManager;
use crate::error::CrushError;
use crate::models::{CrushSubmission, MatchEvent, SubmissionOutcome};
use crate::services::CrushStore;

const EVENT_CAPACITY: usize = 16;

/// Check a crush pair locally, before anything touches the network
pub fn check_pair(crusher: &str, crush: &str) -> Result<(), CrushError> {
    if !address::validate(crusher) {
        return Err(CrushError::Validation(format!("invalid crusher address {:?}", crusher)));
    }
    if !address::validate(crush) {
        return Err(CrushError::Validation(
            "please enter a valid wallet address (0x followed by 40 hex characters)".to_string(),
        ));
    }
    if address::equals_ignore_case(crusher, crush) {
        return Err(CrushError::Validation("you can't have a crush on yourself".to_string()));
    }
    Ok(())
}

/// Submits crush declarations and raises match events
///
/// Each call to [`submit`](Self::submit) issues exactly one store call; there
/// is no deduplication and no automatic retry. When the store reports a
/// match, `MatchDetected` is broadcast after the reveal delay so the
/// "submission accepted" state can be observed first.
pub struct SubmissionCoordinator {
    store: Arc<dyn CrushStore>,
    sessions: Arc<SessionManager>,
    reveal_delay: Duration,
    events: broadcast::Sender<MatchEvent>,
}

impl SubmissionCoordinator {
    pub fn new(store: Arc<dyn CrushStore>, sessions: Arc<SessionManager>, reveal_delay: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            sessions,
            reveal_delay,
            events,
        }
    }

    /// Receive `MatchDetected` events raised after this call
    pub fn subscribe(&self) -> broadcast::Receiver<MatchEvent> {
        self.events.subscribe()
    }

    pub async fn submit(&self, crusher: &str, crush: &str) -> Result<SubmissionOutcome, CrushError> {
        check_pair(crusher, crush)?;

        // The target stays out of the logs
        info!("Submitting crush from {}", crusher);

        let response = self.store.submit_crush(crusher, crush).await.map_err(|e| {
            warn!("Crush submission failed: {}", e);
            CrushError::from(e)
        })?;

        if !response.success {
            warn!("Store declined submission: {}", response.message);
            return Err(CrushError::Network(response.message));
        }

        let reveal_at = if response.matched {
            let session_id = self.sessions.current().map(|s| s.id);
            Some(self.schedule_reveal(crusher, crush, session_id))
        } else {
            None
        };

        Ok(SubmissionOutcome {
            submission: CrushSubmission {
                crusher: crusher.to_string(),
                crush: crush.to_string(),
                submitted_at: Utc::now(),
            },
            submission_id: response.submission_id,
            message: response.message,
            matched: response.matched,
            reveal_at,
        })
    }

    /// Submit with the connected session as crusher
    pub async fn submit_as_session(&self, crush: &str) -> Result<SubmissionOutcome, CrushError> {
        let crusher = self
            .sessions
            .address()
            .ok_or_else(|| CrushError::Connection("no connected session".to_string()))?;
        self.submit(&crusher, crush).await
    }

    fn schedule_reveal(&self, crusher: &str, crush: &str, session_id: Option<Uuid>) -> Instant {
        let fire_at = Instant::now() + self.reveal_delay;
        let events = self.events.clone();
        let event = MatchEvent::MatchDetected {
            party_a: crusher.to_string(),
            party_b: crush.to_string(),
            matched_at: Utc::now(),
            session_id,
        };

        tokio::spawn(async move {
            tokio::time::sleep_until(fire_at).await;
            if events.send(event).is_err() {
                debug!("MatchDetected raised with no listeners");
            }
        });

        info!("Match reported for {}, reveal scheduled in {:?}", crusher, self.reveal_delay);
        fire_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::SessionConfig;
    use crate::models::{CrushResponse, Match, UserStats};
    use crate::services::{ConfiguredIdentityProvider, MemorySessionStore, RemoteError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const A: &str = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA1111";
    const B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb2222";

    struct FakeStore {
        calls: AtomicUsize,
        matched: AtomicBool,
        failing: AtomicBool,
    }

    impl FakeStore {
        fn new(matched: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                matched: AtomicBool::new(matched),
                failing: AtomicBool::new(false),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CrushStore for FakeStore {
        async fn submit_crush(&self, _crusher: &str, _crush: &str) -> Result<CrushResponse, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(RemoteError::ApiError("Failed to submit crush: 500".into()));
            }
            Ok(CrushResponse {
                success: true,
                message: "Your secret love has been sent!".to_string(),
                submission_id: Some("0123456789abcdef".to_string()),
                matched: self.matched.load(Ordering::SeqCst),
            })
        }

        async fn stats(&self, address: &str) -> Result<UserStats, RemoteError> {
            Ok(UserStats::empty(address))
        }

        async fn matches(&self, _address: &str) -> Result<Vec<Match>, RemoteError> {
            Ok(Vec::new())
        }
    }

    fn sessions(account: Option<&str>) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            Arc::new(ConfiguredIdentityProvider::new(account.map(str::to_string), "1")),
            Arc::new(MemorySessionStore::new()),
            SessionConfig::default(),
        ))
    }

    fn coordinator(store: Arc<FakeStore>) -> SubmissionCoordinator {
        SubmissionCoordinator::new(store, sessions(Some(A)), Duration::from_millis(2000))
    }

    #[tokio::test]
    async fn test_self_crush_is_rejected_without_network() {
        let store = FakeStore::new(false);
        let coordinator = coordinator(store.clone());

        for crush in [A.to_string(), A.to_lowercase(), A.to_uppercase().replacen("0X", "0x", 1)] {
            let err = coordinator.submit(A, &crush).await.unwrap_err();
            assert!(matches!(err, CrushError::Validation(_)));
        }
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_crush_is_rejected_without_network() {
        let store = FakeStore::new(false);
        let coordinator = coordinator(store.clone());

        assert!(matches!(coordinator.submit(A, "0x1234").await, Err(CrushError::Validation(_))));
        assert!(matches!(coordinator.submit(A, "").await, Err(CrushError::Validation(_))));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_repeated_submissions_are_not_deduplicated() {
        let store = FakeStore::new(false);
        let coordinator = coordinator(store.clone());

        let first = coordinator.submit(A, B).await.unwrap();
        coordinator.submit(A, B).await.unwrap();

        assert!(!first.matched);
        assert!(first.reveal_at.is_none());
        assert_eq!(first.submission.crush, B);
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_event_fires_after_reveal_delay() {
        let store = FakeStore::new(true);
        let coordinator = coordinator(store);
        let mut events = coordinator.subscribe();

        let outcome = coordinator.submit(A, B).await.unwrap();
        let reveal_at = outcome.reveal_at.unwrap();

        assert!(outcome.matched);
        assert!(matches!(events.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
        assert!(tokio::time::timeout(Duration::from_millis(1999), events.recv()).await.is_err());

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(Instant::now() >= reveal_at);
        match event {
            MatchEvent::MatchDetected { party_a, party_b, .. } => {
                assert_eq!(party_a, A);
                assert_eq!(party_b, B);
            }
        }
    }

    #[tokio::test]
    async fn test_network_failure_is_retryable_and_not_retried() {
        let store = FakeStore::new(false);
        store.failing.store(true, Ordering::SeqCst);
        let coordinator = coordinator(store.clone());

        let err = coordinator.submit(A, B).await.unwrap_err();

        assert!(matches!(err, CrushError::Network(_)));
        assert!(err.is_retryable());
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn test_submit_as_session_requires_connection() {
        let store = FakeStore::new(false);
        let manager = sessions(Some(A));
        let coordinator = SubmissionCoordinator::new(store.clone(), manager.clone(), Duration::from_secs(2));

        assert!(matches!(coordinator.submit_as_session(B).await, Err(CrushError::Connection(_))));

        manager.connect().await.unwrap();
        assert!(coordinator.submit_as_session(B).await.is_ok());
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_event_carries_submitting_session() {
        let manager = sessions(Some(A));
        let session = manager.connect().await.unwrap();
        let coordinator = SubmissionCoordinator::new(FakeStore::new(true), manager, Duration::from_millis(50));
        let mut events = coordinator.subscribe();

        assert!(coordinator.submit_as_session(B).await.unwrap().matched);

        let MatchEvent::MatchDetected { session_id, .. } = events.recv().await.unwrap();
        assert_eq!(session_id, Some(session.id));
    }
}
