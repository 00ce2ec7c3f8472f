use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Settings;
use crate::core::{
    CompatibilityProbe, MatchNotifier, OracleConfig, SessionConfig, SessionManager, StatsAggregator,
    SubmissionCoordinator,
};
use crate::error::CrushError;
use crate::models::{CompatibilityResult, Match, Session, SessionState, SubmissionOutcome, UserStats};
use crate::services::{
    CompatibilityOracle, ConfiguredIdentityProvider, CrushStore, FileSessionStore, IdentityProvider, RemoteClient,
    SessionStore, SnapshotCache,
};

/// One user's view of the crush service
///
/// Owns the session and wires the preview, submission, notification and
/// stats components to it. Everything runs on the caller's Tokio runtime.
pub struct CrushClient {
    sessions: Arc<SessionManager>,
    probe: CompatibilityProbe,
    submissions: SubmissionCoordinator,
    notifier: Arc<MatchNotifier>,
    stats: StatsAggregator,
    notifier_task: JoinHandle<()>,
}

impl CrushClient {
    /// Build a client talking HTTP to `settings.remote.base_url`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_settings(settings: &Settings) -> Result<Self, CrushError> {
        let remote = Arc::new(RemoteClient::new(
            settings.remote.base_url.clone(),
            Duration::from_secs(settings.remote.timeout_secs),
        )?);
        let provider = Arc::new(ConfiguredIdentityProvider::new(
            settings.session.identity_address.clone(),
            settings.session.chain_id.clone(),
        ));
        let store = Arc::new(FileSessionStore::new(settings.session.store_path.clone()));

        info!("Crush client using remote store at {}", settings.remote.base_url);
        Ok(Self::new(remote.clone(), remote, provider, store, settings))
    }

    /// Build a client from explicit collaborators
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        store: Arc<dyn CrushStore>,
        oracle: Arc<dyn CompatibilityOracle>,
        provider: Arc<dyn IdentityProvider>,
        session_store: Arc<dyn SessionStore>,
        settings: &Settings,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(
            provider,
            session_store,
            SessionConfig::from(&settings.session),
        ));
        let probe = CompatibilityProbe::new(oracle, sessions.clone(), OracleConfig::from(&settings.oracle));
        let submissions = SubmissionCoordinator::new(
            store.clone(),
            sessions.clone(),
            Duration::from_millis(settings.submission.reveal_delay_ms),
        );
        let stats = StatsAggregator::new(
            store,
            sessions.clone(),
            SnapshotCache::new(settings.cache.size, settings.cache.ttl_secs),
        );

        let notifier = Arc::new(MatchNotifier::new());
        let notifier_task = tokio::spawn(notifier.clone().run(submissions.subscribe()));

        Self {
            sessions,
            probe,
            submissions,
            notifier,
            stats,
            notifier_task,
        }
    }

    /// Restore a persisted session; only the first call reads storage
    pub async fn start(&self) -> SessionState {
        let state = self.sessions.restore().await;
        self.notifier.bind_session(state.session().map(|s| s.id));
        state
    }

    /// Connect, replacing any previous session
    pub async fn connect(&self) -> Result<Session, CrushError> {
        let session = self.sessions.connect().await?;
        self.reset_session_views();
        Ok(session)
    }

    pub async fn disconnect(&self) {
        self.sessions.disconnect().await;
        self.reset_session_views();
    }

    pub fn state(&self) -> SessionState {
        self.sessions.state()
    }

    pub fn session(&self) -> Option<Session> {
        self.sessions.current()
    }

    /// Compatibility preview against the session identity
    pub async fn preview(&self, candidate: &str) -> Option<CompatibilityResult> {
        self.probe.probe(candidate).await
    }

    /// Debounced preview for a candidate being typed
    pub fn candidate_changed(&self, candidate: impl Into<String>) {
        self.probe.candidate_changed(candidate);
    }

    pub fn latest_preview(&self) -> Option<CompatibilityResult> {
        self.probe.latest()
    }

    /// Submit a crush from the session identity
    pub async fn submit(&self, crush: &str) -> Result<SubmissionOutcome, CrushError> {
        let outcome = self.submissions.submit_as_session(crush).await?;
        if let Some(address) = self.sessions.address() {
            self.stats.refresh(&address).await;
        }
        Ok(outcome)
    }

    pub async fn stats(&self) -> Option<UserStats> {
        self.stats.current_stats().await
    }

    pub async fn matches(&self) -> Option<Vec<Match>> {
        self.stats.current_matches().await
    }

    pub fn notifier(&self) -> &MatchNotifier {
        &self.notifier
    }

    pub fn probe(&self) -> &CompatibilityProbe {
        &self.probe
    }

    /// Reveals and cached reads belong to one session only
    fn reset_session_views(&self) {
        self.notifier.bind_session(self.sessions.current().map(|s| s.id));
        self.stats.clear();
    }
}

impl Drop for CrushClient {
    fn drop(&mut self) {
        self.notifier_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CrushResponse;
    use crate::services::{MemorySessionStore, RemoteError};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    const ME: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1111";
    const B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb2222";

    struct MutualStore {
        down: AtomicBool,
        sent: AtomicU64,
    }

    impl MutualStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                down: AtomicBool::new(false),
                sent: AtomicU64::new(3),
            })
        }

        fn check(&self) -> Result<(), RemoteError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(RemoteError::ApiError("Failed to fetch stats: 503".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CrushStore for MutualStore {
        async fn submit_crush(&self, _crusher: &str, _crush: &str) -> Result<CrushResponse, RemoteError> {
            self.check()?;
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(CrushResponse {
                success: true,
                message: "Your secret love has been sent... and guess what? IT'S A MATCH!".to_string(),
                submission_id: Some("0123456789abcdef".to_string()),
                matched: true,
            })
        }

        async fn stats(&self, address: &str) -> Result<UserStats, RemoteError> {
            self.check()?;
            Ok(UserStats {
                crushes_sent: self.sent.load(Ordering::SeqCst),
                ..UserStats::empty(address)
            })
        }

        async fn matches(&self, address: &str) -> Result<Vec<Match>, RemoteError> {
            self.check()?;
            Ok(vec![Match::new(address, B, Utc::now())])
        }
    }

    #[async_trait]
    impl CompatibilityOracle for MutualStore {
        async fn compatibility(&self, _own: &str, _candidate: &str) -> Result<CompatibilityResult, RemoteError> {
            Err(RemoteError::ApiError("Failed to check compatibility: 404 Not Found".into()))
        }
    }

    fn client() -> CrushClient {
        client_with(MutualStore::new())
    }

    fn client_with(store: Arc<MutualStore>) -> CrushClient {
        let mut settings = Settings::default();
        settings.submission.reveal_delay_ms = 2000;
        CrushClient::new(
            store.clone(),
            store,
            Arc::new(ConfiguredIdentityProvider::new(Some(ME.to_string()), "1")),
            Arc::new(MemorySessionStore::new()),
            &settings,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_reveal_reaches_notifier() {
        let client = client();
        client.connect().await.unwrap();
        let mut reveals = client.notifier().watch();

        let outcome = client.submit(B).await.unwrap();
        assert!(outcome.matched);
        assert!(client.notifier().current().is_none());

        tokio::time::timeout(Duration::from_secs(5), reveals.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(client.notifier().current().map(|r| r.party_b), Some(B.to_string()));
    }

    #[tokio::test]
    async fn test_disconnect_clears_reveal_and_reads() {
        let client = client();
        assert!(client.stats().await.is_none());

        client.connect().await.unwrap();
        assert_eq!(client.matches().await.map(|m| m.len()), Some(1));
        assert!(client.preview(B).await.is_none());

        client.disconnect().await;
        assert!(client.matches().await.is_none());
        assert!(client.notifier().current().is_none());
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_reveal_is_dropped_after_disconnect() {
        let client = client();
        client.connect().await.unwrap();

        assert!(client.submit(B).await.unwrap().matched);
        client.disconnect().await;
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(client.notifier().current().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_reveal_is_dropped_after_reconnect() {
        let client = client();
        client.connect().await.unwrap();

        assert!(client.submit(B).await.unwrap().matched);
        client.connect().await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(client.notifier().current().is_none());
    }

    #[tokio::test]
    async fn test_stats_survive_outage_after_submit() {
        let store = MutualStore::new();
        let client = client_with(store.clone());
        client.connect().await.unwrap();

        assert_eq!(client.stats().await.map(|s| s.crushes_sent), Some(3));
        client.submit(B).await.unwrap();
        store.down.store(true, Ordering::SeqCst);

        assert_eq!(client.stats().await.map(|s| s.crushes_sent), Some(4));
        assert_eq!(client.matches().await.map(|m| m.len()), Some(1));
    }
}
