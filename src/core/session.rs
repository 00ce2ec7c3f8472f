use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{DeployEnvironment, SessionSettings};
use crate::core::address;
use crate::error::CrushError;
use crate::models::{Session, SessionState};
use crate::services::{IdentityProvider, PersistedSession, SessionStore};

/// Chain id assigned to ephemeral fallback identities
const FALLBACK_CHAIN_ID: &str = "1";

/// Session lifecycle policy
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub environment: DeployEnvironment,
    pub handshake_timeout: Duration,
    pub failure_cooldown: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&SessionSettings::default())
    }
}

impl From<&SessionSettings> for SessionConfig {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            environment: settings.environment,
            handshake_timeout: settings.handshake_timeout(),
            failure_cooldown: settings.failure_cooldown(),
        }
    }
}

/// Owns the identity session: connection lifecycle, persistence and fallback
///
/// `connect`, `disconnect` and `restore` are serialized by one async lock.
/// The `Connecting` state is claimed before that lock is awaited, so a second
/// `connect` racing the first is rejected instead of queued.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    ops: Mutex<()>,
    restored: AtomicBool,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            provider,
            store,
            config,
            state,
            ops: Mutex::new(()),
            restored: AtomicBool::new(false),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.expire_failure();
        self.state.borrow().clone()
    }

    /// The connected session, if any
    pub fn current(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    pub fn address(&self) -> Option<String> {
        self.state.borrow().session().map(|s| s.address.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Establish a session through the identity provider
    ///
    /// Outside production a failed handshake falls back to a random
    /// ephemeral identity; in production it surfaces `Connection` and the
    /// manager stays `Failed` for the cooldown.
    pub async fn connect(&self) -> Result<Session, CrushError> {
        let mut claim = self.claim_connecting()?;
        let _ops = self.ops.lock().await;

        let session = match self.handshake().await {
            Ok(session) => session,
            Err(reason) if !self.config.environment.is_production() => {
                warn!("Identity handshake failed ({}), using ephemeral identity", reason);
                Session::new(address::random_address(), FALLBACK_CHAIN_ID.to_string())
            }
            Err(reason) => {
                error!("Identity handshake failed: {}", reason);
                claim.disarm();
                self.state.send_replace(SessionState::Failed {
                    until: Instant::now() + self.config.failure_cooldown,
                });
                if let Err(e) = self.store.clear().await {
                    warn!("Failed to clear persisted session: {}", e);
                }
                return Err(CrushError::Connection(reason));
            }
        };

        self.persist(&session).await;
        claim.disarm();
        self.state.send_replace(SessionState::Connected(session.clone()));

        info!("Session {} connected as {} (chain {})", session.id, session.address, session.chain_id);
        Ok(session)
    }

    /// Clear the in-memory and persisted session; idempotent
    pub async fn disconnect(&self) {
        let _ops = self.ops.lock().await;

        // A connect queued behind us already owns the Connecting claim
        let cleared = self.state.send_if_modified(|state| match state {
            SessionState::Connecting | SessionState::Disconnected => false,
            _ => {
                *state = SessionState::Disconnected;
                true
            }
        });

        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear persisted session: {}", e);
        }
        self.provider.disconnect().await;

        if cleared {
            info!("Session disconnected");
        }
    }

    /// Load the persisted session once at startup
    ///
    /// A corrupt or invalid record is discarded and logged; the resulting
    /// state is `Disconnected`. Later calls return the current state without
    /// touching storage.
    pub async fn restore(&self) -> SessionState {
        let _ops = self.ops.lock().await;

        if self.restored.swap(true, Ordering::SeqCst) {
            return self.state();
        }

        let raw = match self.store.load().await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No persisted session");
                return self.state();
            }
            Err(e) => {
                warn!("Failed to read persisted session: {}", e);
                return self.state();
            }
        };

        match PersistedSession::parse(&raw) {
            Ok(record) => {
                let session = record.into_session();
                let applied = self.state.send_if_modified(|state| {
                    if matches!(state, SessionState::Disconnected) {
                        *state = SessionState::Connected(session.clone());
                        true
                    } else {
                        false
                    }
                });
                if applied {
                    info!("Restored session for {}", session.address);
                }
            }
            Err(reason) => {
                let err = CrushError::PersistenceCorruption(reason);
                warn!("Discarding persisted session: {}", err);
                if let Err(e) = self.store.clear().await {
                    warn!("Failed to clear corrupt session: {}", e);
                }
            }
        }

        self.state()
    }

    async fn handshake(&self) -> Result<Session, String> {
        match tokio::time::timeout(self.config.handshake_timeout, self.provider.connect()).await {
            Ok(Ok(handshake)) if address::validate(&handshake.address) => {
                Ok(Session::new(handshake.address, handshake.chain_id))
            }
            Ok(Ok(handshake)) => Err(format!("provider returned malformed address {:?}", handshake.address)),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("handshake timed out after {:?}", self.config.handshake_timeout)),
        }
    }

    async fn persist(&self, session: &Session) {
        let payload = match serde_json::to_string(&PersistedSession::from(session)) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode session: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.save(&payload).await {
            warn!("Failed to persist session: {}", e);
        }
    }

    fn claim_connecting(&self) -> Result<ConnectingClaim<'_>, CrushError> {
        self.expire_failure();

        let mut rejection = None;
        self.state.send_if_modified(|state| match state {
            SessionState::Connecting => {
                rejection = Some("connection attempt already in flight".to_string());
                false
            }
            SessionState::Failed { until } => {
                rejection = Some(format!(
                    "cooling down after failed handshake for {:?}",
                    until.saturating_duration_since(Instant::now())
                ));
                false
            }
            _ => {
                *state = SessionState::Connecting;
                true
            }
        });

        match rejection {
            Some(reason) => Err(CrushError::Connection(reason)),
            None => Ok(ConnectingClaim {
                state: &self.state,
                armed: true,
            }),
        }
    }

    fn expire_failure(&self) {
        self.state.send_if_modified(|state| match state {
            SessionState::Failed { until } if Instant::now() >= *until => {
                *state = SessionState::Disconnected;
                true
            }
            _ => false,
        });
    }
}

/// Releases a `Connecting` claim if the connect future is dropped midway
struct ConnectingClaim<'a> {
    state: &'a watch::Sender<SessionState>,
    armed: bool,
}

impl ConnectingClaim<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ConnectingClaim<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.send_if_modified(|state| {
                if matches!(state, SessionState::Connecting) {
                    *state = SessionState::Disconnected;
                    true
                } else {
                    false
                }
            });
        }
    }
}
