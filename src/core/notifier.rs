use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::address;
use crate::models::{MatchEvent, Reveal};

#[derive(Default)]
struct NotifierState {
    /// Events raised under any other session are dropped
    session: Option<Uuid>,
    /// Pairs already revealed this session; terminal
    seen: HashSet<(String, String)>,
    active: Option<Reveal>,
    queue: VecDeque<Reveal>,
}

/// Turns `MatchDetected` events into at most one active reveal per session
///
/// Distinct pairs arriving while a reveal is active wait in arrival order.
/// A pair is revealed at most once per session; acknowledging only clears
/// the notifier, it never un-creates the match. Reveals scheduled by an
/// earlier session never surface after the session changes.
pub struct MatchNotifier {
    state: Mutex<NotifierState>,
    reveal: watch::Sender<Option<Reveal>>,
}

impl Default for MatchNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchNotifier {
    pub fn new() -> Self {
        let (reveal, _) = watch::channel(None);
        Self {
            state: Mutex::new(NotifierState::default()),
            reveal,
        }
    }

    /// Apply one event; returns whether it produced a new reveal
    pub fn handle(&self, event: MatchEvent) -> bool {
        let MatchEvent::MatchDetected {
            party_a,
            party_b,
            matched_at,
            session_id,
        } = event;

        let mut state = self.lock();
        if session_id != state.session {
            debug!("Dropping match event raised under a previous session");
            return false;
        }
        if !state.seen.insert(address::pair_key(&party_a, &party_b)) {
            debug!("Ignoring repeated match event for {} / {}", party_a, party_b);
            return false;
        }

        let reveal = Reveal {
            party_a,
            party_b,
            matched_at,
        };

        if state.active.is_none() {
            info!("Revealing match between {} and {}", reveal.party_a, reveal.party_b);
            state.active = Some(reveal);
            self.reveal.send_replace(state.active.clone());
        } else {
            state.queue.push_back(reveal);
        }
        true
    }

    /// The reveal currently shown, if any
    pub fn current(&self) -> Option<Reveal> {
        self.lock().active.clone()
    }

    /// Clear the active reveal and promote the next queued one
    pub fn acknowledge(&self) -> Option<Reveal> {
        let mut state = self.lock();
        let acknowledged = state.active.take();
        state.active = state.queue.pop_front();
        self.reveal.send_replace(state.active.clone());
        acknowledged
    }

    /// Forget everything; only events raised without a session are accepted
    pub fn reset(&self) {
        self.bind_session(None);
    }

    /// Start over for `session`, dropping reveals owed to any earlier one
    pub fn bind_session(&self, session: Option<Uuid>) {
        let mut state = self.lock();
        *state = NotifierState {
            session,
            ..NotifierState::default()
        };
        self.reveal.send_replace(None);
    }

    pub fn watch(&self) -> watch::Receiver<Option<Reveal>> {
        self.reveal.subscribe()
    }

    /// Consume events until the sender side is gone
    pub async fn run(self: Arc<Self>, mut events: broadcast::Receiver<MatchEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.handle(event);
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Match notifier lagged, {} events dropped", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Match notifier stopped");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NotifierState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
