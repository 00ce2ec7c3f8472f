// Service exports
pub mod cache;
pub mod identity;
pub mod ledger;
pub mod remote;
pub mod session_store;

pub use cache::{CacheError, CacheKey, SnapshotCache};
pub use identity::{ConfiguredIdentityProvider, Handshake, IdentityError, IdentityProvider};
pub use ledger::{CrushLedger, LedgerError, RecordOutcome};
pub use remote::{CompatibilityOracle, CrushStore, RemoteClient, RemoteError};
pub use session_store::{FileSessionStore, MemorySessionStore, PersistedSession, SessionStore};
