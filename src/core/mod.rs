// Core component exports
pub mod address;
pub mod notifier;
pub mod oracle;
pub mod session;
pub mod stats;
pub mod submission;

pub use notifier::MatchNotifier;
pub use oracle::{CompatibilityProbe, OracleConfig, ProbeSnapshot};
pub use session::{SessionConfig, SessionManager};
pub use stats::StatsAggregator;
pub use submission::{check_pair, SubmissionCoordinator};
