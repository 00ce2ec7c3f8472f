// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    CompatibilityResult, CrushSubmission, Match, MatchEvent, Reveal, Session, SessionState,
    SubmissionOutcome, UserStats,
};
pub use requests::{ConnectQuery, CrushRequest, PairQuery};
pub use responses::{
    CheckMatchResponse, CompatibilityResponse, ConnectResponse, CrushResponse, ErrorResponse,
    HealthResponse, MatchNotification,
};
