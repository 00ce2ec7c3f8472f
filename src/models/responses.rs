use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::CompatibilityResult;

/// Response after submitting a crush
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrushResponse {
    /// Bodies without the field count as accepted; the HTTP status already
    /// separates failures, and only an explicit `false` rejects the crush
    #[serde(default = "default_true")]
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub submission_id: Option<String>,
    /// Explicit match signal; an absent field means no match
    #[serde(default, alias = "is_match")]
    pub matched: bool,
}

fn default_true() -> bool { true }

/// One match as seen by one of its parties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchNotification {
    pub your_address: String,
    pub matched_address: String,
    pub matched_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Compatibility oracle wire format
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CompatibilityResponse {
    #[validate(range(max = 100))]
    pub score: u8,
    pub level: String,
    #[validate(range(max = 4))]
    pub level_index: u8,
    #[serde(default)]
    pub emoji: String,
    pub message: String,
    pub color: String,
}

impl From<CompatibilityResponse> for CompatibilityResult {
    fn from(value: CompatibilityResponse) -> Self {
        Self {
            score: value.score,
            level_index: value.level_index,
            level: value.level,
            message: value.message,
            color: value.color,
            emoji: value.emoji,
        }
    }
}

/// Response of the pair match check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckMatchResponse {
    pub is_match: bool,
    pub message: String,
}

/// Response after registering a wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub success: bool,
    pub message: String,
    pub wallet_address: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
