use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::address::validate_field;

/// Request to submit a crush
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CrushRequest {
    #[validate(custom(function = "validate_field"))]
    pub crusher_address: String,
    #[validate(custom(function = "validate_field"))]
    pub crush_address: String,
}

/// Query naming an unordered pair of addresses
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PairQuery {
    #[validate(custom(function = "validate_field"))]
    pub address1: String,
    #[validate(custom(function = "validate_field"))]
    pub address2: String,
}

/// Query used to register a wallet with the store
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ConnectQuery {
    #[validate(custom(function = "validate_field"))]
    pub wallet_address: String,
}
