use rust_decimal::Decimal;
use serde_json::Value;

use crate::domain::value_objects::enums::gateway_statuses::GatewayStatus;

/// Normalized gateway answer for a verified transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationResult {
    pub gateway_status: GatewayStatus,
    pub provider_reference: String,
    /// Major currency units.
    pub amount: Decimal,
    pub currency: Option<String>,
    pub raw_metadata: Value,
}

/// What the gateway said about the verification call itself.
///
/// `verified == true` with no `result` is a gateway defect, not a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationEnvelope {
    pub verified: bool,
    pub message: Option<String>,
    pub result: Option<VerificationResult>,
}

impl VerificationEnvelope {
    pub fn verified(result: VerificationResult) -> Self {
        Self {
            verified: true,
            message: None,
            result: Some(result),
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            verified: false,
            message: Some(message.into()),
            result: None,
        }
    }
}
