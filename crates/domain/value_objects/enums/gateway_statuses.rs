use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// The payment provider's own classification of a transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Succeeded,
    Pending,
    Failed,
    Other,
}

/// How a verified but unsuccessful payment is reported back to the purchaser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonSuccessKind {
    Pending,
    Declined,
}

impl GatewayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayStatus::Succeeded => "succeeded",
            GatewayStatus::Pending => "pending",
            GatewayStatus::Failed => "failed",
            GatewayStatus::Other => "other",
        }
    }

    /// Maps a raw provider status string. Unknown values land in `Other`.
    pub fn from_provider(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "success" | "succeeded" | "successful" | "paid" => GatewayStatus::Succeeded,
            "pending" | "ongoing" | "processing" | "queued" => GatewayStatus::Pending,
            "failed" | "declined" => GatewayStatus::Failed,
            _ => GatewayStatus::Other,
        }
    }

    pub fn non_success_kind(&self) -> Option<NonSuccessKind> {
        match self {
            GatewayStatus::Succeeded => None,
            GatewayStatus::Pending => Some(NonSuccessKind::Pending),
            GatewayStatus::Failed | GatewayStatus::Other => Some(NonSuccessKind::Declined),
        }
    }
}

impl Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl NonSuccessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NonSuccessKind::Pending => "pending",
            NonSuccessKind::Declined => "declined",
        }
    }
}

impl Display for NonSuccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
