use std::fmt::Display;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

pub const MAX_PAYMENT_REFERENCE_LEN: usize = 128;

/// Query parameter the gateway uses for the reference on the callback redirect.
pub const REFERENCE_PARAM: &str = "reference";
/// Alias some gateway flows send instead of (or next to) `reference`.
pub const REFERENCE_PARAM_ALIAS: &str = "trxref";

/// Opaque identifier of one payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaymentReference(String);

impl PaymentReference {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            bail!("Invalid payment reference: empty input");
        }
        if trimmed.len() > MAX_PAYMENT_REFERENCE_LEN {
            bail!("Invalid payment reference: too long");
        }
        if trimmed.chars().any(|c| c.is_control()) {
            bail!("Invalid payment reference: contains control characters");
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PaymentReference {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PaymentReference> for String {
    fn from(reference: PaymentReference) -> Self {
        reference.0
    }
}

impl Display for PaymentReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Query string of the gateway callback redirect.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PaymentCallbackParams {
    pub reference: Option<String>,
    pub trxref: Option<String>,
}

impl PaymentCallbackParams {
    /// Picks the reference, preferring the primary parameter over its alias.
    /// Blank or malformed values count as absent.
    pub fn payment_reference(&self) -> Option<PaymentReference> {
        [self.reference.as_deref(), self.trxref.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|raw| PaymentReference::parse(raw).ok())
    }
}
