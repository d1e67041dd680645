use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::{
    entities::verifications::VerificationEnvelope,
    value_objects::payment_references::PaymentReference,
};

#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Transport or decode failures are errors; a gateway refusal is an unverified envelope.
    async fn verify_transaction(&self, reference: &PaymentReference)
    -> Result<VerificationEnvelope>;
}
