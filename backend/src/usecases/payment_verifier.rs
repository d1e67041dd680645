use std::sync::Arc;

use crates::domain::{
    entities::verifications::{VerificationEnvelope, VerificationResult},
    repositories::payment_gateway::PaymentGateway,
    value_objects::payment_references::PaymentReference,
};
use tracing::{error, info};

use super::reconciliation_errors::{ReconciliationError, ReconciliationResult};

pub struct PaymentVerifier<G>
where
    G: PaymentGateway + Send + Sync + 'static,
{
    gateway: Arc<G>,
}

impl<G> PaymentVerifier<G>
where
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// A transport failure is a verification failure; classification of the
    /// envelope happens in [`classify_verification`].
    pub async fn verify(
        &self,
        reference: &PaymentReference,
    ) -> ReconciliationResult<VerificationEnvelope> {
        info!(%reference, "reconciliation: verifying payment");
        self.gateway
            .verify_transaction(reference)
            .await
            .map_err(|err| {
                error!(%reference, gateway_error = ?err, "reconciliation: verification call failed");
                ReconciliationError::Verification(err.to_string())
            })
    }
}

/// Splits a gateway answer into "go ahead" and the terminal error it implies.
pub fn classify_verification(
    envelope: VerificationEnvelope,
) -> ReconciliationResult<VerificationResult> {
    if !envelope.verified {
        let reason = envelope
            .message
            .unwrap_or_else(|| "gateway refused verification".to_string());
        return Err(ReconciliationError::Verification(reason));
    }

    let Some(result) = envelope.result else {
        return Err(ReconciliationError::DataInconsistency(
            "gateway verified the payment without a transaction payload".to_string(),
        ));
    };

    match result.gateway_status.non_success_kind() {
        Some(kind) => Err(ReconciliationError::GatewayNonSuccessStatus {
            status: result.gateway_status,
            kind,
        }),
        None => Ok(result),
    }
}
