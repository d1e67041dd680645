use crates::domain::value_objects::enums::gateway_statuses::{GatewayStatus, NonSuccessKind};
use thiserror::Error;

/// Every failure a reconciliation can hit. All of them end as a terminal state;
/// none leave the reconciliation boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconciliationError {
    #[error("payment reference is missing")]
    MissingReference,
    #[error("payment verification failed: {0}")]
    Verification(String),
    #[error("gateway reported a {status} payment")]
    GatewayNonSuccessStatus {
        status: GatewayStatus,
        kind: NonSuccessKind,
    },
    #[error("invoice fetch failed: {0}")]
    InvoiceFetch(String),
    #[error("no course data could be resolved for the payment")]
    EnrollmentDataMissing,
    #[error("enrollment failed: {0}")]
    Enrollment(String),
    #[error("data inconsistency: {0}")]
    DataInconsistency(String),
    #[error("no signed-in user for the payment")]
    SessionMissing,
}

pub type ReconciliationResult<T> = std::result::Result<T, ReconciliationError>;
