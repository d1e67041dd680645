use std::sync::Arc;

use crates::domain::{
    entities::enrollments::{EnrollmentOutcome, EnrollmentRequest},
    repositories::{cart::CartRepository, enrollments::EnrollmentRepository},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::reconciliation_errors::{ReconciliationError, ReconciliationResult};

pub const DEFAULT_ENROLLMENT_MESSAGE: &str = "You have been enrolled in your courses";
const UNAVAILABLE_REASON: &str = "enrollment service unavailable";

/// Remote enrollment call plus the cart cleanup that follows it.
/// No deduplication here; callers guarantee a single dispatch per reference.
pub struct EnrollmentApplier<E, C>
where
    E: EnrollmentRepository + Send + Sync + 'static,
    C: CartRepository + Send + Sync + 'static,
{
    enrollment_repo: Arc<E>,
    cart_repo: Arc<C>,
}

impl<E, C> EnrollmentApplier<E, C>
where
    E: EnrollmentRepository + Send + Sync + 'static,
    C: CartRepository + Send + Sync + 'static,
{
    pub fn new(enrollment_repo: Arc<E>, cart_repo: Arc<C>) -> Self {
        Self {
            enrollment_repo,
            cart_repo,
        }
    }

    /// Returns the message to show the purchaser on success.
    pub async fn apply(&self, request: EnrollmentRequest) -> ReconciliationResult<String> {
        let reference = request.payment.reference.clone();
        let user_id = request.user_id;
        info!(
            %reference,
            %user_id,
            course_count = request.course_ids.len(),
            corporate = request.corporate,
            "reconciliation: applying enrollment"
        );

        match self.enrollment_repo.apply_enrollment(request).await {
            Ok(EnrollmentOutcome::Enrolled { message }) => {
                info!(%reference, %user_id, "reconciliation: enrollment applied");
                Ok(message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_ENROLLMENT_MESSAGE.to_string()))
            }
            Ok(EnrollmentOutcome::Rejected { reason }) => {
                warn!(%reference, %user_id, %reason, "reconciliation: enrollment rejected");
                Err(ReconciliationError::Enrollment(reason))
            }
            Err(err) => {
                error!(
                    %reference,
                    %user_id,
                    enrollment_error = ?err,
                    "reconciliation: enrollment call failed"
                );
                Err(ReconciliationError::Enrollment(UNAVAILABLE_REASON.to_string()))
            }
        }
    }

    /// Fire-and-forget: a failure is logged and never changes the outcome.
    pub async fn clear_cart(&self, user_id: Uuid) {
        match self.cart_repo.clear_cart(user_id).await {
            Ok(()) => info!(%user_id, "reconciliation: cart cleared"),
            Err(err) => warn!(%user_id, cart_error = ?err, "reconciliation: cart clear failed"),
        }
    }
}
