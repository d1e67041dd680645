use std::collections::HashSet;

use crates::domain::value_objects::payment_references::PaymentReference;
use tokio::sync::Mutex;

/// References whose enrollment has been dispatched, shared by every controller.
/// Entries live as long as the process; controller eviction never touches them.
#[derive(Debug, Default)]
pub struct EnrollmentLedger {
    dispatched: Mutex<HashSet<PaymentReference>>,
}

impl EnrollmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_dispatched(&self, reference: &PaymentReference) -> bool {
        self.dispatched.lock().await.contains(reference)
    }

    /// Claims the reference for enrollment. `false` when it was already claimed.
    pub async fn claim(&self, reference: &PaymentReference) -> bool {
        self.dispatched.lock().await.insert(reference.clone())
    }
}
