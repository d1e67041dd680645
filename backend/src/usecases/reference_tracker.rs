use crates::domain::value_objects::payment_references::PaymentReference;

/// How an incoming reference relates to the one already tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceChange {
    /// A different (or first) reference; derived state must be reset.
    New,
    /// Re-delivery of the tracked reference.
    Repeat { completed: bool },
}

/// The reference being processed plus its "attempt completed" guard.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTracker {
    reference: Option<PaymentReference>,
    completed: bool,
}

impl ReferenceTracker {
    pub fn observe(&mut self, reference: &PaymentReference) -> ReferenceChange {
        if self.reference.as_ref() == Some(reference) {
            return ReferenceChange::Repeat {
                completed: self.completed,
            };
        }

        self.reference = Some(reference.clone());
        self.completed = false;
        ReferenceChange::New
    }

    pub fn current(&self) -> Option<&PaymentReference> {
        self.reference.as_ref()
    }

    pub fn is_current(&self, reference: &PaymentReference) -> bool {
        self.reference.as_ref() == Some(reference)
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn complete(&mut self) {
        self.completed = true;
    }

    pub fn forget(&mut self) {
        self.reference = None;
        self.completed = false;
    }
}
