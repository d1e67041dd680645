use serde::Serialize;

use crate::domain::value_objects::{
    enums::notification_kinds::NotificationKind, payment_references::PaymentReference,
};

/// Frontend route a callback ends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    Checkout,
    Dashboard,
    Receipt,
    Login,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    ClearCart,
    /// Drop derived reconciliation data but remember the reference as handled.
    ResetReconciliation,
    /// Clear the checkout session cookie.
    ResetCheckout,
    /// Drop the tracked reference entirely so it can be processed again.
    ForgetReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    pub reference: Option<PaymentReference>,
}

/// The single user-facing effect of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub target: RedirectTarget,
    pub query: Vec<(String, String)>,
    pub notification: Option<Notification>,
    pub side_effects: Vec<SideEffect>,
}

impl CallbackOutcome {
    pub fn new(target: RedirectTarget) -> Self {
        Self {
            target,
            query: Vec::new(),
            notification: None,
            side_effects: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn with_notification(
        mut self,
        kind: NotificationKind,
        message: impl Into<String>,
        reference: Option<&PaymentReference>,
    ) -> Self {
        self.notification = Some(Notification {
            kind,
            message: message.into(),
            reference: reference.cloned(),
        });
        self
    }

    pub fn with_side_effect(mut self, effect: SideEffect) -> Self {
        self.side_effects.push(effect);
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_side_effect(&self, effect: SideEffect) -> bool {
        self.side_effects.contains(&effect)
    }
}
