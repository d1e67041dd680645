use crates::domain::value_objects::{
    callback_outcomes::{CallbackOutcome, RedirectTarget, SideEffect},
    enums::{gateway_statuses::NonSuccessKind, notification_kinds::NotificationKind},
    payment_references::{PaymentReference, REFERENCE_PARAM},
};

use super::payment_reconciliation::machine::{EnrollmentSource, TerminalState};

const PAYMENT_STATUS: &str = "payment_status";
const STATUS: &str = "status";

/// Maps every terminal state to exactly one user-facing effect.
#[derive(Debug, Clone)]
pub struct OutcomeRouter {
    callback_path: String,
}

impl OutcomeRouter {
    pub fn new(callback_path: impl Into<String>) -> Self {
        Self {
            callback_path: callback_path.into(),
        }
    }

    pub fn route(&self, reference: &PaymentReference, terminal: &TerminalState) -> CallbackOutcome {
        let r = Some(reference);
        match terminal {
            TerminalState::VerificationFailed { .. } => CallbackOutcome::new(RedirectTarget::Checkout)
                .with_query(PAYMENT_STATUS, "verification_failed")
                .with_notification(
                    NotificationKind::Error,
                    format!("We could not verify payment {reference}. Please try again or contact support."),
                    r,
                )
                .with_side_effect(SideEffect::ResetReconciliation),

            TerminalState::GatewayNonSuccess {
                kind: NonSuccessKind::Pending,
                ..
            } => CallbackOutcome::new(RedirectTarget::Checkout)
                .with_query(PAYMENT_STATUS, "pending_confirmation")
                .with_notification(
                    NotificationKind::Info,
                    format!("Payment {reference} is still awaiting confirmation. You will be enrolled once it clears."),
                    r,
                )
                .with_side_effect(SideEffect::ResetReconciliation),

            TerminalState::GatewayNonSuccess {
                kind: NonSuccessKind::Declined,
                status,
            } => CallbackOutcome::new(RedirectTarget::Checkout)
                .with_query(PAYMENT_STATUS, "gateway_declined")
                .with_notification(
                    NotificationKind::Error,
                    format!("Payment {reference} was not completed by the payment provider ({status})."),
                    r,
                )
                .with_side_effect(SideEffect::ResetReconciliation),

            TerminalState::EnrollmentSucceeded {
                source, message, ..
            } => {
                let outcome = CallbackOutcome::new(RedirectTarget::Dashboard)
                    .with_query("payment_success", "true");
                let outcome = match source {
                    EnrollmentSource::Invoice(invoice_id) => {
                        outcome.with_query("invoice", invoice_id.as_str())
                    }
                    EnrollmentSource::Metadata => outcome,
                };
                outcome
                    .with_notification(
                        NotificationKind::Success,
                        format!("{message} (payment {reference})."),
                        r,
                    )
                    .with_side_effect(SideEffect::ClearCart)
                    .with_side_effect(SideEffect::ResetReconciliation)
            }

            TerminalState::EnrollmentFailed { reason } => CallbackOutcome::new(RedirectTarget::Receipt)
                .with_query(STATUS, "enrolment_failed")
                .with_query(REFERENCE_PARAM, reference.as_str())
                .with_query("reason", reason.as_str())
                .with_notification(
                    NotificationKind::Error,
                    format!("Payment {reference} was received but enrollment failed: {reason}"),
                    r,
                )
                .with_side_effect(SideEffect::ResetCheckout),

            TerminalState::InvoiceItemsMissing { invoice_id } => CallbackOutcome::new(RedirectTarget::Receipt)
                .with_query(STATUS, "invoice_items_missing")
                .with_query(REFERENCE_PARAM, reference.as_str())
                .with_query("invoice", invoice_id.as_str())
                .with_notification(
                    NotificationKind::Warning,
                    format!("Payment {reference} was received but invoice {invoice_id} lists no courses. Our team will follow up."),
                    r,
                )
                .with_side_effect(SideEffect::ResetReconciliation),

            TerminalState::EnrollmentDataMissing => CallbackOutcome::new(RedirectTarget::Receipt)
                .with_query(STATUS, "enrolment_data_missing")
                .with_query(REFERENCE_PARAM, reference.as_str())
                .with_notification(
                    NotificationKind::Warning,
                    format!("Payment {reference} was received but carried no course details. Our team will follow up."),
                    r,
                )
                .with_side_effect(SideEffect::ResetReconciliation),

            TerminalState::DataInconsistency { .. } => CallbackOutcome::new(RedirectTarget::Checkout)
                .with_query(STATUS, "internal_error")
                .with_notification(
                    NotificationKind::Error,
                    format!("Something went wrong while processing payment {reference}. Please contact support."),
                    r,
                )
                .with_side_effect(SideEffect::ResetReconciliation),

            TerminalState::SessionMissing => CallbackOutcome::new(RedirectTarget::Login)
                .with_query(
                    "redirect",
                    format!("{}?{REFERENCE_PARAM}={reference}", self.callback_path),
                )
                .with_notification(
                    NotificationKind::Warning,
                    format!("Please sign in to finish processing payment {reference}."),
                    r,
                )
                .with_side_effect(SideEffect::ForgetReference),
        }
    }

    pub fn missing_reference(&self) -> CallbackOutcome {
        CallbackOutcome::new(RedirectTarget::Checkout)
            .with_query(PAYMENT_STATUS, "missing_reference")
            .with_notification(
                NotificationKind::Warning,
                "No payment reference was provided with the payment callback.",
                None,
            )
    }

    /// Re-delivery that dispatched nothing: no notification, no side effects.
    pub fn already_handled(&self, reference: &PaymentReference) -> CallbackOutcome {
        CallbackOutcome::new(RedirectTarget::Receipt)
            .with_query(STATUS, "already_handled")
            .with_query(REFERENCE_PARAM, reference.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crates::domain::value_objects::enums::gateway_statuses::GatewayStatus;
    use uuid::Uuid;

    fn router() -> OutcomeRouter {
        OutcomeRouter::new("/api/v1/payments/callback")
    }

    fn reference() -> PaymentReference {
        PaymentReference::parse("REF123").unwrap()
    }

    fn query(outcome: &CallbackOutcome) -> Vec<(&str, &str)> {
        outcome
            .query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn routing_table() {
        let table: Vec<(TerminalState, RedirectTarget, Vec<(&str, &str)>, Vec<SideEffect>, NotificationKind)> = vec![
            (
                TerminalState::VerificationFailed { reason: "x".into() },
                RedirectTarget::Checkout,
                vec![("payment_status", "verification_failed")],
                vec![SideEffect::ResetReconciliation],
                NotificationKind::Error,
            ),
            (
                TerminalState::GatewayNonSuccess {
                    status: GatewayStatus::Pending,
                    kind: NonSuccessKind::Pending,
                },
                RedirectTarget::Checkout,
                vec![("payment_status", "pending_confirmation")],
                vec![SideEffect::ResetReconciliation],
                NotificationKind::Info,
            ),
            (
                TerminalState::GatewayNonSuccess {
                    status: GatewayStatus::Failed,
                    kind: NonSuccessKind::Declined,
                },
                RedirectTarget::Checkout,
                vec![("payment_status", "gateway_declined")],
                vec![SideEffect::ResetReconciliation],
                NotificationKind::Error,
            ),
            (
                TerminalState::EnrollmentSucceeded {
                    source: EnrollmentSource::Invoice("INV9".into()),
                    message: "Enrolled".into(),
                    user_id: Uuid::nil(),
                },
                RedirectTarget::Dashboard,
                vec![("payment_success", "true"), ("invoice", "INV9")],
                vec![SideEffect::ClearCart, SideEffect::ResetReconciliation],
                NotificationKind::Success,
            ),
            (
                TerminalState::EnrollmentSucceeded {
                    source: EnrollmentSource::Metadata,
                    message: "Enrolled".into(),
                    user_id: Uuid::nil(),
                },
                RedirectTarget::Dashboard,
                vec![("payment_success", "true")],
                vec![SideEffect::ClearCart, SideEffect::ResetReconciliation],
                NotificationKind::Success,
            ),
            (
                TerminalState::EnrollmentFailed { reason: "Course full".into() },
                RedirectTarget::Receipt,
                vec![
                    ("status", "enrolment_failed"),
                    ("reference", "REF123"),
                    ("reason", "Course full"),
                ],
                vec![SideEffect::ResetCheckout],
                NotificationKind::Error,
            ),
            (
                TerminalState::InvoiceItemsMissing { invoice_id: "INV9".into() },
                RedirectTarget::Receipt,
                vec![
                    ("status", "invoice_items_missing"),
                    ("reference", "REF123"),
                    ("invoice", "INV9"),
                ],
                vec![SideEffect::ResetReconciliation],
                NotificationKind::Warning,
            ),
            (
                TerminalState::EnrollmentDataMissing,
                RedirectTarget::Receipt,
                vec![("status", "enrolment_data_missing"), ("reference", "REF123")],
                vec![SideEffect::ResetReconciliation],
                NotificationKind::Warning,
            ),
            (
                TerminalState::DataInconsistency { detail: "x".into() },
                RedirectTarget::Checkout,
                vec![("status", "internal_error")],
                vec![SideEffect::ResetReconciliation],
                NotificationKind::Error,
            ),
            (
                TerminalState::SessionMissing,
                RedirectTarget::Login,
                vec![("redirect", "/api/v1/payments/callback?reference=REF123")],
                vec![SideEffect::ForgetReference],
                NotificationKind::Warning,
            ),
        ];

        for (terminal, target, expected_query, side_effects, kind) in table {
            let outcome = router().route(&reference(), &terminal);
            assert_eq!(outcome.target, target, "terminal: {}", terminal.name());
            assert_eq!(query(&outcome), expected_query, "terminal: {}", terminal.name());
            assert_eq!(outcome.side_effects, side_effects, "terminal: {}", terminal.name());

            let notification = outcome.notification.expect("every terminal notifies");
            assert_eq!(notification.kind, kind, "terminal: {}", terminal.name());
            assert_eq!(notification.reference, Some(reference()));
            assert!(
                notification.message.contains("REF123"),
                "message should name the reference: {}",
                notification.message
            );
        }
    }

    #[test]
    fn missing_reference_goes_to_checkout_without_side_effects() {
        let outcome = router().missing_reference();
        assert_eq!(outcome.target, RedirectTarget::Checkout);
        assert_eq!(outcome.query_value("payment_status"), Some("missing_reference"));
        assert!(outcome.side_effects.is_empty());
        assert_eq!(
            outcome.notification.map(|n| n.kind),
            Some(NotificationKind::Warning)
        );
    }

    #[test]
    fn already_handled_is_silent() {
        let outcome = router().already_handled(&reference());
        assert_eq!(outcome.target, RedirectTarget::Receipt);
        assert_eq!(outcome.query_value("status"), Some("already_handled"));
        assert_eq!(outcome.query_value("reference"), Some("REF123"));
        assert!(outcome.notification.is_none());
        assert!(outcome.side_effects.is_empty());
    }
}
