use crates::domain::{
    entities::{
        enrollments::{EnrollmentRequest, PaymentAttribution},
        invoices::InvoiceRecord,
        users::UserIdentity,
        verifications::{VerificationEnvelope, VerificationResult},
    },
    value_objects::{
        enums::gateway_statuses::{GatewayStatus, NonSuccessKind},
        payment_metadata::{extract_enrollment, extract_invoice_id},
        payment_references::PaymentReference,
    },
};
use uuid::Uuid;

use crate::usecases::{
    payment_verifier::classify_verification,
    reconciliation_errors::{ReconciliationError, ReconciliationResult},
    reference_tracker::{ReferenceChange, ReferenceTracker},
};

/// Where the enrolled course list came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentSource {
    Invoice(String),
    Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalState {
    VerificationFailed {
        reason: String,
    },
    GatewayNonSuccess {
        status: GatewayStatus,
        kind: NonSuccessKind,
    },
    EnrollmentSucceeded {
        source: EnrollmentSource,
        message: String,
        user_id: Uuid,
    },
    EnrollmentFailed {
        reason: String,
    },
    InvoiceItemsMissing {
        invoice_id: String,
    },
    EnrollmentDataMissing,
    DataInconsistency {
        detail: String,
    },
    SessionMissing,
}

impl TerminalState {
    pub fn name(&self) -> &'static str {
        match self {
            TerminalState::VerificationFailed { .. } => "verification_failed",
            TerminalState::GatewayNonSuccess { .. } => "gateway_non_success",
            TerminalState::EnrollmentSucceeded { .. } => "enrollment_succeeded",
            TerminalState::EnrollmentFailed { .. } => "enrollment_failed",
            TerminalState::InvoiceItemsMissing { .. } => "invoice_items_missing",
            TerminalState::EnrollmentDataMissing => "enrollment_data_missing",
            TerminalState::DataInconsistency { .. } => "data_inconsistency",
            TerminalState::SessionMissing => "session_missing",
        }
    }

    fn from_error(error: ReconciliationError) -> Self {
        match error {
            ReconciliationError::Verification(reason) => {
                TerminalState::VerificationFailed { reason }
            }
            ReconciliationError::GatewayNonSuccessStatus { status, kind } => {
                TerminalState::GatewayNonSuccess { status, kind }
            }
            ReconciliationError::Enrollment(reason) => TerminalState::EnrollmentFailed { reason },
            ReconciliationError::EnrollmentDataMissing => TerminalState::EnrollmentDataMissing,
            ReconciliationError::SessionMissing => TerminalState::SessionMissing,
            ReconciliationError::DataInconsistency(detail) => {
                TerminalState::DataInconsistency { detail }
            }
            // Defensive branch for a defect: a missing reference never starts a machine
            // and an invoice failure always falls back to metadata.
            other @ (ReconciliationError::MissingReference
            | ReconciliationError::InvoiceFetch(_)) => TerminalState::DataInconsistency {
                detail: format!("unexpected terminal error: {other}"),
            },
        }
    }
}

/// Completion signals fed back into the machine, tagged with their reference.
#[derive(Debug, Clone)]
pub enum ReconciliationEvent {
    ReferenceReceived(PaymentReference),
    VerificationCompleted {
        reference: PaymentReference,
        result: ReconciliationResult<VerificationEnvelope>,
    },
    InvoiceCompleted {
        reference: PaymentReference,
        invoice_id: String,
        result: ReconciliationResult<Option<InvoiceRecord>>,
    },
    SessionChecked {
        reference: PaymentReference,
        user: Option<UserIdentity>,
    },
    EnrollmentCompleted {
        reference: PaymentReference,
        result: ReconciliationResult<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    AlreadyCompleted,
    InFlight,
    Stale,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::AlreadyCompleted => "already_completed",
            IgnoreReason::InFlight => "in_flight",
            IgnoreReason::Stale => "stale",
        }
    }
}

/// What the controller must do next.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationCommand {
    Verify(PaymentReference),
    FetchInvoice {
        reference: PaymentReference,
        invoice_id: String,
    },
    CheckSession(PaymentReference),
    ApplyEnrollment {
        reference: PaymentReference,
        request: EnrollmentRequest,
    },
    Finish {
        reference: PaymentReference,
        terminal: TerminalState,
    },
    Ignore(IgnoreReason),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Verifying,
    ResolvingInvoice,
    CheckingSession,
    ApplyingEnrollment,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CoursePlan {
    source: EnrollmentSource,
    course_ids: Vec<String>,
    corporate: bool,
    corporate_seat_count: Option<u32>,
}

/// Reconciliation state of one purchaser. Only [`ReconciliationMachine::handle`]
/// moves it forward; it never performs I/O.
#[derive(Debug, Default)]
pub struct ReconciliationMachine {
    tracker: ReferenceTracker,
    phase: Phase,
    verification: Option<VerificationResult>,
    resolved_invoice_id: Option<String>,
    invoice_in_flight: bool,
    invoice: Option<InvoiceRecord>,
    plan: Option<CoursePlan>,
    user: Option<UserIdentity>,
    enrollment_dispatched: bool,
}

impl ReconciliationMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn tracked_reference(&self) -> Option<&PaymentReference> {
        self.tracker.current()
    }

    pub fn is_completed(&self) -> bool {
        self.tracker.is_completed()
    }

    pub fn enrollment_dispatched(&self) -> bool {
        self.enrollment_dispatched
    }

    pub fn verification(&self) -> Option<&VerificationResult> {
        self.verification.as_ref()
    }

    pub fn invoice(&self) -> Option<&InvoiceRecord> {
        self.invoice.as_ref()
    }

    pub fn handle(&mut self, event: ReconciliationEvent) -> ReconciliationCommand {
        match event {
            ReconciliationEvent::ReferenceReceived(reference) => self.on_reference(reference),
            ReconciliationEvent::VerificationCompleted { reference, result } => {
                if !self.expects(&reference, Phase::Verifying) {
                    return ReconciliationCommand::Ignore(IgnoreReason::Stale);
                }
                self.on_verification(reference, result)
            }
            ReconciliationEvent::InvoiceCompleted {
                reference,
                invoice_id,
                result,
            } => {
                let awaited = self.invoice_in_flight
                    && self.resolved_invoice_id.as_deref() == Some(invoice_id.as_str());
                if !awaited || !self.expects(&reference, Phase::ResolvingInvoice) {
                    return ReconciliationCommand::Ignore(IgnoreReason::Stale);
                }
                self.on_invoice(reference, invoice_id, result)
            }
            ReconciliationEvent::SessionChecked { reference, user } => {
                if !self.expects(&reference, Phase::CheckingSession) {
                    return ReconciliationCommand::Ignore(IgnoreReason::Stale);
                }
                self.on_session(reference, user)
            }
            ReconciliationEvent::EnrollmentCompleted { reference, result } => {
                if !self.expects(&reference, Phase::ApplyingEnrollment) {
                    return ReconciliationCommand::Ignore(IgnoreReason::Stale);
                }
                self.on_enrollment(reference, result)
            }
        }
    }

    /// Drops verification, invoice and course plan. The reference stays tracked
    /// and completed so a re-delivery is still a no-op.
    pub fn reset_derived(&mut self) {
        self.verification = None;
        self.resolved_invoice_id = None;
        self.invoice_in_flight = false;
        self.invoice = None;
        self.plan = None;
        self.user = None;
        self.enrollment_dispatched = false;
    }

    /// Drops the tracked reference too, so the same reference runs again later.
    pub fn forget_reference(&mut self) {
        self.reset_derived();
        self.tracker.forget();
        self.phase = Phase::Idle;
    }

    fn expects(&self, reference: &PaymentReference, phase: Phase) -> bool {
        self.tracker.is_current(reference) && !self.tracker.is_completed() && self.phase == phase
    }

    fn on_reference(&mut self, reference: PaymentReference) -> ReconciliationCommand {
        match self.tracker.observe(&reference) {
            ReferenceChange::New => {
                self.reset_derived();
                self.phase = Phase::Verifying;
                ReconciliationCommand::Verify(reference)
            }
            ReferenceChange::Repeat { completed: true } => {
                ReconciliationCommand::Ignore(IgnoreReason::AlreadyCompleted)
            }
            ReferenceChange::Repeat { completed: false } if self.phase == Phase::Idle => {
                self.phase = Phase::Verifying;
                ReconciliationCommand::Verify(reference)
            }
            ReferenceChange::Repeat { completed: false } => {
                ReconciliationCommand::Ignore(IgnoreReason::InFlight)
            }
        }
    }

    fn on_verification(
        &mut self,
        reference: PaymentReference,
        result: ReconciliationResult<VerificationEnvelope>,
    ) -> ReconciliationCommand {
        let verification = match result.and_then(classify_verification) {
            Ok(verification) => verification,
            Err(err) => return self.finish(reference, TerminalState::from_error(err)),
        };

        let invoice_id = extract_invoice_id(&verification.raw_metadata);
        self.verification = Some(verification);

        match invoice_id {
            Some(invoice_id) => self.begin_invoice(reference, invoice_id),
            None => self.use_metadata(reference),
        }
    }

    fn begin_invoice(
        &mut self,
        reference: PaymentReference,
        invoice_id: String,
    ) -> ReconciliationCommand {
        if self.resolved_invoice_id.as_deref() == Some(invoice_id.as_str())
            && (self.invoice_in_flight || self.invoice.is_some())
        {
            return ReconciliationCommand::Ignore(IgnoreReason::InFlight);
        }

        self.resolved_invoice_id = Some(invoice_id.clone());
        self.invoice_in_flight = true;
        self.phase = Phase::ResolvingInvoice;
        ReconciliationCommand::FetchInvoice {
            reference,
            invoice_id,
        }
    }

    fn on_invoice(
        &mut self,
        reference: PaymentReference,
        invoice_id: String,
        result: ReconciliationResult<Option<InvoiceRecord>>,
    ) -> ReconciliationCommand {
        self.invoice_in_flight = false;

        match result {
            Ok(Some(invoice)) if invoice.has_enrollable_items() => {
                self.plan = Some(CoursePlan {
                    source: EnrollmentSource::Invoice(invoice_id),
                    course_ids: invoice.line_item_course_ids.clone(),
                    corporate: invoice.corporate,
                    corporate_seat_count: invoice.corporate_seat_count,
                });
                self.invoice = Some(invoice);
                self.request_session(reference)
            }
            Ok(Some(invoice)) => {
                self.invoice = Some(invoice);
                self.finish(reference, TerminalState::InvoiceItemsMissing { invoice_id })
            }
            Ok(None) | Err(_) => self.use_metadata(reference),
        }
    }

    fn use_metadata(&mut self, reference: PaymentReference) -> ReconciliationCommand {
        let Some(verification) = self.verification.as_ref() else {
            return self.finish(
                reference,
                TerminalState::DataInconsistency {
                    detail: "metadata fallback without a verification result".to_string(),
                },
            );
        };

        let extracted = extract_enrollment(&verification.raw_metadata);
        if extracted.is_unresolvable() {
            return self.finish(
                reference,
                TerminalState::from_error(ReconciliationError::EnrollmentDataMissing),
            );
        }

        self.plan = Some(CoursePlan {
            source: EnrollmentSource::Metadata,
            course_ids: extracted.course_ids,
            corporate: extracted.corporate,
            corporate_seat_count: extracted.corporate_seat_count,
        });
        self.request_session(reference)
    }

    fn request_session(&mut self, reference: PaymentReference) -> ReconciliationCommand {
        self.phase = Phase::CheckingSession;
        ReconciliationCommand::CheckSession(reference)
    }

    fn on_session(
        &mut self,
        reference: PaymentReference,
        user: Option<UserIdentity>,
    ) -> ReconciliationCommand {
        let Some(user) = user else {
            return self.finish(
                reference,
                TerminalState::from_error(ReconciliationError::SessionMissing),
            );
        };

        if self.enrollment_dispatched {
            return ReconciliationCommand::Ignore(IgnoreReason::InFlight);
        }

        let request = match self.build_request(&reference, &user) {
            Ok(request) => request,
            Err(err) => return self.finish(reference, TerminalState::from_error(err)),
        };

        self.user = Some(user);
        self.enrollment_dispatched = true;
        self.phase = Phase::ApplyingEnrollment;
        ReconciliationCommand::ApplyEnrollment { reference, request }
    }

    fn build_request(
        &self,
        reference: &PaymentReference,
        user: &UserIdentity,
    ) -> ReconciliationResult<EnrollmentRequest> {
        let (Some(verification), Some(plan)) = (self.verification.as_ref(), self.plan.as_ref())
        else {
            return Err(ReconciliationError::DataInconsistency(
                "enrollment requested without verification or course plan".to_string(),
            ));
        };

        let payment = PaymentAttribution {
            reference: reference.clone(),
            gateway_status: verification.gateway_status,
            note: format!(
                "Course purchase {reference} (provider reference {})",
                verification.provider_reference
            ),
        };

        EnrollmentRequest::new(
            user.user_id,
            plan.course_ids.clone(),
            payment,
            verification.amount,
            plan.corporate,
            plan.corporate_seat_count,
        )
        .map_err(|err| ReconciliationError::DataInconsistency(err.to_string()))
    }

    fn on_enrollment(
        &mut self,
        reference: PaymentReference,
        result: ReconciliationResult<String>,
    ) -> ReconciliationCommand {
        let terminal = match (result, self.plan.as_ref(), self.user.as_ref()) {
            (Ok(message), Some(plan), Some(user)) => TerminalState::EnrollmentSucceeded {
                source: plan.source.clone(),
                message,
                user_id: user.user_id,
            },
            (Ok(_), _, _) => TerminalState::DataInconsistency {
                detail: "enrollment completed without a course plan or user".to_string(),
            },
            (Err(err), _, _) => TerminalState::from_error(err),
        };

        self.finish(reference, terminal)
    }

    fn finish(
        &mut self,
        reference: PaymentReference,
        terminal: TerminalState,
    ) -> ReconciliationCommand {
        self.phase = Phase::Finished;
        self.tracker.complete();
        ReconciliationCommand::Finish {
            reference,
            terminal,
        }
    }
}
