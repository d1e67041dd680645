pub mod machine;

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use crates::domain::{
    repositories::{
        cart::CartRepository, enrollments::EnrollmentRepository, invoices::InvoiceRepository,
        payment_gateway::PaymentGateway, sessions::SessionProvider,
    },
    value_objects::{
        callback_outcomes::{CallbackOutcome, SideEffect},
        payment_references::PaymentReference,
    },
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    enrollment_applier::EnrollmentApplier, enrollment_ledger::EnrollmentLedger,
    invoice_resolver::InvoiceResolver, outcome_router::OutcomeRouter,
    payment_verifier::PaymentVerifier,
};
use machine::{
    IgnoreReason, ReconciliationCommand, ReconciliationEvent, ReconciliationMachine,
    TerminalState,
};

pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_MAX_CONTROLLERS: usize = 10_000;

/// Registry key of one purchaser's controller.
pub fn controller_key(user_id: Option<Uuid>, reference: &PaymentReference) -> String {
    match user_id {
        Some(user_id) => format!("user:{user_id}"),
        None => format!("anonymous:{reference}"),
    }
}

struct ControllerSlot {
    machine: Arc<Mutex<ReconciliationMachine>>,
    last_seen: Instant,
}

impl ControllerSlot {
    fn new() -> Self {
        Self {
            machine: Arc::new(Mutex::new(ReconciliationMachine::new())),
            last_seen: Instant::now(),
        }
    }

    /// A slot whose machine handle is held elsewhere has a drive in flight.
    fn is_idle(&self) -> bool {
        Arc::strong_count(&self.machine) == 1
    }

    fn is_evictable(&self, ttl: Duration) -> bool {
        self.last_seen.elapsed() > ttl && self.is_idle()
    }
}

/// Drives payment references through verification, invoice resolution and
/// enrollment, one machine per purchaser.
pub struct PaymentReconciliationUseCase<G, I, E, C>
where
    G: PaymentGateway + Send + Sync + 'static,
    I: InvoiceRepository + Send + Sync + 'static,
    E: EnrollmentRepository + Send + Sync + 'static,
    C: CartRepository + Send + Sync + 'static,
{
    verifier: PaymentVerifier<G>,
    invoice_resolver: InvoiceResolver<I>,
    enrollment_applier: EnrollmentApplier<E, C>,
    outcome_router: OutcomeRouter,
    ledger: EnrollmentLedger,
    controllers: RwLock<HashMap<String, ControllerSlot>>,
    session_ttl: Duration,
    max_controllers: usize,
}

impl<G, I, E, C> PaymentReconciliationUseCase<G, I, E, C>
where
    G: PaymentGateway + Send + Sync + 'static,
    I: InvoiceRepository + Send + Sync + 'static,
    E: EnrollmentRepository + Send + Sync + 'static,
    C: CartRepository + Send + Sync + 'static,
{
    pub fn new(
        gateway: Arc<G>,
        invoice_repo: Arc<I>,
        enrollment_repo: Arc<E>,
        cart_repo: Arc<C>,
        outcome_router: OutcomeRouter,
    ) -> Self {
        Self {
            verifier: PaymentVerifier::new(gateway),
            invoice_resolver: InvoiceResolver::new(invoice_repo),
            enrollment_applier: EnrollmentApplier::new(enrollment_repo, cart_repo),
            outcome_router,
            ledger: EnrollmentLedger::new(),
            controllers: RwLock::new(HashMap::new()),
            session_ttl: DEFAULT_SESSION_TTL,
            max_controllers: DEFAULT_MAX_CONTROLLERS,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_max_controllers(mut self, max_controllers: usize) -> Self {
        self.max_controllers = max_controllers.max(1);
        self
    }

    pub fn outcome_router(&self) -> &OutcomeRouter {
        &self.outcome_router
    }

    /// Runs the pipeline for one callback delivery. `None` means this delivery
    /// dispatched nothing: the reference was already handled, is being handled
    /// by another delivery, or was superseded mid-flight.
    pub async fn reconcile(
        self: &Arc<Self>,
        reference: Option<PaymentReference>,
        session: Arc<dyn SessionProvider>,
    ) -> Option<CallbackOutcome> {
        let Some(reference) = reference else {
            warn!("reconciliation: callback without payment reference");
            return Some(self.outcome_router.missing_reference());
        };

        let user_id = session.current_user().map(|user| user.user_id);
        let client_key = controller_key(user_id, &reference);
        let machine = self.machine_for(&client_key).await;

        // Spawned so a dropped request cannot strand the machine mid-step.
        let usecase = Arc::clone(self);
        let drive = tokio::spawn(async move { usecase.drive(&machine, reference, session).await });

        let outcome = match drive.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                error!(%client_key, join_error = ?join_error, "reconciliation: drive task failed");
                None
            }
        };

        if outcome
            .as_ref()
            .is_some_and(|outcome| outcome.has_side_effect(SideEffect::ForgetReference))
        {
            self.release_controller(&client_key).await;
        }

        outcome
    }

    async fn machine_for(&self, client_key: &str) -> Arc<Mutex<ReconciliationMachine>> {
        let mut controllers = self.controllers.write().await;
        self.cleanup_expired_controllers(&mut controllers);

        if !controllers.contains_key(client_key) && controllers.len() >= self.max_controllers {
            evict_least_recent(&mut controllers);
        }

        let slot = controllers
            .entry(client_key.to_string())
            .or_insert_with(|| {
                debug!(%client_key, "reconciliation: registering controller");
                ControllerSlot::new()
            });
        slot.last_seen = Instant::now();
        Arc::clone(&slot.machine)
    }

    /// Drops a slot whose machine holds nothing worth keeping.
    async fn release_controller(&self, client_key: &str) {
        let mut controllers = self.controllers.write().await;
        if controllers.get(client_key).is_some_and(ControllerSlot::is_idle) {
            controllers.remove(client_key);
            debug!(%client_key, "reconciliation: released forgotten controller");
        }
    }

    fn cleanup_expired_controllers(&self, controllers: &mut HashMap<String, ControllerSlot>) {
        let before = controllers.len();
        controllers.retain(|_, slot| !slot.is_evictable(self.session_ttl));

        let evicted = before - controllers.len();
        if evicted > 0 {
            debug!(evicted, "reconciliation: evicted idle controllers");
        }
    }

    async fn drive(
        &self,
        machine: &Mutex<ReconciliationMachine>,
        reference: PaymentReference,
        session: Arc<dyn SessionProvider>,
    ) -> Option<CallbackOutcome> {
        if self.ledger.is_dispatched(&reference).await {
            info!(
                %reference,
                reason = IgnoreReason::AlreadyCompleted.as_str(),
                "reconciliation: delivery ignored"
            );
            return None;
        }

        let mut command = machine
            .lock()
            .await
            .handle(ReconciliationEvent::ReferenceReceived(reference));

        loop {
            let event = match command {
                ReconciliationCommand::Verify(reference) => {
                    let result = self.verifier.verify(&reference).await;
                    ReconciliationEvent::VerificationCompleted { reference, result }
                }
                ReconciliationCommand::FetchInvoice {
                    reference,
                    invoice_id,
                } => {
                    let result = self.invoice_resolver.resolve(&invoice_id).await;
                    ReconciliationEvent::InvoiceCompleted {
                        reference,
                        invoice_id,
                        result,
                    }
                }
                ReconciliationCommand::CheckSession(reference) => {
                    ReconciliationEvent::SessionChecked {
                        user: session.current_user(),
                        reference,
                    }
                }
                ReconciliationCommand::ApplyEnrollment { reference, request } => {
                    if !self.ledger.claim(&reference).await {
                        // Another purchaser's controller got there first.
                        machine.lock().await.forget_reference();
                        info!(
                            %reference,
                            reason = IgnoreReason::AlreadyCompleted.as_str(),
                            "reconciliation: enrollment already dispatched"
                        );
                        return None;
                    }
                    let result = self.enrollment_applier.apply(request).await;
                    ReconciliationEvent::EnrollmentCompleted { reference, result }
                }
                ReconciliationCommand::Finish {
                    reference,
                    terminal,
                } => return Some(self.dispatch(machine, &reference, &terminal).await),
                ReconciliationCommand::Ignore(reason) => {
                    info!(reason = reason.as_str(), "reconciliation: delivery ignored");
                    return None;
                }
            };

            command = machine.lock().await.handle(event);
        }
    }

    /// Routes a terminal state and runs the side effects that belong to the core.
    /// `ResetCheckout` is left to the HTTP layer.
    async fn dispatch(
        &self,
        machine: &Mutex<ReconciliationMachine>,
        reference: &PaymentReference,
        terminal: &TerminalState,
    ) -> CallbackOutcome {
        log_terminal(reference, terminal);
        let outcome = self.outcome_router.route(reference, terminal);

        for effect in &outcome.side_effects {
            match effect {
                SideEffect::ClearCart => {
                    if let TerminalState::EnrollmentSucceeded { user_id, .. } = terminal {
                        self.enrollment_applier.clear_cart(*user_id).await;
                    }
                }
                SideEffect::ResetReconciliation => machine.lock().await.reset_derived(),
                SideEffect::ForgetReference => machine.lock().await.forget_reference(),
                SideEffect::ResetCheckout => {}
            }
        }

        outcome
    }
}

fn evict_least_recent(controllers: &mut HashMap<String, ControllerSlot>) {
    let oldest = controllers
        .iter()
        .filter(|(_, slot)| slot.is_idle())
        .min_by_key(|(_, slot)| slot.last_seen)
        .map(|(client_key, _)| client_key.clone());

    match oldest {
        Some(client_key) => {
            controllers.remove(&client_key);
            debug!(%client_key, "reconciliation: registry full, evicted least recent controller");
        }
        None => warn!(
            controllers = controllers.len(),
            "reconciliation: registry full with every controller in flight"
        ),
    }
}

fn log_terminal(reference: &PaymentReference, terminal: &TerminalState) {
    let state = terminal.name();
    match terminal {
        TerminalState::EnrollmentSucceeded {
            source, user_id, ..
        } => info!(%reference, %user_id, ?source, state, "reconciliation: enrollment succeeded"),
        TerminalState::GatewayNonSuccess { status, kind } => info!(
            %reference,
            %status,
            %kind,
            state,
            "reconciliation: gateway did not report success"
        ),
        TerminalState::DataInconsistency { detail } => error!(
            %reference,
            %detail,
            state,
            defect = true,
            "reconciliation: data inconsistency"
        ),
        TerminalState::VerificationFailed { reason } | TerminalState::EnrollmentFailed { reason } => {
            warn!(%reference, %reason, state, "reconciliation: payment not reconciled")
        }
        TerminalState::InvoiceItemsMissing { invoice_id } => warn!(
            %reference,
            %invoice_id,
            state,
            "reconciliation: invoice lists no courses"
        ),
        TerminalState::EnrollmentDataMissing | TerminalState::SessionMissing => {
            warn!(%reference, state, "reconciliation: payment not reconciled")
        }
    }
}
