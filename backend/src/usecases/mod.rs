pub mod enrollment_applier;
pub mod enrollment_ledger;
pub mod invoice_resolver;
pub mod outcome_router;
pub mod payment_reconciliation;
pub mod payment_verifier;
pub mod reconciliation_errors;
pub mod reference_tracker;
