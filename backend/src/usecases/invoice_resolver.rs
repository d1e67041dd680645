use std::sync::Arc;

use crates::domain::{
    entities::invoices::InvoiceRecord, repositories::invoices::InvoiceRepository,
};
use tracing::{info, warn};

use super::reconciliation_errors::{ReconciliationError, ReconciliationResult};

pub struct InvoiceResolver<I>
where
    I: InvoiceRepository + Send + Sync + 'static,
{
    invoice_repo: Arc<I>,
}

impl<I> InvoiceResolver<I>
where
    I: InvoiceRepository + Send + Sync + 'static,
{
    pub fn new(invoice_repo: Arc<I>) -> Self {
        Self { invoice_repo }
    }

    /// `Ok(None)` is a valid absence.
    pub async fn resolve(&self, invoice_id: &str) -> ReconciliationResult<Option<InvoiceRecord>> {
        info!(%invoice_id, "reconciliation: resolving invoice");
        let invoice = self
            .invoice_repo
            .find_invoice(invoice_id)
            .await
            .map_err(|err| {
                warn!(
                    %invoice_id,
                    invoice_error = ?err,
                    "reconciliation: invoice fetch failed; metadata fallback applies"
                );
                ReconciliationError::InvoiceFetch(err.to_string())
            })?;

        if invoice.is_none() {
            info!(%invoice_id, "reconciliation: invoice not found; metadata fallback applies");
        }

        Ok(invoice)
    }
}
