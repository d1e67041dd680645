use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::invoices::InvoiceRecord;

#[automock]
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// `Ok(None)` when the invoice does not exist.
    async fn find_invoice(&self, invoice_id: &str) -> Result<Option<InvoiceRecord>>;
}
