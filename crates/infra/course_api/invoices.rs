use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::{info, warn};

use super::CourseApiClient;
use crate::domain::{
    entities::invoices::InvoiceRecord, repositories::invoices::InvoiceRepository,
};

#[derive(Debug, Deserialize)]
struct InvoiceDto {
    #[serde(alias = "invoice_id", alias = "invoiceId")]
    id: String,
    #[serde(default, alias = "line_items", alias = "lineItems")]
    items: Vec<InvoiceItemDto>,
    #[serde(default, alias = "isCorporate")]
    is_corporate: bool,
    #[serde(default, alias = "seatCount")]
    seat_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct InvoiceItemDto {
    #[serde(default, alias = "courseId")]
    course_id: Option<String>,
}

impl From<InvoiceDto> for InvoiceRecord {
    fn from(dto: InvoiceDto) -> Self {
        let course_ids = dto
            .items
            .into_iter()
            .filter_map(|item| item.course_id)
            .collect();
        InvoiceRecord::new(dto.id, course_ids, dto.is_corporate, dto.seat_count)
    }
}

#[async_trait]
impl InvoiceRepository for CourseApiClient {
    async fn find_invoice(&self, invoice_id: &str) -> Result<Option<InvoiceRecord>> {
        let url = self.endpoint(["invoices", invoice_id])?;
        let resp = self
            .request(Method::GET, url)
            .send()
            .await
            .context("Course API invoice request failed")?;

        if resp.status() == StatusCode::NOT_FOUND {
            warn!(%invoice_id, "course_api: invoice not found");
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::fail(resp, "fetch invoice").await);
        }

        let dto: InvoiceDto = resp
            .json()
            .await
            .context("Course API invoice response could not be decoded")?;
        let invoice = InvoiceRecord::from(dto);

        info!(
            %invoice_id,
            course_count = invoice.line_item_course_ids.len(),
            corporate = invoice.corporate,
            "course_api: invoice fetched"
        );

        Ok(Some(invoice))
    }
}
