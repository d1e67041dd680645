use crate::domain::value_objects::payment_metadata::dedupe_course_ids;

/// Structured invoice returned by the course service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRecord {
    pub invoice_id: String,
    pub line_item_course_ids: Vec<String>,
    pub corporate: bool,
    pub corporate_seat_count: Option<u32>,
}

impl InvoiceRecord {
    pub fn new(
        invoice_id: impl Into<String>,
        course_ids: Vec<String>,
        corporate: bool,
        corporate_seat_count: Option<u32>,
    ) -> Self {
        Self {
            invoice_id: invoice_id.into(),
            line_item_course_ids: dedupe_course_ids(course_ids),
            corporate,
            corporate_seat_count: corporate_seat_count.filter(|seats| *seats > 0),
        }
    }

    pub fn has_enrollable_items(&self) -> bool {
        !self.line_item_course_ids.is_empty() || self.corporate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_items_are_deduplicated_in_order() {
        let invoice = InvoiceRecord::new(
            "INV9",
            vec!["C2".into(), "C1".into(), "C2".into(), " ".into()],
            false,
            None,
        );
        assert_eq!(invoice.line_item_course_ids, vec!["C2", "C1"]);
        assert!(invoice.has_enrollable_items());
    }

    #[test]
    fn corporate_invoice_without_items_is_enrollable() {
        let invoice = InvoiceRecord::new("INV1", Vec::new(), true, Some(0));
        assert!(invoice.has_enrollable_items());
        assert_eq!(invoice.corporate_seat_count, None);

        let invoice = InvoiceRecord::new("INV2", Vec::new(), false, None);
        assert!(!invoice.has_enrollable_items());
    }
}
