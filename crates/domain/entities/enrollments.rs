use anyhow::{Result, bail};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::{
    enums::gateway_statuses::GatewayStatus, payment_metadata::dedupe_course_ids,
    payment_references::PaymentReference,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentAttribution {
    pub reference: PaymentReference,
    pub gateway_status: GatewayStatus,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentRequest {
    pub user_id: Uuid,
    pub course_ids: Vec<String>,
    pub payment: PaymentAttribution,
    pub amount_paid: Decimal,
    pub corporate: bool,
    pub corporate_seat_count: Option<u32>,
}

impl EnrollmentRequest {
    /// Course ids are deduplicated; an empty list is only accepted for corporate purchases.
    pub fn new(
        user_id: Uuid,
        course_ids: Vec<String>,
        payment: PaymentAttribution,
        amount_paid: Decimal,
        corporate: bool,
        corporate_seat_count: Option<u32>,
    ) -> Result<Self> {
        let course_ids = dedupe_course_ids(course_ids);
        if course_ids.is_empty() && !corporate {
            bail!("Enrollment request needs at least one course id");
        }

        Ok(Self {
            user_id,
            course_ids,
            payment,
            amount_paid,
            corporate,
            corporate_seat_count,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentOutcome {
    Enrolled { message: Option<String> },
    Rejected { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn attribution() -> PaymentAttribution {
        PaymentAttribution {
            reference: PaymentReference::parse("REF123").unwrap(),
            gateway_status: GatewayStatus::Succeeded,
            note: "Paystack payment REF123".to_string(),
        }
    }

    #[test]
    fn course_ids_are_deduplicated() {
        let request = EnrollmentRequest::new(
            Uuid::new_v4(),
            vec!["C1".into(), "C2".into(), "C1".into()],
            attribution(),
            dec!(120.50),
            false,
            None,
        )
        .unwrap();
        assert_eq!(request.course_ids, vec!["C1", "C2"]);
    }

    #[test]
    fn empty_course_list_requires_corporate_flag() {
        let err = EnrollmentRequest::new(
            Uuid::new_v4(),
            Vec::new(),
            attribution(),
            dec!(10),
            false,
            None,
        );
        assert!(err.is_err());

        let request = EnrollmentRequest::new(
            Uuid::new_v4(),
            Vec::new(),
            attribution(),
            dec!(10),
            true,
            Some(25),
        )
        .unwrap();
        assert!(request.corporate);
        assert_eq!(request.corporate_seat_count, Some(25));
    }
}
