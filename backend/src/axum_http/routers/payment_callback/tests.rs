use axum::{
    http::{StatusCode, header::LOCATION},
    response::IntoResponse,
};
use crates::domain::{
    entities::verifications::{VerificationEnvelope, VerificationResult},
    repositories::{
        cart::MockCartRepository, enrollments::MockEnrollmentRepository,
        invoices::MockInvoiceRepository, payment_gateway::MockPaymentGateway,
    },
    value_objects::{
        enums::{gateway_statuses::GatewayStatus, notification_kinds::NotificationKind},
        payment_references::PaymentReference,
    },
};
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use super::*;

fn frontend() -> Frontend {
    Frontend {
        base_url: Url::parse("https://learn.example.com").unwrap(),
        checkout_path: "/checkout".to_string(),
        dashboard_path: "/dashboard".to_string(),
        receipt_path: "/payments/receipt".to_string(),
        login_path: "/login".to_string(),
        callback_path: "/api/v1/payments/callback".to_string(),
    }
}

fn decode_notice(raw: &str) -> Value {
    let encoded = format!("notice={raw}");
    let (_, json) = form_urlencoded::parse(encoded.as_bytes())
        .next()
        .expect("notice pair");
    serde_json::from_str(&json).unwrap()
}

type MockState = PaymentCallbackState<
    MockPaymentGateway,
    MockInvoiceRepository,
    MockEnrollmentRepository,
    MockCartRepository,
>;

fn state(gateway: MockPaymentGateway, enrollments: MockEnrollmentRepository) -> Arc<MockState> {
    let mut invoices = MockInvoiceRepository::new();
    invoices.expect_find_invoice().never();
    let mut carts = MockCartRepository::new();
    carts.expect_clear_cart().returning(|_| Ok(()));

    Arc::new(PaymentCallbackState {
        reconciliation: Arc::new(PaymentReconciliationUseCase::new(
            Arc::new(gateway),
            Arc::new(invoices),
            Arc::new(enrollments),
            Arc::new(carts),
            OutcomeRouter::new("/api/v1/payments/callback"),
        )),
        redirects: FrontendRedirects::new(&frontend()),
        secure_cookies: true,
    })
}

fn params(reference: Option<&str>) -> Query<PaymentCallbackParams> {
    Query(PaymentCallbackParams {
        reference: reference.map(str::to_string),
        trxref: None,
    })
}

fn location(redirect: Redirect) -> String {
    let response = redirect.into_response();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    response.headers()[LOCATION].to_str().unwrap().to_string()
}

#[test]
fn redirect_url_joins_path_and_query() {
    let outcome = CallbackOutcome::new(RedirectTarget::Dashboard)
        .with_query("payment_success", "true")
        .with_query("invoice", "INV 9");

    let url = FrontendRedirects::new(&frontend()).url_for(&outcome).unwrap();

    assert_eq!(
        url.as_str(),
        "https://learn.example.com/dashboard?payment_success=true&invoice=INV+9"
    );
}

#[test]
fn redirect_url_without_query_has_no_question_mark() {
    let url = FrontendRedirects::new(&frontend())
        .url_for(&CallbackOutcome::new(RedirectTarget::Checkout))
        .unwrap();

    assert_eq!(url.as_str(), "https://learn.example.com/checkout");
}

#[test]
fn notice_is_url_encoded_json() {
    let reference = PaymentReference::parse("REF123").unwrap();
    let notification = Notification {
        kind: NotificationKind::Success,
        message: "Enrolled & ready (payment REF123).".to_string(),
        reference: Some(reference),
    };

    let encoded = encode_notice(&notification).unwrap();

    assert!(!encoded.contains(' '));
    assert!(!encoded.contains('+'));
    assert_eq!(
        decode_notice(&encoded),
        json!({
            "kind": "success",
            "message": "Enrolled & ready (payment REF123).",
            "reference": "REF123",
        })
    );
}

#[test]
fn reset_checkout_removes_checkout_session() {
    let jar = CookieJar::new().add(Cookie::new(CHECKOUT_SESSION_COOKIE, "abc"));
    let outcome = CallbackOutcome::new(RedirectTarget::Receipt)
        .with_side_effect(SideEffect::ResetCheckout);

    let jar = apply_outcome_cookies(jar, &outcome, false).unwrap();

    assert!(jar.get(CHECKOUT_SESSION_COOKIE).is_none());
    assert!(jar.get(NOTICE_COOKIE).is_none());
}

#[tokio::test]
async fn missing_reference_redirects_to_checkout_with_notice() {
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_verify_transaction().never();
    let mut enrollments = MockEnrollmentRepository::new();
    enrollments.expect_apply_enrollment().never();

    let (jar, redirect) = payment_callback(
        State(state(gateway, enrollments)),
        None,
        CookieJar::new(),
        params(None),
    )
    .await
    .unwrap();

    assert_eq!(
        location(redirect),
        "https://learn.example.com/checkout?payment_status=missing_reference"
    );
    let notice = jar.get(NOTICE_COOKIE).expect("notice cookie");
    assert_eq!(notice.secure(), Some(true));
    assert_eq!(decode_notice(notice.value())["kind"], "warning");
}

#[tokio::test]
async fn anonymous_callback_redirects_to_login_then_repeat_is_still_login() {
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_verify_transaction().times(2).returning(|_| {
        Ok(VerificationEnvelope::verified(VerificationResult {
            gateway_status: GatewayStatus::Succeeded,
            provider_reference: "PSK_1".to_string(),
            amount: dec!(100.00),
            currency: Some("NGN".to_string()),
            raw_metadata: json!({ "course_ids": ["C1"] }),
        }))
    });
    let mut enrollments = MockEnrollmentRepository::new();
    enrollments.expect_apply_enrollment().never();
    let state = state(gateway, enrollments);

    for _ in 0..2 {
        let (jar, redirect) = payment_callback(
            State(Arc::clone(&state)),
            None,
            CookieJar::new(),
            params(Some("REF777")),
        )
        .await
        .unwrap();

        assert_eq!(
            location(redirect),
            "https://learn.example.com/login?redirect=%2Fapi%2Fv1%2Fpayments%2Fcallback%3Freference%3DREF777"
        );
        assert!(jar.get(NOTICE_COOKIE).is_some());
    }
}

#[tokio::test]
async fn handled_reference_redirects_to_receipt_without_notice() {
    let mut gateway = MockPaymentGateway::new();
    gateway.expect_verify_transaction().times(1).returning(|_| {
        Ok(VerificationEnvelope::verified(VerificationResult {
            gateway_status: GatewayStatus::Pending,
            provider_reference: "PSK_2".to_string(),
            amount: dec!(100.00),
            currency: None,
            raw_metadata: Value::Null,
        }))
    });
    let mut enrollments = MockEnrollmentRepository::new();
    enrollments.expect_apply_enrollment().never();
    let state = state(gateway, enrollments);

    let (_, first) = payment_callback(
        State(Arc::clone(&state)),
        None,
        CookieJar::new(),
        params(Some("REF789")),
    )
    .await
    .unwrap();
    assert_eq!(
        location(first),
        "https://learn.example.com/checkout?payment_status=pending_confirmation"
    );

    let (jar, again) = payment_callback(
        State(state),
        None,
        CookieJar::new(),
        params(Some("REF789")),
    )
    .await
    .unwrap();
    assert_eq!(
        location(again),
        "https://learn.example.com/payments/receipt?status=already_handled&reference=REF789"
    );
    assert!(jar.get(NOTICE_COOKIE).is_none());
}
