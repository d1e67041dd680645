use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{StatusCode, header::AUTHORIZATION};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};
use url::Url;

use crate::domain::{
    entities::verifications::{VerificationEnvelope, VerificationResult},
    repositories::payment_gateway::PaymentGateway,
    value_objects::{
        enums::gateway_statuses::GatewayStatus, payment_references::PaymentReference,
    },
};

pub const DEFAULT_PAYSTACK_BASE_URL: &str = "https://api.paystack.co";

/// Minimal Paystack client built on reqwest. Only transaction verification is needed.
pub struct PaystackClient {
    http: reqwest::Client,
    secret_key: String,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope {
    status: bool,
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct PaystackTransaction {
    status: Option<String>,
    reference: Option<String>,
    /// Minor units (kobo, cents).
    amount: Option<i64>,
    currency: Option<String>,
    #[serde(default)]
    metadata: Value,
}

impl PaystackTransaction {
    fn into_verification(self, requested: &PaymentReference) -> VerificationResult {
        VerificationResult {
            gateway_status: GatewayStatus::from_provider(self.status.as_deref().unwrap_or("")),
            provider_reference: self
                .reference
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| requested.to_string()),
            amount: Decimal::new(self.amount.unwrap_or(0), 2),
            currency: self.currency.filter(|c| !c.trim().is_empty()),
            raw_metadata: self.metadata,
        }
    }
}

impl PaystackClient {
    pub fn new(secret_key: String, base_url: Url, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("paystack: failed to build http client")?;

        Ok(Self {
            http,
            secret_key,
            base_url,
        })
    }

    fn verify_url(&self, reference: &PaymentReference) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Paystack base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["transaction", "verify", reference.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    async fn verify_transaction(
        &self,
        reference: &PaymentReference,
    ) -> Result<VerificationEnvelope> {
        // https://paystack.com/docs/api/transaction/#verify
        let resp = self
            .http
            .get(self.verify_url(reference)?)
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .send()
            .await
            .map_err(|err| {
                error!(%reference, error = %err, "paystack: verify request failed");
                anyhow!("Paystack verify request failed: {err}")
            })?;

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        match decode_verification(status, &body, reference) {
            Ok(envelope) => {
                if envelope.verified {
                    info!(%reference, "paystack: transaction verified");
                } else {
                    warn!(
                        %reference,
                        status = %status,
                        message = ?envelope.message,
                        "paystack: verification refused"
                    );
                }
                Ok(envelope)
            }
            Err(err) => {
                error!(
                    %reference,
                    status = %status,
                    paystack_request_id = ?request_id,
                    response_body = %body,
                    error = %err,
                    "paystack: verify transaction failed"
                );
                Err(err)
            }
        }
    }
}

/// 2xx decodes into an envelope, 4xx with a Paystack error body is a refusal,
/// everything else is an error.
fn decode_verification(
    status: StatusCode,
    body: &str,
    reference: &PaymentReference,
) -> Result<VerificationEnvelope> {
    if status.is_server_error() {
        bail!("Paystack API request failed: verify transaction (status {status})");
    }

    let envelope: PaystackEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(err) if status.is_success() => {
            bail!("Paystack verify response could not be decoded: {err}")
        }
        Err(_) => bail!("Paystack API request failed: verify transaction (status {status})"),
    };

    if !status.is_success() || !envelope.status {
        let message = envelope
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("Paystack refused verification (status {status})"));
        return Ok(VerificationEnvelope::refused(message));
    }

    if envelope.data.is_null() {
        return Ok(VerificationEnvelope {
            verified: true,
            message: envelope.message,
            result: None,
        });
    }

    let transaction: PaystackTransaction = serde_json::from_value(envelope.data)
        .context("Paystack transaction payload could not be decoded")?;

    Ok(VerificationEnvelope {
        verified: true,
        message: envelope.message,
        result: Some(transaction.into_verification(reference)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn reference() -> PaymentReference {
        PaymentReference::parse("REF123").unwrap()
    }

    #[test]
    fn successful_verification_is_normalized() {
        let body = json!({
            "status": true,
            "message": "Verification successful",
            "data": {
                "status": "success",
                "reference": "REF123",
                "amount": 1250050,
                "currency": "NGN",
                "metadata": { "invoice_id": "INV9" }
            }
        })
        .to_string();

        let envelope = decode_verification(StatusCode::OK, &body, &reference()).unwrap();
        assert!(envelope.verified);
        let result = envelope.result.unwrap();
        assert_eq!(result.gateway_status, GatewayStatus::Succeeded);
        assert_eq!(result.amount, dec!(12500.50));
        assert_eq!(result.currency.as_deref(), Some("NGN"));
        assert_eq!(result.raw_metadata, json!({ "invoice_id": "INV9" }));
    }

    #[test]
    fn string_metadata_is_kept_for_the_extractor() {
        let body = json!({
            "status": true,
            "data": { "status": "abandoned", "amount": 100, "metadata": "{\"courses\":[\"C1\"]}" }
        })
        .to_string();

        let result = decode_verification(StatusCode::OK, &body, &reference())
            .unwrap()
            .result
            .unwrap();
        assert_eq!(result.gateway_status, GatewayStatus::Other);
        assert_eq!(result.provider_reference, "REF123");
        assert_eq!(result.raw_metadata, json!("{\"courses\":[\"C1\"]}"));
    }

    #[test]
    fn verified_without_data_has_no_result() {
        let body = json!({ "status": true, "message": "ok", "data": null }).to_string();
        let envelope = decode_verification(StatusCode::OK, &body, &reference()).unwrap();
        assert!(envelope.verified);
        assert!(envelope.result.is_none());
    }

    #[test]
    fn client_errors_with_paystack_body_are_refusals() {
        let body = json!({ "status": false, "message": "Transaction reference not found" })
            .to_string();
        let envelope = decode_verification(StatusCode::NOT_FOUND, &body, &reference()).unwrap();
        assert!(!envelope.verified);
        assert_eq!(envelope.message.as_deref(), Some("Transaction reference not found"));
    }

    #[test]
    fn server_errors_and_garbage_are_errors() {
        assert!(decode_verification(StatusCode::BAD_GATEWAY, "{}", &reference()).is_err());
        assert!(decode_verification(StatusCode::OK, "<html>", &reference()).is_err());
        assert!(decode_verification(StatusCode::UNAUTHORIZED, "nope", &reference()).is_err());
    }

    #[test]
    fn verify_url_escapes_the_reference() {
        let client = PaystackClient::new(
            "sk_test".to_string(),
            Url::parse("https://api.paystack.co/").unwrap(),
            Duration::from_secs(5),
        )
        .unwrap();
        let url = client
            .verify_url(&PaymentReference::parse("REF/1 2").unwrap())
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.paystack.co/transaction/verify/REF%2F1%202"
        );
    }
}
