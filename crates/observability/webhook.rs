use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::{Value, json};
use url::Url;

use super::notifier::{AlertEvent, AlertSink};

const CONTENT_LIMIT: usize = 2000;

/// Posts alerts as JSON. The `content` summary keeps chat webhooks readable.
pub(crate) struct WebhookAlertSink {
    webhook_url: Url,
    client: Client,
}

impl WebhookAlertSink {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .map_err(|err| anyhow!("alert webhook client could not be built: {err}"))?;

        Ok(Self {
            webhook_url,
            client,
        })
    }
}

pub(crate) fn alert_payload(event: &AlertEvent) -> Value {
    let kind = if event.defect { "defect" } else { "failure" };
    let mut summary = format!(
        "[{kind}] {} {} {} {}",
        event.service_name,
        event.environment,
        event.component,
        event.level.as_str()
    );
    if let Some(message) = event.message.as_deref().filter(|m| !m.trim().is_empty()) {
        summary.push_str("\n> ");
        summary.push_str(message.trim());
    }
    for (key, value) in &event.fields {
        summary.push_str(&format!("\n- {key} = {value}"));
    }

    json!({
        "content": truncate(summary),
        "kind": kind,
        "level": event.level.as_str(),
        "service": event.service_name,
        "environment": event.environment,
        "component": event.component,
        "timestamp": event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        "target": event.target,
        "location": event.location,
        "message": event.message,
        "fields": event.fields,
        "spans": event.spans,
    })
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn deliver(&self, event: &AlertEvent) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&alert_payload(event))
            .send()
            .await
            .map_err(|err| {
                // reqwest errors embed the URL, which holds the webhook secret.
                if err.is_timeout() {
                    anyhow!("alert webhook request timed out")
                } else if err.is_connect() {
                    anyhow!("alert webhook connection failed")
                } else {
                    anyhow!("alert webhook request failed")
                }
            })?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(anyhow!(
            "alert webhook returned non-success status: {}",
            response.status()
        ))
    }

    fn sink_name(&self) -> &'static str {
        "webhook"
    }
}

fn truncate(content: String) -> String {
    const SUFFIX: &str = "\n... (truncated)";

    if content.chars().count() <= CONTENT_LIMIT {
        return content;
    }

    let allowed = CONTENT_LIMIT - SUFFIX.len();
    let mut truncated: String = content.chars().take(allowed).collect();
    truncated.push_str(SUFFIX);
    truncated
}
