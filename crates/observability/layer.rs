use std::collections::BTreeMap;

use chrono::Utc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

use super::config::ServiceContext;
use super::notifier::{AlertDispatcher, AlertEvent, DISPATCH_TARGET};

/// Field that marks an event as a defect signal rather than an ordinary failure.
pub(crate) const DEFECT_FIELD: &str = "defect";

const REDACTED: &str = "[REDACTED]";

pub(crate) struct AlertLayer {
    dispatcher: AlertDispatcher,
    service_context: ServiceContext,
    min_level: Level,
}

impl AlertLayer {
    pub(crate) fn new(
        dispatcher: AlertDispatcher,
        service_context: ServiceContext,
        min_level: Level,
    ) -> Self {
        Self {
            dispatcher,
            service_context,
            min_level,
        }
    }
}

#[derive(Default)]
struct AlertFieldVisitor {
    message: Option<String>,
    fields: BTreeMap<String, String>,
    defect: bool,
}

impl AlertFieldVisitor {
    fn insert(&mut self, field: &Field, value: String) {
        let name = field.name();
        if name == "message" {
            self.message = Some(value);
            return;
        }
        let value = if is_sensitive_key(name) {
            REDACTED.to_string()
        } else {
            value
        };
        self.fields.insert(name.to_string(), value);
    }
}

impl Visit for AlertFieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == DEFECT_FIELD {
            self.defect = value;
        }
        self.insert(field, value.to_string());
    }
}

impl<S> Layer<S> for AlertLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        // `Level` orders by verbosity: ERROR is the smallest.
        if *metadata.level() > self.min_level || metadata.target() == DISPATCH_TARGET {
            return;
        }

        let mut visitor = AlertFieldVisitor::default();
        event.record(&mut visitor);

        let spans = ctx
            .event_span(event)
            .map(|span| {
                span.scope()
                    .from_root()
                    .map(|s| s.metadata().name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let location = match (metadata.file(), metadata.line()) {
            (Some(file), Some(line)) => Some(format!("{file}:{line}")),
            (Some(file), None) => Some(file.to_string()),
            _ => None,
        };

        self.dispatcher.dispatch(AlertEvent {
            level: *metadata.level(),
            timestamp: Utc::now(),
            service_name: self.service_context.service_name.clone(),
            environment: self.service_context.environment.clone(),
            component: self.service_context.component.clone(),
            target: metadata.target().to_string(),
            location,
            message: visitor.message,
            fields: visitor.fields,
            spans,
            defect: visitor.defect,
        });
    }
}

fn is_sensitive_key(field_name: &str) -> bool {
    let field = field_name.to_ascii_lowercase();
    ["secret", "token", "authorization", "password", "webhook"]
        .iter()
        .any(|needle| field.contains(needle))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use tracing::{error, info, warn};
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;
    use crate::observability::notifier::AlertSink;
    use crate::observability::webhook::alert_payload;

    struct ChannelSink(mpsc::UnboundedSender<AlertEvent>);

    #[async_trait]
    impl AlertSink for ChannelSink {
        async fn deliver(&self, event: &AlertEvent) -> Result<()> {
            let _ = self.0.send(event.clone());
            Ok(())
        }

        fn sink_name(&self) -> &'static str {
            "channel"
        }
    }

    fn layer(min_level: Level) -> (AlertLayer, mpsc::UnboundedReceiver<AlertEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = AlertDispatcher::spawn(Arc::new(ChannelSink(tx)));
        let context = ServiceContext {
            service_name: "payments".to_string(),
            environment: "test".to_string(),
            component: "backend".to_string(),
        };
        (AlertLayer::new(dispatcher, context, min_level), rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<AlertEvent>) -> AlertEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("alert delivered in time")
            .expect("alert channel open")
    }

    #[tokio::test]
    async fn defects_are_tagged_and_secrets_redacted() {
        let (layer, mut rx) = layer(Level::ERROR);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            info!("ignored below threshold");
            warn!("ignored below threshold");
            error!(
                reference = "REF1",
                api_token = "sk_live_123",
                defect = true,
                "reconciliation: verified payment without payload"
            );
        });

        let event = next(&mut rx).await;
        assert!(event.defect);
        assert_eq!(event.level, Level::ERROR);
        assert_eq!(
            event.message.as_deref(),
            Some("reconciliation: verified payment without payload")
        );
        assert_eq!(event.fields.get("reference").map(String::as_str), Some("REF1"));
        assert_eq!(event.fields.get("api_token").map(String::as_str), Some(REDACTED));

        let payload = alert_payload(&event);
        assert_eq!(payload["kind"], "defect");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn ordinary_failures_are_not_defects() {
        let (layer, mut rx) = layer(Level::WARN);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            warn!(reference = "REF2", "reconciliation: gateway declined payment");
        });

        let event = next(&mut rx).await;
        assert!(!event.defect);
        assert_eq!(alert_payload(&event)["kind"], "failure");
    }
}
