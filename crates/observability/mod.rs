mod config;
mod layer;
mod notifier;
mod webhook;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::ObservabilityConfig;
use layer::AlertLayer;
use notifier::AlertDispatcher;
use webhook::WebhookAlertSink;

/// Installs the global subscriber. Must run inside a tokio runtime when alerts are on.
pub fn init_observability(component: &str) -> Result<()> {
    let mut config = ObservabilityConfig::from_env(component);

    let alert_layer = match config.alerts.as_ref() {
        Some(alerts) => match WebhookAlertSink::new(alerts.webhook_url.clone()) {
            Ok(sink) => {
                let dispatcher = AlertDispatcher::spawn(Arc::new(sink));
                Some(
                    AlertLayer::new(dispatcher, config.service_context.clone(), alerts.min_level)
                        .with_filter(LevelFilter::from_level(alerts.min_level)),
                )
            }
            Err(err) => {
                config.warnings.push(format!("{err}; alerts disabled"));
                None
            }
        },
        None => None,
    };
    let alerts_enabled = alert_layer.is_some();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Local offset instead of UTC `Z` timestamps.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    let service = &config.service_context;
    for warning in &config.warnings {
        warn!(
            service = %service.service_name,
            environment = %service.environment,
            component = %service.component,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %service.service_name,
        environment = %service.environment,
        component = %service.component,
        alerts_enabled,
        "observability: initialized"
    );

    Ok(())
}
