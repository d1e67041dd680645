use std::env;

use tracing::Level;
use url::Url;

#[derive(Debug, Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone)]
pub(crate) struct AlertConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) alerts: Option<AlertConfig>,
    /// Logged once the subscriber is installed.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(component: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let component = component.trim().to_string();

        let service_context = ServiceContext {
            service_name: non_empty("SERVICE_NAME").unwrap_or_else(|| component.clone()),
            environment: non_empty("STAGE").unwrap_or_else(|| "unknown".to_string()),
            component,
        };

        let mut warnings = Vec::new();
        let alerts = alerts_from(&non_empty, &mut warnings);

        Self {
            service_context,
            alerts,
            warnings,
        }
    }
}

fn alerts_from<F>(lookup: &F, warnings: &mut Vec<String>) -> Option<AlertConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let enabled = match lookup("ALERTS_ENABLED") {
        Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
            warnings.push(format!("ALERTS_ENABLED is invalid (value: {raw}); keeping alerts on"));
            true
        }),
        None => true,
    };
    if !enabled {
        return None;
    }

    let raw_url = lookup("ALERT_WEBHOOK_URL")?;
    let webhook_url = match Url::parse(raw_url.trim()) {
        Ok(url) => url,
        Err(err) => {
            // The URL itself carries a secret, only the parse error is reported.
            warnings.push(format!(
                "ALERT_WEBHOOK_URL is set but invalid; alerts disabled (parse error: {err})"
            ));
            return None;
        }
    };

    let min_level = match lookup("ALERT_MIN_LEVEL") {
        Some(raw) => parse_level(&raw).unwrap_or_else(|| {
            warnings.push(format!(
                "ALERT_MIN_LEVEL is invalid (value: {raw}); defaulting to ERROR"
            ));
            Level::ERROR
        }),
        None => Level::ERROR,
    };

    Some(AlertConfig {
        webhook_url,
        min_level,
    })
}

fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> ObservabilityConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ObservabilityConfig::from_lookup("backend", move |key| vars.get(key).cloned())
    }

    #[test]
    fn alerts_are_off_without_webhook() {
        let config = load(&[("STAGE", "production")]);
        assert!(config.alerts.is_none());
        assert!(config.warnings.is_empty());
        assert_eq!(config.service_context.service_name, "backend");
        assert_eq!(config.service_context.environment, "production");
    }

    #[test]
    fn webhook_enables_alerts_at_error_level() {
        let config = load(&[("ALERT_WEBHOOK_URL", "https://hooks.example.com/abc")]);
        let alerts = config.alerts.unwrap();
        assert_eq!(alerts.min_level, Level::ERROR);
        assert_eq!(alerts.webhook_url.host_str(), Some("hooks.example.com"));
    }

    #[test]
    fn explicit_disable_wins_over_webhook() {
        let config = load(&[
            ("ALERT_WEBHOOK_URL", "https://hooks.example.com/abc"),
            ("ALERTS_ENABLED", "false"),
        ]);
        assert!(config.alerts.is_none());
    }

    #[test]
    fn misconfiguration_is_reported_without_the_url() {
        let config = load(&[("ALERT_WEBHOOK_URL", "not a url secret-123")]);
        assert!(config.alerts.is_none());
        assert_eq!(config.warnings.len(), 1);
        assert!(!config.warnings[0].contains("secret-123"));

        let config = load(&[
            ("ALERT_WEBHOOK_URL", "https://hooks.example.com/abc"),
            ("ALERT_MIN_LEVEL", "loud"),
        ]);
        assert_eq!(config.alerts.unwrap().min_level, Level::ERROR);
        assert_eq!(config.warnings.len(), 1);
    }
}
