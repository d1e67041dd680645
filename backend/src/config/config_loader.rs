use anyhow::{Context, Result};
use crates::payments::paystack_client::DEFAULT_PAYSTACK_BASE_URL;
use url::Url;

use super::{
    config_model::{
        AuthSecret, BackendServer, CourseApi, DotEnvyConfig, Frontend, HttpClient, Paystack,
        Reconciliation,
    },
    stage::Stage,
};

pub const DEFAULT_CALLBACK_PATH: &str = "/api/v1/payments/callback";

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let paystack = Paystack {
        secret_key: required("PAYSTACK_SECRET_KEY")?,
        base_url: url_or("PAYSTACK_BASE_URL", DEFAULT_PAYSTACK_BASE_URL)?,
    };

    let course_api = CourseApi {
        base_url: Url::parse(&required("COURSE_API_BASE_URL")?)
            .context("COURSE_API_BASE_URL is invalid")?,
        token: required("COURSE_API_TOKEN")?,
    };

    let http_client = HttpClient {
        timeout_seconds: optional("HTTP_CLIENT_TIMEOUT_SECONDS")
            .map(|raw| raw.parse())
            .transpose()
            .context("HTTP_CLIENT_TIMEOUT_SECONDS is invalid")?
            .unwrap_or(15),
    };

    let frontend = Frontend {
        base_url: Url::parse(&required("FRONTEND_BASE_URL")?)
            .context("FRONTEND_BASE_URL is invalid")?,
        checkout_path: path_or("FRONTEND_CHECKOUT_PATH", "/checkout"),
        dashboard_path: path_or("FRONTEND_DASHBOARD_PATH", "/dashboard"),
        receipt_path: path_or("FRONTEND_RECEIPT_PATH", "/payments/receipt"),
        login_path: path_or("FRONTEND_LOGIN_PATH", "/login"),
        callback_path: path_or("PAYMENT_CALLBACK_PATH", DEFAULT_CALLBACK_PATH),
    };

    let reconciliation = Reconciliation {
        session_ttl_seconds: optional("RECONCILIATION_SESSION_TTL_SECONDS")
            .map(|raw| raw.parse())
            .transpose()
            .context("RECONCILIATION_SESSION_TTL_SECONDS is invalid")?
            .unwrap_or(3600),
    };

    Ok(DotEnvyConfig {
        backend_server,
        stage: get_stage(),
        paystack,
        course_api,
        http_client,
        frontend,
        reconciliation,
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or("".to_string());
    Stage::try_from(&stage_str).unwrap_or_default()
}

pub fn get_auth_secret() -> Result<AuthSecret> {
    dotenvy::dotenv().ok();

    Ok(AuthSecret {
        jwt_secret: required("AUTH_JWT_SECRET")?,
    })
}

fn required(key: &str) -> Result<String> {
    optional(key).with_context(|| format!("{key} is invalid"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn url_or(key: &str, default: &str) -> Result<Url> {
    let raw = optional(key).unwrap_or_else(|| default.to_string());
    Url::parse(&raw).with_context(|| format!("{key} is invalid"))
}

fn path_or(key: &str, default: &str) -> String {
    let path = optional(key).unwrap_or_else(|| default.to_string());
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}
