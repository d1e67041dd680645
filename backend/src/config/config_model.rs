use url::Url;

use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub stage: Stage,
    pub paystack: Paystack,
    pub course_api: CourseApi,
    pub http_client: HttpClient,
    pub frontend: Frontend,
    pub reconciliation: Reconciliation,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Paystack {
    pub secret_key: String,
    pub base_url: Url,
}

#[derive(Debug, Clone)]
pub struct CourseApi {
    pub base_url: Url,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    pub timeout_seconds: u64,
}

/// Where the purchaser's browser is sent after the callback.
#[derive(Debug, Clone)]
pub struct Frontend {
    pub base_url: Url,
    pub checkout_path: String,
    pub dashboard_path: String,
    pub receipt_path: String,
    pub login_path: String,
    /// Path of this service's callback, used as the post-login redirect.
    pub callback_path: String,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub session_ttl_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct AuthSecret {
    pub jwt_secret: String,
}
