use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Query, State},
    response::Redirect,
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use crates::{
    domain::{
        repositories::{
            cart::CartRepository, enrollments::EnrollmentRepository,
            invoices::InvoiceRepository, payment_gateway::PaymentGateway,
        },
        value_objects::{
            callback_outcomes::{CallbackOutcome, Notification, RedirectTarget, SideEffect},
            payment_references::PaymentCallbackParams,
        },
    },
    infra::course_api::CourseApiClient,
    payments::paystack_client::PaystackClient,
};
use tracing::info;
use url::{Url, form_urlencoded};

use crate::{
    auth::{AuthUser, RequestSession},
    axum_http::error_responses::AppError,
    config::config_model::{DotEnvyConfig, Frontend},
    usecases::{
        outcome_router::OutcomeRouter,
        payment_reconciliation::PaymentReconciliationUseCase,
    },
};

pub const NOTICE_COOKIE: &str = "payment_notice";
pub const CHECKOUT_SESSION_COOKIE: &str = "checkout_session";

/// Frontend routes the callback redirects to.
#[derive(Debug, Clone)]
pub struct FrontendRedirects {
    base_url: Url,
    checkout_path: String,
    dashboard_path: String,
    receipt_path: String,
    login_path: String,
}

impl FrontendRedirects {
    pub fn new(frontend: &Frontend) -> Self {
        Self {
            base_url: frontend.base_url.clone(),
            checkout_path: frontend.checkout_path.clone(),
            dashboard_path: frontend.dashboard_path.clone(),
            receipt_path: frontend.receipt_path.clone(),
            login_path: frontend.login_path.clone(),
        }
    }

    fn path(&self, target: RedirectTarget) -> &str {
        match target {
            RedirectTarget::Checkout => &self.checkout_path,
            RedirectTarget::Dashboard => &self.dashboard_path,
            RedirectTarget::Receipt => &self.receipt_path,
            RedirectTarget::Login => &self.login_path,
        }
    }

    pub fn url_for(&self, outcome: &CallbackOutcome) -> Result<Url> {
        let path = self.path(outcome.target);
        let mut url = self
            .base_url
            .join(path)
            .with_context(|| format!("Invalid frontend path: {path}"))?;

        if !outcome.query.is_empty() {
            url.query_pairs_mut().extend_pairs(outcome.query.iter());
        }

        Ok(url)
    }
}

pub struct PaymentCallbackState<G, I, E, C>
where
    G: PaymentGateway + Send + Sync + 'static,
    I: InvoiceRepository + Send + Sync + 'static,
    E: EnrollmentRepository + Send + Sync + 'static,
    C: CartRepository + Send + Sync + 'static,
{
    pub reconciliation: Arc<PaymentReconciliationUseCase<G, I, E, C>>,
    pub redirects: FrontendRedirects,
    pub secure_cookies: bool,
}

pub fn routes(config: Arc<DotEnvyConfig>) -> Result<Router> {
    let timeout = Duration::from_secs(config.http_client.timeout_seconds);

    let paystack_client = PaystackClient::new(
        config.paystack.secret_key.clone(),
        config.paystack.base_url.clone(),
        timeout,
    )?;
    let course_api_client = Arc::new(CourseApiClient::new(
        config.course_api.base_url.clone(),
        config.course_api.token.clone(),
        timeout,
    )?);

    let reconciliation_usecase = PaymentReconciliationUseCase::new(
        Arc::new(paystack_client),
        Arc::clone(&course_api_client),
        Arc::clone(&course_api_client),
        Arc::clone(&course_api_client),
        OutcomeRouter::new(config.frontend.callback_path.clone()),
    )
    .with_ttl(Duration::from_secs(config.reconciliation.session_ttl_seconds));

    let state = PaymentCallbackState {
        reconciliation: Arc::new(reconciliation_usecase),
        redirects: FrontendRedirects::new(&config.frontend),
        secure_cookies: config.stage.secure_cookies(),
    };

    Ok(Router::new()
        .route("/callback", get(payment_callback))
        .with_state(Arc::new(state)))
}

pub async fn payment_callback<G, I, E, C>(
    State(state): State<Arc<PaymentCallbackState<G, I, E, C>>>,
    auth: Option<AuthUser>,
    jar: CookieJar,
    Query(params): Query<PaymentCallbackParams>,
) -> Result<(CookieJar, Redirect), AppError>
where
    G: PaymentGateway + Send + Sync + 'static,
    I: InvoiceRepository + Send + Sync + 'static,
    E: EnrollmentRepository + Send + Sync + 'static,
    C: CartRepository + Send + Sync + 'static,
{
    let reference = params.payment_reference();
    let session = Arc::new(RequestSession::new(auth));

    let dispatched = state
        .reconciliation
        .reconcile(reference.clone(), session)
        .await;

    let router = state.reconciliation.outcome_router();
    let outcome = match (dispatched, reference) {
        (Some(outcome), _) => outcome,
        (None, Some(reference)) => {
            info!(%reference, "payment_callback: delivery already handled");
            router.already_handled(&reference)
        }
        (None, None) => router.missing_reference(),
    };

    let location = state.redirects.url_for(&outcome)?;
    let jar = apply_outcome_cookies(jar, &outcome, state.secure_cookies)?;

    Ok((jar, Redirect::to(location.as_str())))
}

fn apply_outcome_cookies(
    mut jar: CookieJar,
    outcome: &CallbackOutcome,
    secure: bool,
) -> Result<CookieJar> {
    if let Some(notification) = &outcome.notification {
        let notice = Cookie::build((NOTICE_COOKIE, encode_notice(notification)?))
            .path("/")
            .secure(secure)
            .same_site(SameSite::Lax);
        jar = jar.add(notice);
    }

    if outcome.has_side_effect(SideEffect::ResetCheckout) {
        jar = jar.remove(Cookie::build(CHECKOUT_SESSION_COOKIE).path("/"));
    }

    Ok(jar)
}

/// URL-encoded JSON, with spaces as `%20` so `decodeURIComponent` restores it.
fn encode_notice(notification: &Notification) -> Result<String> {
    let json = serde_json::to_string(notification).context("Failed to encode payment notice")?;
    Ok(form_urlencoded::byte_serialize(json.as_bytes())
        .collect::<String>()
        .replace('+', "%20"))
}

#[cfg(test)]
mod tests;
