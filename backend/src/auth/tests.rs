use super::*;
use axum::http::Request;
use chrono::Duration;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::env;

const SECRET: &str = "supersecretjwtsecretforunittesting123";
const USER_ID: &str = "123e4567-e89b-12d3-a456-426614174000";

fn set_env_vars() {
    unsafe {
        env::set_var("AUTH_JWT_SECRET", SECRET);
    }
}

fn token_with(secret: &str, aud: &str, exp: usize) -> String {
    let claims = AccessClaims {
        sub: USER_ID.to_string(),
        aud: aud.to_string(),
        role: Some("authenticated".to_string()),
        email: Some("test@example.com".to_string()),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn far_future() -> usize {
    9_999_999_999
}

async fn extract(request: Request<()>) -> Result<AuthUser, (StatusCode, String)> {
    let (mut parts, _) = request.into_parts();
    AuthUser::from_request_parts(&mut parts, &()).await
}

#[test]
fn test_validate_access_token_success() {
    set_env_vars();
    let token = token_with(SECRET, "authenticated", far_future());

    let claims = validate_access_token(&token).expect("Valid token should pass");
    assert_eq!(claims.sub, USER_ID);
    assert_eq!(claims.email.as_deref(), Some("test@example.com"));
}

#[test]
fn test_validate_access_token_expired() {
    set_env_vars();
    let token = token_with(SECRET, "authenticated", 1);
    assert!(validate_access_token(&token).is_err());
}

#[test]
fn test_validate_access_token_invalid_signature() {
    set_env_vars();
    let token = token_with("wrongsecret", "authenticated", far_future());
    assert!(validate_access_token(&token).is_err());
}

#[test]
fn test_validate_access_token_wrong_audience() {
    set_env_vars();
    let token = token_with(SECRET, "anon", far_future());
    assert!(validate_access_token(&token).is_err());
}

#[tokio::test]
async fn test_extracts_user_from_bearer_header() {
    set_env_vars();
    let token = token_with(SECRET, "service_role", far_future());
    let request = Request::builder()
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(())
        .unwrap();

    let user = extract(request).await.expect("bearer token accepted");
    assert_eq!(user.user_id.to_string(), USER_ID);
}

#[tokio::test]
async fn test_extracts_user_from_access_token_cookie() {
    set_env_vars();
    let token = token_with(SECRET, "authenticated", far_future());
    let request = Request::builder()
        .header("cookie", format!("theme=dark; {ACCESS_TOKEN_COOKIE}={token}"))
        .body(())
        .unwrap();

    let user = extract(request).await.expect("cookie token accepted");
    assert_eq!(user.email.as_deref(), Some("test@example.com"));
}

#[tokio::test]
async fn test_rejects_missing_and_malformed_credentials() {
    set_env_vars();
    let (status, _) = extract(Request::builder().body(()).unwrap())
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .header(AUTHORIZATION, "Basic abc")
        .body(())
        .unwrap();
    assert!(extract(request).await.is_err());
}

#[test]
fn test_request_session_hides_expired_user() {
    let user_id = Uuid::parse_str(USER_ID).unwrap();
    let live = RequestSession::new(Some(AuthUser {
        user_id,
        email: None,
        expires_at: Utc::now() + Duration::minutes(5),
    }));
    assert_eq!(live.current_user().map(|u| u.user_id), Some(user_id));

    let expired = RequestSession::new(Some(AuthUser {
        user_id,
        email: None,
        expires_at: Utc::now() - Duration::seconds(1),
    }));
    assert!(expired.current_user().is_none());

    assert!(RequestSession::default().current_user().is_none());
}
