mod cart;
mod enrollments;
mod invoices;

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{Method, RequestBuilder, header::AUTHORIZATION};
use serde::Deserialize;
use tracing::error;
use url::Url;

/// HTTP adapter for the course service: invoices, enrollments and carts.
pub struct CourseApiClient {
    http: reqwest::Client,
    base_url: Url,
    service_token: String,
}

/// Error body shape the course service uses for rejections.
#[derive(Debug, Default, Deserialize)]
struct CourseApiErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl CourseApiErrorBody {
    fn reason(body: &str) -> Option<String> {
        let parsed: Self = serde_json::from_str(body).ok()?;
        parsed
            .message
            .or(parsed.error)
            .filter(|reason| !reason.trim().is_empty())
    }
}

impl CourseApiClient {
    pub fn new(base_url: Url, service_token: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("course_api: failed to build http client")?;

        Ok(Self {
            http,
            base_url,
            service_token,
        })
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Course API base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.service_token))
    }

    async fn read_body(resp: reqwest::Response) -> String {
        match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        }
    }

    async fn fail(resp: reqwest::Response, context: &str) -> anyhow::Error {
        let status = resp.status();
        let body = Self::read_body(resp).await;

        error!(
            status = %status,
            response_body = %body,
            context = %context,
            "course_api: request failed"
        );

        anyhow!("Course API request failed: {context} (status {status})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_escaped_segments() {
        let client = CourseApiClient::new(
            Url::parse("https://courses.example.com/api/").unwrap(),
            "token".to_string(),
            Duration::from_secs(5),
        )
        .unwrap();

        let url = client.endpoint(["invoices", "INV 9"]).unwrap();
        assert_eq!(url.as_str(), "https://courses.example.com/api/invoices/INV%209");
    }

    #[test]
    fn rejection_reason_prefers_message() {
        assert_eq!(
            CourseApiErrorBody::reason(r#"{"message":"Course C1 is full","error":"conflict"}"#)
                .as_deref(),
            Some("Course C1 is full")
        );
        assert_eq!(
            CourseApiErrorBody::reason(r#"{"error":"already enrolled"}"#).as_deref(),
            Some("already enrolled")
        );
        assert_eq!(CourseApiErrorBody::reason("not json"), None);
    }
}
