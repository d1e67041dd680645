use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::{info, warn};

use super::{CourseApiClient, CourseApiErrorBody};
use crate::domain::{
    entities::enrollments::{EnrollmentOutcome, EnrollmentRequest},
    repositories::enrollments::EnrollmentRepository,
};

#[derive(Debug, Default, Deserialize)]
struct EnrollmentResponseDto {
    message: Option<String>,
}

#[async_trait]
impl EnrollmentRepository for CourseApiClient {
    async fn apply_enrollment(&self, request: EnrollmentRequest) -> Result<EnrollmentOutcome> {
        let url = self.endpoint(["enrollments"])?;
        let reference = request.payment.reference.clone();

        let resp = self
            .request(Method::POST, url)
            .json(&request)
            .send()
            .await
            .context("Course API enrollment request failed")?;
        let status = resp.status();

        if status.is_success() {
            let body = Self::read_body(resp).await;
            let message = serde_json::from_str::<EnrollmentResponseDto>(&body)
                .unwrap_or_default()
                .message
                .filter(|m| !m.trim().is_empty());

            info!(
                %reference,
                user_id = %request.user_id,
                course_count = request.course_ids.len(),
                "course_api: enrollment applied"
            );
            return Ok(EnrollmentOutcome::Enrolled { message });
        }

        if status.is_client_error() {
            let body = Self::read_body(resp).await;
            let reason = CourseApiErrorBody::reason(&body)
                .unwrap_or_else(|| format!("Enrollment rejected (status {status})"));

            warn!(%reference, status = %status, %reason, "course_api: enrollment rejected");
            return Ok(EnrollmentOutcome::Rejected { reason });
        }

        Err(Self::fail(resp, "apply enrollment").await)
    }
}
