use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::enrollments::{EnrollmentOutcome, EnrollmentRequest};

#[automock]
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    async fn apply_enrollment(&self, request: EnrollmentRequest) -> Result<EnrollmentOutcome>;
}
