use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use uuid::Uuid;

use super::CourseApiClient;
use crate::domain::repositories::cart::CartRepository;

#[async_trait]
impl CartRepository for CourseApiClient {
    async fn clear_cart(&self, user_id: Uuid) -> Result<()> {
        let user_id = user_id.to_string();
        let url = self.endpoint(["users", user_id.as_str(), "cart"])?;

        let resp = self
            .request(Method::DELETE, url)
            .send()
            .await
            .context("Course API cart request failed")?;

        if !resp.status().is_success() {
            return Err(Self::fail(resp, "clear cart").await);
        }

        Ok(())
    }
}
