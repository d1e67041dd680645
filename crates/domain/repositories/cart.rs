use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

#[automock]
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn clear_cart(&self, user_id: Uuid) -> Result<()>;
}
