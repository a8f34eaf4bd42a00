use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Every database visible to the configured user, in server order.
    async fn list_databases(&self) -> Result<Vec<String>>;
    fn engine_name(&self) -> &'static str;
}
