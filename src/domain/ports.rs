use crate::domain::model::{Provider, RawProvider};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Access to the central service directory.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Fetches every active provider. `Ok(None)` means the directory answered
    /// with an empty (`null`) body.
    async fn fetch_providers(&self) -> Result<Option<Vec<RawProvider>>>;

    async fn register(&self, provider: &Provider) -> Result<()>;
}

pub trait ConfigProvider: Send + Sync {
    fn directory_url(&self) -> &str;
    fn max_concurrency(&self) -> usize;
    fn request_timeout_seconds(&self) -> u64;
}
