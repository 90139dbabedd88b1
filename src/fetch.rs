use std::error::Error as StdError;

use async_trait::async_trait;

/// Retrieves the body of a page. Implementations own everything about the
/// request itself: headers, timeouts, redirects.
#[async_trait]
pub trait Fetcher: Send + Sync {
    type Error: StdError;

    async fn fetch(&self, url: &str) -> Result<String, Self::Error>;
}
