use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancels `token` once `shutdown` resolves. The crawl loop aborts the
/// returned handle when the crawl finishes before the signal arrives.
pub(crate) fn watch<S>(token: CancellationToken, shutdown: S) -> JoinHandle<()>
where
    S: Future + Send + 'static,
    S::Output: Send,
{
    tokio::spawn(async move {
        shutdown.await;
        tracing::info!("shutdown requested, stopping crawl");
        token.cancel();
    })
}
