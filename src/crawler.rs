pub mod checkpoint;
pub mod frontier;
pub mod statistics;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use url::Url;

use crate::extract::LinkExtractor;
use crate::fetch::Fetcher;
use crate::origin;
use crate::output::OutputSink;
use crate::shutdown;
use checkpoint::{CheckpointError, CheckpointStore};
use frontier::Frontier;
use statistics::Statistics;

/// Scheme assumed for bare-host seeds.
const DEFAULT_SCHEME: &str = "https";

pub struct Crawler {
    store: CheckpointStore,
    delay: Duration,
    concurrency: usize,
}

#[derive(Debug, Clone)]
pub struct CrawlerOptions {
    pub delay: Duration,
    pub concurrency: usize,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    /// The frontier ran dry; the crawl is complete.
    Done,
    /// The shutdown signal fired; the checkpoint holds the resume point.
    Cancelled,
}

#[derive(Debug)]
pub struct CrawlSummary {
    pub state: CrawlState,
    /// Fetch attempts that completed this run, including failures.
    pub pages_fetched: usize,
    pub fetch_errors: usize,
    /// Total discovered URLs, including those from earlier runs.
    pub discovered: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("invalid seed URL '{url}': {source}")]
    InvalidSeed {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("seed URL '{0}' has no host")]
    SeedWithoutHost(String),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error("failed to append to the output file: {0}")]
    Output(#[from] std::io::Error),
}

/// What a fetch worker reports back for one dispatched URL.
enum PageOutcome {
    /// Body fetched; `candidates` are the raw hrefs found in it.
    Fetched {
        page: String,
        candidates: Vec<String>,
    },
    /// Fetch failed; the page stays visited but is never expanded.
    Failed { page: String },
    /// Cancellation hit before or during the fetch; the page goes back to the
    /// head of the queue.
    Aborted { page: String },
}

impl Crawler {
    pub fn new(
        store: CheckpointStore,
        CrawlerOptions { delay, concurrency }: CrawlerOptions,
    ) -> Self {
        Self {
            store,
            delay,
            concurrency: concurrency.max(1),
        }
    }

    /// Runs the crawl to completion or until `shutdown` resolves.
    ///
    /// The seed may be a full URL or a bare host. An existing checkpoint for
    /// the seed's domain is resumed; otherwise the crawl starts fresh. Newly
    /// discovered same-origin URLs are appended to `output` in discovery
    /// order, and the checkpoint is rewritten after every processed page.
    pub async fn run<E, S>(
        &self,
        seed: &str,
        fetcher: Arc<dyn Fetcher<Error = E>>,
        extractor: Arc<dyn LinkExtractor>,
        output: &mut OutputSink,
        shutdown: S,
    ) -> Result<CrawlSummary, CrawlError>
    where
        E: StdError + Send + 'static,
        S: Future + Send + 'static,
        S::Output: Send,
    {
        let starting_time = Instant::now();

        let seed = origin::ensure_scheme(seed, DEFAULT_SCHEME);
        let seed = Url::parse(&seed).map_err(|source| CrawlError::InvalidSeed {
            url: seed.clone(),
            source,
        })?;
        let key =
            checkpoint::key_for(&seed).ok_or_else(|| CrawlError::SeedWithoutHost(seed.to_string()))?;

        let mut frontier = match self.store.load(&key)? {
            Some(snapshot) => {
                let frontier = Frontier::restore(snapshot);
                tracing::info!(
                    key = %key,
                    queued = frontier.queued_len(),
                    discovered = frontier.discovered_len(),
                    "resuming from checkpoint"
                );
                frontier
            }
            None => {
                tracing::info!(key = %key, seed = %seed, "starting fresh crawl");
                Frontier::seeded(seed.as_str())
            }
        };

        let (urls_tx, urls_rx) = mpsc::channel(self.concurrency * 4);
        let (results_tx, mut results_rx) = mpsc::channel(self.concurrency * 4);
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let stats = Statistics::default();

        let shutdown_watch = shutdown::watch(token.clone(), shutdown);
        self.launch_fetchers(
            &tracker,
            stats.clone(),
            fetcher,
            extractor,
            urls_rx,
            results_tx,
            token.clone(),
        );
        tracker.close();

        let result = self
            .drive(
                &key,
                &seed,
                &mut frontier,
                &urls_tx,
                &mut results_rx,
                output,
                &stats,
                &token,
            )
            .await;

        tracing::info!("crawler: control loop exited");

        // closing the channel lets the fetch workers drain and finish
        token.cancel();
        drop(urls_tx);
        tracker.wait().await;
        shutdown_watch.abort();

        let final_save = self.store.save(&key, &frontier.snapshot());
        stats.write_to_log(starting_time.elapsed());

        let state = result?;
        final_save?;
        Ok(CrawlSummary {
            state,
            pages_fetched: stats.num_fetches.load(Ordering::Relaxed),
            fetch_errors: stats.num_fetch_errors.load(Ordering::Relaxed),
            discovered: frontier.discovered_len(),
        })
    }

    /// The coordinator: sole owner of the frontier, the output sink, and the
    /// checkpoint store, so the dedup invariants need no locking.
    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        key: &str,
        seed_origin: &Url,
        frontier: &mut Frontier,
        urls_tx: &mpsc::Sender<String>,
        results_rx: &mut mpsc::Receiver<PageOutcome>,
        output: &mut OutputSink,
        stats: &Statistics,
        token: &CancellationToken,
    ) -> Result<CrawlState, CrawlError> {
        let mut in_flight: VecDeque<String> = VecDeque::new();

        loop {
            while in_flight.len() < self.concurrency && !token.is_cancelled() {
                let Some(url) = frontier.pop_next() else { break };
                in_flight.push_back(url.clone());
                if urls_tx.send(url).await.is_err() {
                    break;
                }
            }

            if in_flight.is_empty() {
                break;
            }

            let Some(outcome) = results_rx.recv().await else {
                break;
            };
            match outcome {
                PageOutcome::Aborted { page } => {
                    Self::retire(&mut in_flight, &page);
                    frontier.requeue_front(page);
                }
                PageOutcome::Failed { page } => {
                    Self::retire(&mut in_flight, &page);
                    self.store
                        .save(key, &frontier.snapshot_with_pending(&in_flight))?;
                }
                PageOutcome::Fetched { page, candidates } => {
                    Self::retire(&mut in_flight, &page);
                    self.commit_links(&page, candidates, seed_origin, frontier, output, stats)?;
                    self.store
                        .save(key, &frontier.snapshot_with_pending(&in_flight))?;
                }
            }
        }

        // anything still in flight goes back into the queue so the final
        // checkpoint keeps it
        while let Some(url) = in_flight.pop_back() {
            frontier.requeue_front(url);
        }

        Ok(if token.is_cancelled() {
            CrawlState::Cancelled
        } else {
            CrawlState::Done
        })
    }

    /// Resolves and filters one fetched page's candidate hrefs, queueing and
    /// emitting the ones that are new same-origin discoveries.
    fn commit_links(
        &self,
        page: &str,
        candidates: Vec<String>,
        seed_origin: &Url,
        frontier: &mut Frontier,
        output: &mut OutputSink,
        stats: &Statistics,
    ) -> Result<(), CrawlError> {
        // the queue only ever holds URLs that parsed once already
        let Ok(base) = Url::parse(page) else {
            return Ok(());
        };
        for href in candidates {
            let Some(link) = origin::resolve(&base, &href) else {
                continue;
            };
            if !origin::same_origin(&link, seed_origin) {
                continue;
            }
            let link = String::from(link);
            if frontier.enqueue_if_new(&link) && frontier.mark_discovered(&link) {
                stats.num_discoveries.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(url = %link, "discovered");
                output.push(&link)?;
            }
        }
        Ok(())
    }

    fn retire(in_flight: &mut VecDeque<String>, page: &str) {
        if let Some(pos) = in_flight.iter().position(|url| url == page) {
            in_flight.remove(pos);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn launch_fetchers<E: StdError + Send + 'static>(
        &self,
        tracker: &TaskTracker,
        stats: Statistics,
        fetcher: Arc<dyn Fetcher<Error = E>>,
        extractor: Arc<dyn LinkExtractor>,
        urls: mpsc::Receiver<String>,
        results_tx: mpsc::Sender<PageOutcome>,
        token: CancellationToken,
    ) {
        let concurrency = self.concurrency;
        let delay = self.delay;
        tracker.spawn(async move {
            tokio_stream::wrappers::ReceiverStream::new(urls)
                .for_each_concurrent(concurrency, |queued_url| async {
                    if token.is_cancelled() {
                        let _ = results_tx
                            .send(PageOutcome::Aborted { page: queued_url })
                            .await;
                        return;
                    }
                    let fetched = tokio::select! {
                        _ = token.cancelled() => None,
                        result = fetcher.fetch(&queued_url) => Some(result),
                    };
                    let outcome = match fetched {
                        None => PageOutcome::Aborted { page: queued_url },
                        Some(result) => {
                            stats.num_fetches.fetch_add(1, Ordering::SeqCst);
                            match result {
                                Err(err) => {
                                    stats.num_fetch_errors.fetch_add(1, Ordering::SeqCst);
                                    tracing::error!(url = %queued_url, "fetch error: {:?}", err);
                                    PageOutcome::Failed { page: queued_url }
                                }
                                Ok(body) => PageOutcome::Fetched {
                                    candidates: extractor.extract_links(&body),
                                    page: queued_url,
                                },
                            }
                        }
                    };
                    let _ = results_tx.send(outcome).await;
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                })
                .await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fmt;
    use std::future::pending;

    #[derive(Debug)]
    struct PageNotFound(String);

    impl fmt::Display for PageNotFound {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "no such page: {}", self.0)
        }
    }

    impl StdError for PageNotFound {}

    /// Serves canned bodies by URL; everything else is a fetch error.
    struct MapFetcher {
        pages: HashMap<String, String>,
    }

    #[async_trait::async_trait]
    impl Fetcher for MapFetcher {
        type Error = PageNotFound;

        async fn fetch(&self, url: &str) -> Result<String, PageNotFound> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| PageNotFound(url.to_owned()))
        }
    }

    /// Bodies in tests are just one candidate href per line.
    struct LineExtractor;

    impl LinkExtractor for LineExtractor {
        fn extract_links(&self, body: &str) -> Vec<String> {
            body.lines().map(str::to_owned).collect()
        }
    }

    fn crawler(dir: &std::path::Path) -> Crawler {
        Crawler::new(
            CheckpointStore::new(dir).unwrap(),
            CrawlerOptions::default(),
        )
    }

    #[tokio::test]
    async fn discovers_same_origin_links_only() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::NamedTempFile::new().unwrap();
        let pages = HashMap::from([(
            "http://example.com/".to_string(),
            "/about\nhttp://example.com/contact\nhttp://other.com/x\nmailto:a@b.com".to_string(),
        )]);

        let mut output = OutputSink::append(out.path()).unwrap();
        let summary = crawler(dir.path())
            .run(
                "http://example.com",
                Arc::new(MapFetcher { pages }),
                Arc::new(LineExtractor),
                &mut output,
                pending::<()>(),
            )
            .await
            .unwrap();

        assert_eq!(summary.state, CrawlState::Done);
        assert_eq!(summary.discovered, 2);
        // /about and /contact were queued, fetched, and failed; failures are
        // logged and skipped, never fatal
        assert_eq!(summary.pages_fetched, 3);
        assert_eq!(summary.fetch_errors, 2);

        let written = std::fs::read_to_string(out.path()).unwrap();
        assert_eq!(
            written,
            "http://example.com/about\nhttp://example.com/contact\n"
        );
    }

    #[tokio::test]
    async fn bare_host_seed_gets_the_default_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::NamedTempFile::new().unwrap();
        let pages = HashMap::from([(
            "https://example.com/".to_string(),
            "/about".to_string(),
        )]);

        let mut output = OutputSink::append(out.path()).unwrap();
        let summary = crawler(dir.path())
            .run(
                "example.com",
                Arc::new(MapFetcher { pages }),
                Arc::new(LineExtractor),
                &mut output,
                pending::<()>(),
            )
            .await
            .unwrap();

        assert_eq!(summary.discovered, 1);
        let written = std::fs::read_to_string(out.path()).unwrap();
        assert_eq!(written, "https://example.com/about\n");
    }

    #[tokio::test]
    async fn unparseable_seed_is_a_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::NamedTempFile::new().unwrap();
        let mut output = OutputSink::append(out.path()).unwrap();

        let err = crawler(dir.path())
            .run(
                "http://[bad",
                Arc::new(MapFetcher {
                    pages: HashMap::new(),
                }),
                Arc::new(LineExtractor),
                &mut output,
                pending::<()>(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::InvalidSeed { .. }));
    }

    #[tokio::test]
    async fn hostless_seed_is_a_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::NamedTempFile::new().unwrap();
        let mut output = OutputSink::append(out.path()).unwrap();

        let err = crawler(dir.path())
            .run(
                "file:///tmp/page.html",
                Arc::new(MapFetcher {
                    pages: HashMap::new(),
                }),
                Arc::new(LineExtractor),
                &mut output,
                pending::<()>(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CrawlError::SeedWithoutHost(_)));
    }

    #[tokio::test]
    async fn corrupt_checkpoint_aborts_startup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("example.com.json"), b"{garbage").unwrap();
        let out = tempfile::NamedTempFile::new().unwrap();
        let mut output = OutputSink::append(out.path()).unwrap();

        let err = crawler(dir.path())
            .run(
                "https://example.com",
                Arc::new(MapFetcher {
                    pages: HashMap::new(),
                }),
                Arc::new(LineExtractor),
                &mut output,
                pending::<()>(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CrawlError::Checkpoint(CheckpointError::Malformed { .. })
        ));
    }
}
