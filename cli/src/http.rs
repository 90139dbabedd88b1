use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use linkharvest::Fetcher;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;

/// Browser-like user agents, rotated across requests.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
];

/// `Fetcher` backed by a shared reqwest client. Non-2xx statuses are fetch
/// errors like any network failure.
pub struct HttpFetcher {
    client: Client,
    next_agent: AtomicUsize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            next_agent: AtomicUsize::new(0),
        })
    }

    fn user_agent(&self) -> &'static str {
        let next = self.next_agent.fetch_add(1, Ordering::Relaxed);
        USER_AGENTS[next % USER_AGENTS.len()]
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    type Error = reqwest::Error;

    async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        self.client
            .get(url)
            .header(USER_AGENT, self.user_agent())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}
