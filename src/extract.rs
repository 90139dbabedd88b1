/// Pulls candidate hrefs out of a page body. The candidates are raw strings;
/// resolving them against the page URL and filtering them by origin is the
/// crawl loop's job.
pub trait LinkExtractor: Send + Sync {
    fn extract_links(&self, body: &str) -> Vec<String>;
}
