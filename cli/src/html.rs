use linkharvest::LinkExtractor;
use scraper::{Html, Selector};

/// Pulls `a[href]` values out of a page. Fragment-only anchors and
/// non-navigational schemes are skipped up front; origin filtering is the
/// crawler's job.
pub struct HtmlLinkExtractor {
    selector: Selector,
}

impl HtmlLinkExtractor {
    pub fn new() -> Self {
        Self {
            selector: Selector::parse("a[href]").unwrap(),
        }
    }
}

impl Default for HtmlLinkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkExtractor for HtmlLinkExtractor {
    fn extract_links(&self, body: &str) -> Vec<String> {
        let document = Html::parse_document(body);
        document
            .select(&self.selector)
            .filter_map(|element| element.value().attr("href"))
            .filter(|href| {
                !href.starts_with('#')
                    && !href.starts_with("mailto:")
                    && !href.starts_with("tel:")
                    && !href.starts_with("javascript:")
            })
            .map(str::to_owned)
            .collect()
    }
}
