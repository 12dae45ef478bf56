use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::mcp::error::{BackendError, BackendResult};
use crate::shared::config::WebSearchConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

static RESULT_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)
        .expect("valid result link pattern")
});

static RESULT_SNIPPET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#)
        .expect("valid snippet pattern")
});

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));

/// HTML search page scraper.
pub struct WebSearch {
    http: Client,
    config: WebSearchConfig,
}

impl WebSearch {
    pub fn new(config: WebSearchConfig) -> BackendResult<Self> {
        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    /// No OS permission is involved, so there is nothing to probe.
    pub fn connect(config: WebSearchConfig) -> BackendResult<Self> {
        Self::new(config)
    }

    pub async fn search(&self, query: &str) -> BackendResult<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(BackendError::Rejected("query must not be empty".to_string()));
        }
        debug!("Web search for {:?}", query);
        let resp = self
            .http
            .get(&self.config.endpoint)
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?;
        let html = resp.text().await?;
        Ok(parse_results(&html, self.config.max_results))
    }
}

/// Scrape result links and snippets from a search results page. Snippets
/// are paired with links by position.
fn parse_results(html: &str, max: usize) -> Vec<SearchResult> {
    let snippets: Vec<String> = RESULT_SNIPPET
        .captures_iter(html)
        .map(|c| clean_text(&c[1]))
        .collect();

    RESULT_LINK
        .captures_iter(html)
        .enumerate()
        .filter_map(|(i, c)| {
            let url = resolve_link(&c[1])?;
            let title = clean_text(&c[2]);
            if title.is_empty() {
                return None;
            }
            Some(SearchResult {
                title,
                url,
                snippet: snippets.get(i).cloned().unwrap_or_default(),
            })
        })
        .take(max)
        .collect()
}

/// Undo the search engine's redirect wrapper (`/l/?uddg=<target>`).
fn resolve_link(href: &str) -> Option<String> {
    let href = decode_entities(href);
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href
    };
    let parsed = Url::parse(&absolute).ok()?;
    if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
        return Some(target.into_owned());
    }
    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}

fn clean_text(fragment: &str) -> String {
    let stripped = TAG.replace_all(fragment, "");
    decode_entities(stripped.trim())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
<div class="result">
  <h2><a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc">The <b>Rust</b> Programming Language</a></h2>
  <a class="result__snippet" href="#">A language empowering <b>everyone</b> &amp; more.</a>
</div>
<div class="result">
  <h2><a rel="nofollow" class="result__a" href="https://doc.rust-lang.org/book/">The Book</a></h2>
  <a class="result__snippet" href="#">Learn Rust.</a>
</div>
<div class="result">
  <h2><a rel="nofollow" class="result__a" href="javascript:void(0)">Ad</a></h2>
</div>"##;

    #[test]
    fn test_parse_results_unwraps_redirects() {
        let results = parse_results(PAGE, 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "The Rust Programming Language");
        assert_eq!(results[0].url, "https://www.rust-lang.org/");
        assert_eq!(results[0].snippet, "A language empowering everyone & more.");
        assert_eq!(results[1].url, "https://doc.rust-lang.org/book/");
    }

    #[test]
    fn test_parse_results_respects_max() {
        assert_eq!(parse_results(PAGE, 1).len(), 1);
        assert!(parse_results("<html></html>", 5).is_empty());
    }
}
