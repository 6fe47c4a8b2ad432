//! Web search over DuckDuckGo's HTML endpoint. No API key needed.

use std::sync::LazyLock;

use anyhow::{Result, bail};
use async_trait::async_trait;
use regex::Regex;

use super::Tool;

const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const DEFAULT_MAX_RESULTS: usize = 5;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; crewline/0.1)";

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

pub struct SearchTool {
    client: reqwest::Client,
    endpoint: String,
    max_results: usize,
}

impl SearchTool {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// Point the tool at a different HTML endpoint (mirrors, tests).
    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            max_results: DEFAULT_MAX_RESULTS,
        })
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "Search"
    }

    fn description(&self) -> &str {
        "Search the internet for current information. Input: {\"query\": \"<search terms>\"}. Returns titles, snippets and URLs."
    }

    async fn execute(&self, query: &str) -> Result<String> {
        let query = query.trim();
        if query.is_empty() {
            bail!("empty search query");
        }

        let url = format!("{}?q={}", self.endpoint, urlencoding::encode(query));
        tracing::debug!(%url, "searching");

        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            bail!("search endpoint returned {}", resp.status());
        }
        let html = resp.text().await?;

        let results = extract_results(&html, self.max_results);
        if results.is_empty() {
            Ok(format!("No results found for: {query}"))
        } else {
            Ok(results.join("\n\n"))
        }
    }
}

/// Pull `title / snippet / url` triples out of a DuckDuckGo result page.
fn extract_results(html: &str, limit: usize) -> Vec<String> {
    html.split("class=\"result__body\"")
        .skip(1)
        .filter_map(|chunk| {
            let title = field(chunk, "result__a")?;
            let snippet = field(chunk, "result__snippet").unwrap_or_default();
            let url = field(chunk, "result__url").unwrap_or_default();
            Some(format!(
                "Title: {}\nSnippet: {}\nURL: {}",
                html_decode(&title),
                html_decode(&snippet),
                url.trim()
            ))
        })
        .take(limit)
        .collect()
}

/// Text content of the element carrying `class="<class>"`, inner markup
/// (DuckDuckGo bolds matched terms) stripped.
fn field(chunk: &str, class: &str) -> Option<String> {
    let body = chunk
        .split(&format!("class=\"{class}\""))
        .nth(1)?
        .split_once('>')?
        .1;
    let end = ["</a>", "</div>", "</span>"]
        .iter()
        .filter_map(|close| body.find(*close))
        .min()
        .unwrap_or(body.len());
    let text = TAG.replace_all(&body[..end], "");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

// `&amp;` last, so escaped entities decode exactly once.
fn html_decode(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
