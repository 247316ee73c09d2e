//! Web search for reports and news
//!
//! DuckDuckGo's HTML endpoint is scraped for result blocks. Callers get a
//! `Result`, so "no results" and "search failed" stay distinguishable.

use crate::config::Settings;
use crate::error::AgentError;
use crate::models::SearchHit;
use crate::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use reqwest::Client;
use std::time::Duration as StdDuration;
use tracing::{debug, info};

pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const WEEKLY_NEWS_MAX_RESULTS: usize = 10;
pub const WORLDWIDE_REGION: &str = "wt-wt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub max_results: usize,
    pub region: Option<String>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            max_results: DEFAULT_MAX_RESULTS,
            region: None,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Search seam used by the workers and the news tools.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn text(&self, query: &SearchQuery) -> Result<Vec<SearchHit>>;
}

pub struct DuckDuckGoSearch {
    client: Client,
    base_url: String,
}

impl DuckDuckGoSearch {
    pub fn new(base_url: impl Into<String>, timeout: StdDuration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(StdDuration::from_secs(60))
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .user_agent("Mozilla/5.0")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.search_base_url.clone(), settings.http_timeout)
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn text(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let mut url = format!(
            "{}/html/?q={}",
            self.base_url,
            urlencoding::encode(&query.text)
        );
        if let Some(region) = &query.region {
            url.push_str(&format!("&kl={}", urlencoding::encode(region)));
        }

        debug!(query = %query.text, "Web search request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AgentError::Transport(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Transport(format!("HTTP {}", status.as_u16())));
        }

        let html = response
            .text()
            .await
            .map_err(|e| AgentError::Transport(format!("Search body unreadable: {}", e)))?;

        let hits = extract_results(&html, query.max_results);
        info!(query = %query.text, hits = hits.len(), "Web search complete");
        Ok(hits)
    }
}

/// Extract up to `limit` results from a DuckDuckGo HTML page.
pub fn extract_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let mut results = Vec::new();

    for chunk in html.split("result__body").skip(1) {
        if results.len() >= limit {
            break;
        }

        let Some(title) = tag_text(chunk, "result__a") else {
            continue;
        };
        let Some(href) = tag_attr(chunk, "result__a", "href") else {
            continue;
        };

        // Sponsored blocks link through the ad redirector
        if href.contains("duckduckgo.com/y.js") {
            continue;
        }

        let url = resolve_link(&href);
        if title.is_empty() || url.is_empty() {
            continue;
        }

        let summary = tag_text(chunk, "result__snippet").unwrap_or_default();

        results.push(SearchHit {
            title,
            url,
            summary,
        });
    }

    results
}

/// Text content of the element whose class attribute contains `class`.
fn tag_text(chunk: &str, class: &str) -> Option<String> {
    let marker = chunk.find(class)?;
    let open_end = marker + chunk[marker..].find('>')? + 1;
    let rest = &chunk[open_end..];
    let close = rest.find("</a>").or_else(|| rest.find("</"))?;

    Some(html_decode(&strip_tags(&rest[..close])).trim().to_string())
}

fn tag_attr(chunk: &str, class: &str, attr: &str) -> Option<String> {
    let marker = chunk.find(class)?;
    let tag_start = chunk[..marker].rfind('<')?;
    let tag_end = marker + chunk[marker..].find('>')?;
    let tag = &chunk[tag_start..tag_end];

    let needle = format!("{}=\"", attr);
    let value_start = tag.find(&needle)? + needle.len();
    let value_len = tag[value_start..].find('"')?;

    Some(html_decode(&tag[value_start..value_start + value_len]))
}

/// Unwrap DuckDuckGo's `/l/?uddg=` redirect into the target URL.
fn resolve_link(href: &str) -> String {
    if let Some(pos) = href.find("uddg=") {
        let encoded = href[pos + 5..].split('&').next().unwrap_or_default();
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }

    if let Some(stripped) = href.strip_prefix("//") {
        return format!("https://{}", stripped);
    }

    href.to_string()
}

fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    // `&amp;` last, so `&amp;lt;` stays `&lt;`
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

//
// ================= Query builders =================
//

pub fn financial_reports_query(company: &str, ticker: &str, year: &str) -> SearchQuery {
    SearchQuery::new(format!(
        "{company} OR {ticker} financial results {year} OR earnings report {year} OR annual report {year} investor relations {year}"
    ))
}

/// Routine filings are excluded so the results lean towards news.
pub fn company_news_query(company: &str, ticker: &str, period_description: &str) -> SearchQuery {
    SearchQuery::new(format!(
        "{company} OR {ticker} company news {period_description} -\"earnings report\" -\"financial results\" -\"annual report\""
    ))
}

pub fn market_news_query(period_description: &str) -> SearchQuery {
    SearchQuery::new(format!(
        "financial market news {p} OR stock market outlook {p} OR economic trends {p}",
        p = period_description
    ))
    .with_region(WORLDWIDE_REGION)
}

/// `"{query} YYYY-MM-DD..YYYY-MM-DD"`
pub fn dated_news_query(query: &str, start: NaiveDate, end: NaiveDate) -> SearchQuery {
    SearchQuery::new(format!(
        "{} {}..{}",
        query,
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    ))
}

/// Monday through Sunday of the given week.
pub fn weekly_ticker_news_query(ticker: &str, monday: NaiveDate) -> SearchQuery {
    let sunday = monday + Duration::days(6);
    dated_news_query(&format!("{} stock news", ticker), monday, sunday)
        .with_max_results(WEEKLY_NEWS_MAX_RESULTS)
        .with_region(WORLDWIDE_REGION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r##"
<div class="serp__results">
  <div class="result results_links results_links_deep result--ad">
    <div class="links_main links_deep result__body">
      <h2 class="result__title"><a rel="nofollow" class="result__a" href="https://duckduckgo.com/y.js?ad_domain=x">Buy stocks now</a></h2>
      <a class="result__snippet" href="#">Sponsored</a>
    </div>
  </div>
  <div class="result results_links results_links_deep web-result">
    <div class="links_main links_deep result__body">
      <h2 class="result__title">
        <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Finvestor.apple.com%2Fq3&amp;rut=abc">Apple <b>Reports</b> Q3 Results</a>
      </h2>
      <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">Revenue &amp; earnings <b>beat</b> estimates.</a>
    </div>
  </div>
  <div class="result results_links results_links_deep web-result">
    <div class="links_main links_deep result__body">
      <h2 class="result__title">
        <a rel="nofollow" class="result__a" href="https://example.com/news">Second story</a>
      </h2>
    </div>
  </div>
</div>
"##;

    #[test]
    fn test_extract_results() {
        let hits = extract_results(PAGE, 5);
        assert_eq!(hits.len(), 2);

        assert_eq!(hits[0].title, "Apple Reports Q3 Results");
        assert_eq!(hits[0].url, "https://investor.apple.com/q3");
        assert_eq!(hits[0].summary, "Revenue & earnings beat estimates.");

        assert_eq!(hits[1].url, "https://example.com/news");
        assert_eq!(hits[1].summary, "");
    }

    #[test]
    fn test_extract_results_truncates() {
        assert_eq!(extract_results(PAGE, 1).len(), 1);
        assert!(extract_results("<html>no results</html>", 5).is_empty());
    }

    #[test]
    fn test_html_decode_single_pass() {
        assert_eq!(html_decode("a &amp;lt; b"), "a &lt; b");
        assert_eq!(html_decode("P&amp;G &lt;up&gt; &#39;24"), "P&G <up> '24");
    }

    #[test]
    fn test_query_builders() {
        let q = company_news_query("Tesla", "TSLA", "the week of 2023-10-16 to 2023-10-20");
        assert!(q.text.starts_with("Tesla OR TSLA company news the week of 2023-10-16"));
        assert!(q.text.contains("-\"earnings report\""));
        assert_eq!(q.max_results, 5);

        let q = market_news_query("July 2023");
        assert_eq!(q.region.as_deref(), Some("wt-wt"));
        assert!(q.text.contains("stock market outlook July 2023"));

        let q = financial_reports_query("Apple Inc.", "AAPL", "2022");
        assert!(q.text.contains("annual report 2022 investor relations 2022"));

        let monday = NaiveDate::from_ymd_opt(2023, 10, 16).unwrap();
        let q = weekly_ticker_news_query("NVDA", monday);
        assert_eq!(q.text, "NVDA stock news 2023-10-16..2023-10-22");
        assert_eq!(q.max_results, 10);
    }

    #[tokio::test]
    async fn test_search_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .and(query_param("q", "apple earnings"))
            .and(query_param("kl", "wt-wt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let search = DuckDuckGoSearch::new(server.uri(), StdDuration::from_secs(5)).unwrap();
        let hits = search
            .text(&SearchQuery::new("apple earnings").with_region("wt-wt"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_search_http_error_is_err() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let search = DuckDuckGoSearch::new(server.uri(), StdDuration::from_secs(5)).unwrap();
        let err = search.text(&SearchQuery::new("anything")).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 429"));
    }
}
