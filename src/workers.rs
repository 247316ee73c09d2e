//! Worker agents called by the supervisor
//!
//! Each worker is a thin wrapper over one data source. Price failures are
//! folded into the report summary; search workers return a `Result` so the
//! caller can tell an empty search from a failed one.

use crate::models::{SearchHit, StockPriceReport};
use crate::search::{self, SearchQuery, WebSearch};
use crate::yahoo::MarketData;
use crate::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

pub struct StockPriceAgent {
    market: Arc<dyn MarketData>,
}

impl StockPriceAgent {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }

    /// Daily prices from `start` up to, but not including, `end_exclusive`.
    /// Never fails: problems are described in the summary.
    pub async fn get_stock_prices(
        &self,
        ticker: &str,
        start: Option<NaiveDate>,
        end_exclusive: Option<NaiveDate>,
    ) -> StockPriceReport {
        let ticker = ticker.trim();
        let (Some(start), Some(end_exclusive)) = (start, end_exclusive) else {
            return missing_input();
        };
        if ticker.is_empty() {
            return missing_input();
        }

        match self.market.daily_prices(ticker, start, end_exclusive).await {
            Ok(data) if data.is_empty() => StockPriceReport {
                data,
                summary: "No stock price data found for the period.".to_string(),
                error: None,
            },
            Ok(data) => {
                info!(ticker = %ticker, days = data.len(), "Stock prices fetched");
                let summary = format!(
                    "Successfully fetched {} days of stock price data for {} from {} up to (but not including) {}.",
                    data.len(),
                    ticker,
                    start.format("%Y-%m-%d"),
                    end_exclusive.format("%Y-%m-%d")
                );
                StockPriceReport {
                    data,
                    summary,
                    error: None,
                }
            }
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "Stock price fetch failed");
                StockPriceReport {
                    data: Vec::new(),
                    summary: format!(
                        "An error occurred while fetching stock price data for {}: {}",
                        ticker, e
                    ),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

fn missing_input() -> StockPriceReport {
    StockPriceReport {
        data: Vec::new(),
        summary: "Ticker symbol, start date, or end date missing.".to_string(),
        error: None,
    }
}

async fn run_search(
    search: &dyn WebSearch,
    query: SearchQuery,
    what: &'static str,
) -> Result<Vec<SearchHit>> {
    match search.text(&query).await {
        Ok(hits) => {
            info!(kind = what, hits = hits.len(), "Search worker finished");
            Ok(hits)
        }
        Err(e) => {
            warn!(kind = what, query = %query.text, error = %e, "Search worker failed");
            Err(e)
        }
    }
}

pub struct FinancialReportAgent {
    search: Arc<dyn WebSearch>,
}

impl FinancialReportAgent {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }

    pub async fn get_financial_reports(
        &self,
        company: &str,
        ticker: &str,
        year: &str,
    ) -> Result<Vec<SearchHit>> {
        let query = search::financial_reports_query(company, ticker, year);
        run_search(self.search.as_ref(), query, "financial_reports").await
    }
}

pub struct CompanyNewsAgent {
    search: Arc<dyn WebSearch>,
}

impl CompanyNewsAgent {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }

    pub async fn get_company_news(
        &self,
        company: &str,
        ticker: &str,
        period_description: &str,
    ) -> Result<Vec<SearchHit>> {
        let query = search::company_news_query(company, ticker, period_description);
        run_search(self.search.as_ref(), query, "company_news").await
    }
}

pub struct MarketNewsAgent {
    search: Arc<dyn WebSearch>,
}

impl MarketNewsAgent {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }

    /// `year` and `month` are informational; `period_description` drives the query.
    pub async fn get_market_news(
        &self,
        year: &str,
        month: &str,
        period_description: &str,
    ) -> Result<Vec<SearchHit>> {
        info!(year = %year, month = %month, "Searching market news");
        let query = search::market_news_query(period_description);
        run_search(self.search.as_ref(), query, "market_news").await
    }
}

/// Free-form news search restricted to a date range.
pub async fn search_news(
    search: &dyn WebSearch,
    query: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<SearchHit>> {
    let query = search::dated_news_query(query, start, end);
    run_search(search, query, "news").await
}

/// News about one ticker for the week starting at `monday`.
pub async fn weekly_ticker_news(
    search: &dyn WebSearch,
    ticker: &str,
    monday: NaiveDate,
) -> Result<Vec<SearchHit>> {
    let query = search::weekly_ticker_news_query(&ticker.trim().to_uppercase(), monday);
    run_search(search, query, "weekly_news").await
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory doubles for the market data and search seams.

    use super::*;
    use crate::error::AgentError;
    use crate::models::DailyPrice;
    use crate::yahoo::{QuoteData, TickerValidation};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockMarket {
        pub quotes: Vec<QuoteData>,
        pub prices: Vec<DailyPrice>,
        pub fail_prices: bool,
        pub fail_validation: bool,
    }

    impl MockMarket {
        pub fn with_quote(symbol: &str, long_name: Option<&str>) -> Self {
            Self {
                quotes: vec![QuoteData {
                    symbol: symbol.to_string(),
                    long_name: long_name.map(str::to_string),
                    short_name: None,
                    regular_market_price: Some(100.0),
                    currency: Some("USD".to_string()),
                }],
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl MarketData for MockMarket {
        async fn validate_ticker(&self, ticker: &str) -> TickerValidation {
            if self.fail_validation {
                return TickerValidation::Failed {
                    message: "HTTP 503".to_string(),
                };
            }
            match self.quotes.iter().find(|q| q.symbol == ticker) {
                Some(q) => TickerValidation::Valid(q.clone()),
                None => TickerValidation::NotFound {
                    ticker: ticker.to_string(),
                },
            }
        }

        async fn financial_summary(&self, ticker: &str) -> Result<Value> {
            if self.quotes.iter().any(|q| q.symbol == ticker) {
                Ok(json!({ "earnings": { "financialCurrency": "USD" } }))
            } else {
                Err(AgentError::NotFound("No summary data".to_string()))
            }
        }

        async fn daily_prices(
            &self,
            _ticker: &str,
            _start: NaiveDate,
            _end_exclusive: NaiveDate,
        ) -> Result<Vec<DailyPrice>> {
            if self.fail_prices {
                return Err(AgentError::Transport("HTTP 500".to_string()));
            }
            Ok(self.prices.clone())
        }
    }

    /// Returns `hits` for every query, or fails when `fail_on` matches the query.
    #[derive(Default)]
    pub struct MockSearch {
        pub hits: Vec<SearchHit>,
        pub fail_on: Option<&'static str>,
        pub queries: Mutex<Vec<SearchQuery>>,
    }

    impl MockSearch {
        pub fn with_hits(n: usize) -> Self {
            Self {
                hits: (0..n).map(hit).collect(),
                ..Default::default()
            }
        }

        pub fn recorded(&self) -> Vec<SearchQuery> {
            self.queries.lock().map(|q| q.clone()).unwrap_or_default()
        }
    }

    pub fn hit(i: usize) -> SearchHit {
        SearchHit {
            title: format!("Story {}", i),
            url: format!("https://news.example.com/{}", i),
            summary: "Shares gain on strong demand".to_string(),
        }
    }

    pub fn bar(date: &str, close: f64) -> DailyPrice {
        DailyPrice {
            date: date.to_string(),
            open: close - 1.0,
            close,
            high: close + 1.0,
            low: close - 2.0,
            volume: Some(1_000_000),
        }
    }

    #[async_trait]
    impl WebSearch for MockSearch {
        async fn text(&self, query: &SearchQuery) -> Result<Vec<SearchHit>> {
            if let Ok(mut q) = self.queries.lock() {
                q.push(query.clone());
            }
            if let Some(needle) = self.fail_on {
                if query.text.contains(needle) {
                    return Err(AgentError::Transport("rate limited".to_string()));
                }
            }
            Ok(self.hits.iter().take(query.max_results).cloned().collect())
        }
    }
}
