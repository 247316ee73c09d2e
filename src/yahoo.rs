//! Yahoo Finance client
//!
//! One GET per call against the public `query1` endpoints. Uses a
//! long-lived reqwest::Client with a fixed per-request timeout.

use crate::config::Settings;
use crate::error::AgentError;
use crate::models::DailyPrice;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; finance-qa-agents/0.1)";
const SUMMARY_MODULES: &[&str] = &["earnings", "defaultKeyStatistics"];

/// Quote fields we read back from `/v7/finance/quote`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuoteData {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regular_market_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl QuoteData {
    /// longName, then shortName, then the symbol itself.
    pub fn display_name(&self) -> String {
        non_blank(&self.long_name)
            .or_else(|| non_blank(&self.short_name))
            .unwrap_or(self.symbol.as_str())
            .to_string()
    }
}

fn non_blank(name: &Option<String>) -> Option<&str> {
    name.as_deref().filter(|s| !s.trim().is_empty())
}

/// Outcome of a ticker check. Never an `Err`: transport and parse failures
/// land in `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum TickerValidation {
    Valid(QuoteData),
    NotFound { ticker: String },
    Failed { message: String },
}

/// Market data seam used by the supervisor and the finance tools.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn validate_ticker(&self, ticker: &str) -> TickerValidation;

    async fn financial_summary(&self, ticker: &str) -> Result<Value>;

    /// Daily bars from `start` up to, but not including, `end_exclusive`.
    async fn daily_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<Vec<DailyPrice>>;
}

pub struct YahooFinanceClient {
    client: Client,
    base_url: String,
}

impl YahooFinanceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.yahoo_base_url.clone(), settings.http_timeout)
    }

    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!(url = %url, "Yahoo Finance request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AgentError::Transport(format!("Yahoo Finance request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Transport(format!("HTTP {}", status.as_u16())));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AgentError::UnexpectedResponse(format!("Yahoo Finance JSON: {}", e)))
    }
}

#[async_trait]
impl MarketData for YahooFinanceClient {
    async fn validate_ticker(&self, ticker: &str) -> TickerValidation {
        let ticker = ticker.trim();
        if ticker.is_empty() {
            return TickerValidation::NotFound {
                ticker: String::new(),
            };
        }

        let path = format!("/v7/finance/quote?symbols={}", urlencoding::encode(ticker));

        match self.get_json::<QuoteEnvelope>(&path).await {
            Ok(envelope) => match envelope.quote_response.result.into_iter().next() {
                Some(quote) => {
                    info!(ticker = %ticker, name = %quote.display_name(), "Ticker validated");
                    TickerValidation::Valid(quote)
                }
                None => {
                    info!(ticker = %ticker, "Ticker not found");
                    TickerValidation::NotFound {
                        ticker: ticker.to_string(),
                    }
                }
            },
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "Ticker validation failed");
                TickerValidation::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    async fn financial_summary(&self, ticker: &str) -> Result<Value> {
        let path = format!(
            "/v10/finance/quoteSummary/{}?modules={}",
            urlencoding::encode(ticker.trim()),
            SUMMARY_MODULES.join(",")
        );

        let envelope: SummaryEnvelope = self.get_json(&path).await?;

        envelope
            .quote_summary
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| AgentError::NotFound("No summary data".to_string()))
    }

    async fn daily_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<Vec<DailyPrice>> {
        // The exchange's zone is unknown until the response arrives, so ask
        // for a day either side and filter on exchange-local dates below.
        let day = ChronoDuration::days(1);
        let period1 = utc_midnight(start.checked_sub_signed(day).unwrap_or(start));
        let period2 = utc_midnight(end_exclusive.checked_add_signed(day).unwrap_or(end_exclusive));

        let path = format!(
            "/v8/finance/chart/{}?period1={}&period2={}&interval=1d",
            urlencoding::encode(ticker.trim()),
            period1,
            period2
        );

        let envelope: ChartEnvelope = self.get_json(&path).await?;

        if let Some(error) = envelope.chart.error.filter(|e| !e.is_null()) {
            let description = error
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(AgentError::NotFound(description));
        }

        let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
            return Ok(Vec::new());
        };

        let prices = bars_from_chart(&result, start, end_exclusive);
        debug!(ticker = %ticker, bars = prices.len(), "Chart parsed");
        Ok(prices)
    }
}

fn utc_midnight(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

/// Only complete OHLC rows whose exchange-local date falls in
/// `[start, end_exclusive)` become bars.
fn bars_from_chart(result: &ChartResult, start: NaiveDate, end_exclusive: NaiveDate) -> Vec<DailyPrice> {
    let Some(timestamps) = result.timestamp.as_ref() else {
        return Vec::new();
    };
    let Some(quote) = result.indicators.quote.first() else {
        return Vec::new();
    };

    timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let date = result.meta.local_date(ts)?;
            if date < start || date >= end_exclusive {
                return None;
            }
            let open = quote.open.get(i).copied().flatten()?;
            let high = quote.high.get(i).copied().flatten()?;
            let low = quote.low.get(i).copied().flatten()?;
            let close = quote.close.get(i).copied().flatten()?;
            let volume = quote.volume.get(i).copied().flatten();

            Some(DailyPrice {
                date: date.format("%Y-%m-%d").to_string(),
                open,
                close,
                high,
                low,
                volume,
            })
        })
        .collect()
}

// Yahoo Finance response structures

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(rename = "quoteResponse")]
    quote_response: QuoteResponse,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryResponse,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    result: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartResponse,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    exchange_timezone_name: Option<String>,
    /// Seconds east of UTC at the time of the request.
    #[serde(default)]
    gmtoffset: Option<i32>,
}

impl ChartMeta {
    /// Calendar date of `ts` on the exchange. The IANA zone wins over the
    /// fixed offset since it follows daylight saving per bar.
    fn local_date(&self, ts: i64) -> Option<NaiveDate> {
        let utc = DateTime::from_timestamp(ts, 0)?;

        if let Some(tz) = self
            .exchange_timezone_name
            .as_deref()
            .and_then(|name| name.parse::<Tz>().ok())
        {
            return Some(utc.with_timezone(&tz).date_naive());
        }

        let offset = FixedOffset::east_opt(self.gmtoffset.unwrap_or(0))?;
        Some(utc.with_timezone(&offset).date_naive())
    }
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> YahooFinanceClient {
        YahooFinanceClient::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_validate_ticker_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .and(query_param("symbols", "AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteResponse": {
                    "result": [{
                        "symbol": "AAPL",
                        "longName": "Apple Inc.",
                        "shortName": "Apple",
                        "regularMarketPrice": 190.5,
                        "currency": "USD"
                    }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        match client.validate_ticker("AAPL").await {
            TickerValidation::Valid(quote) => {
                assert_eq!(quote.symbol, "AAPL");
                assert_eq!(quote.display_name(), "Apple Inc.");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validate_ticker_empty_result_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteResponse": { "result": [], "error": null }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert_eq!(
            client.validate_ticker("ZZZZ").await,
            TickerValidation::NotFound {
                ticker: "ZZZZ".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_validate_ticker_http_error_and_bad_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .and(query_param("symbols", "DOWN"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v7/finance/quote"))
            .and(query_param("symbols", "ODD"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;

        match client.validate_ticker("DOWN").await {
            TickerValidation::Failed { message } => assert!(message.contains("HTTP 503")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            client.validate_ticker("ODD").await,
            TickerValidation::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_validate_ticker_unreachable_host() {
        // Nothing listens on port 9 locally
        let client = YahooFinanceClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert!(matches!(
            client.validate_ticker("AAPL").await,
            TickerValidation::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_financial_summary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/MSFT"))
            .and(query_param("modules", "earnings,defaultKeyStatistics"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteSummary": {
                    "result": [{ "earnings": { "financialCurrency": "USD" } }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/NONE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "quoteSummary": { "result": null, "error": { "code": "Not Found" } }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let summary = client.financial_summary("MSFT").await.unwrap();
        assert_eq!(summary["earnings"]["financialCurrency"], "USD");

        let err = client.financial_summary("NONE").await.unwrap_err();
        assert!(err.to_string().contains("No summary data"));
    }

    #[tokio::test]
    async fn test_daily_prices_skips_incomplete_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .and(query_param("interval", "1d"))
            .and(query_param("period1", "1688860800"))
            .and(query_param("period2", "1689465600"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chart": {
                    "result": [{
                        "meta": { "exchangeTimezoneName": "America/New_York", "gmtoffset": -14400 },
                        "timestamp": [1688995800, 1689082200, 1689168600],
                        "indicators": { "quote": [{
                            "open":   [189.2, 189.1, null],
                            "high":   [189.9, 189.9, 191.7],
                            "low":    [187.0, 187.3, 189.2],
                            "close":  [188.6, 188.1, 189.8],
                            "volume": [59922200, 46638100, 60750200]
                        }]}
                    }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let start = NaiveDate::from_ymd_opt(2023, 7, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 7, 15).unwrap();
        let prices = client.daily_prices("AAPL", start, end).await.unwrap();

        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].date, "2023-07-10");
        assert_eq!(prices[0].close, 188.6);
        assert_eq!(prices[1].date, "2023-07-11");
        assert_eq!(prices[1].volume, Some(46638100));
    }

    #[tokio::test]
    async fn test_daily_prices_use_exchange_dates() {
        // Sydney bars open the previous evening in UTC.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/BHP.AX"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chart": {
                    "result": [{
                        "meta": { "exchangeTimezoneName": "Australia/Sydney", "gmtoffset": 39600 },
                        "timestamp": [1704409200, 1704668400, 1704754800],
                        "indicators": { "quote": [{
                            "open":   [44.1, 44.5, 44.9],
                            "high":   [44.8, 45.2, 45.3],
                            "low":    [43.9, 44.2, 44.4],
                            "close":  [44.6, 45.0, 44.7],
                            "volume": [8100000, 7400000, 6900000]
                        }]}
                    }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let start = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 13).unwrap();
        let prices = client.daily_prices("BHP.AX", start, end).await.unwrap();

        let dates: Vec<&str> = prices.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-08", "2024-01-09"]);
        assert_eq!(prices[0].close, 45.0);
    }

    #[test]
    fn test_local_date_falls_back_to_gmtoffset() {
        let meta = ChartMeta {
            exchange_timezone_name: None,
            gmtoffset: Some(39600),
        };
        assert_eq!(
            meta.local_date(1704668400),
            NaiveDate::from_ymd_opt(2024, 1, 8)
        );
        assert_eq!(
            ChartMeta::default().local_date(1704668400),
            NaiveDate::from_ymd_opt(2024, 1, 7)
        );
    }

    #[tokio::test]
    async fn test_daily_prices_chart_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/BOGUS"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chart": {
                    "result": null,
                    "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
                }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let start = NaiveDate::from_ymd_opt(2023, 7, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 7, 15).unwrap();
        let err = client.daily_prices("BOGUS", start, end).await.unwrap_err();
        assert!(err.to_string().contains("delisted"));
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut quote = QuoteData {
            symbol: "XYZ".to_string(),
            long_name: None,
            short_name: Some("Xyz Corp".to_string()),
            regular_market_price: None,
            currency: None,
        };
        assert_eq!(quote.display_name(), "Xyz Corp");
        quote.long_name = Some("  ".to_string());
        assert_eq!(quote.display_name(), "Xyz Corp");
        quote.long_name = Some("Xyz Corporation".to_string());
        assert_eq!(quote.display_name(), "Xyz Corporation");
        quote.long_name = None;
        quote.short_name = None;
        assert_eq!(quote.display_name(), "XYZ");
    }
}
