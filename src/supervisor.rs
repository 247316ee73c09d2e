//! Weekly stock analysis supervisor
//!
//! Resolves a ticker, calls the workers one after another and assembles a
//! single [`AnalysisReport`]. A failing worker never aborts the run; its
//! failure is recorded in its own section and mentioned in the summary.

use crate::dates::{parse_week_input, AnalysisWindow};
use crate::error::AgentError;
use crate::models::{
    AnalysisPeriod, AnalysisReport, LinkSection, SearchHit, StockPriceReport, TickerInfo,
};
use crate::search::WebSearch;
use crate::sentiment::SentimentAnalyzer;
use crate::workers::{CompanyNewsAgent, FinancialReportAgent, MarketNewsAgent, StockPriceAgent};
use crate::yahoo::{MarketData, TickerValidation};
use crate::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

pub const TICKER_PROMPT: &str = "Enter the ticker symbol to analyze (e.g. AAPL, MSFT): ";
pub const WEEK_PROMPT: &str =
    "Enter the week to analyze (0 = this week, 1 = last week, 2 = two weeks ago, or YYYY-MM-DD): ";

pub struct Supervisor {
    market: Arc<dyn MarketData>,
    stock_prices: StockPriceAgent,
    financial_reports: FinancialReportAgent,
    company_news: CompanyNewsAgent,
    market_news: MarketNewsAgent,
}

impl Supervisor {
    pub fn new(market: Arc<dyn MarketData>, search: Arc<dyn WebSearch>) -> Self {
        Self {
            stock_prices: StockPriceAgent::new(market.clone()),
            financial_reports: FinancialReportAgent::new(search.clone()),
            company_news: CompanyNewsAgent::new(search.clone()),
            market_news: MarketNewsAgent::new(search),
            market,
        }
    }

    /// Normalise and validate a ticker typed by the user.
    pub async fn resolve_ticker(&self, raw: &str) -> Result<TickerInfo> {
        let symbol = raw.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(AgentError::InvalidInput(
                "No ticker symbol was entered.".to_string(),
            ));
        }

        match self.market.validate_ticker(&symbol).await {
            TickerValidation::Valid(quote) => {
                let company_name = quote.display_name();
                info!(ticker = %symbol, company = %company_name, "Ticker resolved");
                Ok(TickerInfo {
                    symbol,
                    company_name,
                })
            }
            TickerValidation::NotFound { ticker } => Err(AgentError::NotFound(format!(
                "Ticker symbol '{}' was not found.",
                ticker
            ))),
            TickerValidation::Failed { message } => Err(AgentError::Transport(format!(
                "Could not validate ticker '{}': {}",
                symbol, message
            ))),
        }
    }

    /// Run every worker for `ticker` over `window` and assemble the report.
    pub async fn analyze(&self, ticker: &TickerInfo, window: AnalysisWindow) -> AnalysisReport {
        let symbol = ticker.symbol.as_str();
        let company = ticker.company_name.as_str();
        let year = window.start.format("%Y").to_string();
        let month = window.start.format("%B").to_string();
        let week_description = window.description();

        info!(
            ticker = %symbol,
            start = %window.start,
            end = %window.end,
            "Starting analysis"
        );

        let stock_price = self
            .stock_prices
            .get_stock_prices(symbol, Some(window.start), Some(window.end_exclusive))
            .await;

        let financial_reports = section(
            self.financial_reports
                .get_financial_reports(company, symbol, &year)
                .await,
        );

        let company_news = section(
            self.company_news
                .get_company_news(company, symbol, &week_description)
                .await,
        );

        let market_news = section(
            self.market_news
                .get_market_news(&year, &month, &format!("{} {}", month, year))
                .await,
        );

        let news_sentiment = SentimentAnalyzer::analyze(&news_text(&company_news.items));

        let overall_summary = format!(
            "{} Company news sentiment is {} (score {}).",
            compose_summary(
                ticker,
                window.start,
                &stock_price,
                &financial_reports,
                &company_news,
                &market_news,
            ),
            news_sentiment.sentiment,
            news_sentiment.score
        );

        AnalysisReport {
            ticker: symbol.to_string(),
            company_name: company.to_string(),
            analysis_period: AnalysisPeriod {
                start: window.start.format("%Y-%m-%d").to_string(),
                end: window.end.format("%Y-%m-%d").to_string(),
            },
            stock_price,
            financial_reports,
            company_news,
            market_news,
            news_sentiment,
            overall_summary,
        }
    }

    /// Console flow: ask for a ticker until it resolves, then for a week
    /// until it parses, then run the analysis. `Ok(None)` on end of input.
    pub async fn run_interactive<R, W>(
        &self,
        input: &mut R,
        output: &mut W,
        today: NaiveDate,
    ) -> Result<Option<AnalysisReport>>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let ticker = loop {
            let Some(line) = prompt(input, output, TICKER_PROMPT).await? else {
                return Ok(None);
            };

            match self.resolve_ticker(&line).await {
                Ok(info) => break info,
                Err(e) => {
                    warn!(input = %line.trim(), error = %e, "Ticker rejected");
                    write_line(output, &format!("{} Please try again.", e)).await?;
                }
            }
        };

        write_line(output, &format!("Company: {}", ticker.company_name)).await?;

        let monday = loop {
            let Some(line) = prompt(input, output, WEEK_PROMPT).await? else {
                return Ok(None);
            };

            match parse_week_input(&line, today) {
                Some(monday) => break monday,
                None => {
                    write_line(
                        output,
                        "Invalid input. Enter a non-negative week offset, a phrase such as \"last week\", or a date.",
                    )
                    .await?;
                }
            }
        };

        let window = AnalysisWindow::for_monday(monday);
        write_line(
            output,
            &format!(
                "Analyzing {} ({}) from {} to {}...",
                ticker.company_name,
                ticker.symbol,
                window.start.format("%Y-%m-%d"),
                window.end.format("%Y-%m-%d")
            ),
        )
        .await?;

        Ok(Some(self.analyze(&ticker, window).await))
    }
}

fn section(result: Result<Vec<SearchHit>>) -> LinkSection {
    match result {
        Ok(items) => LinkSection::found(items),
        Err(e) => LinkSection::failed(e.to_string()),
    }
}

fn news_text(items: &[SearchHit]) -> String {
    items
        .iter()
        .map(|hit| format!("{} {}", hit.title, hit.summary))
        .collect::<Vec<_>>()
        .join(" ")
}

fn describe_section(section: &LinkSection, found: &str, label: &str) -> String {
    match &section.error {
        Some(error) => format!("The {} search failed: {}.", label, error),
        None if section.items.is_empty() => format!("No {} were found.", label),
        None => format!("Found {} {}.", section.items.len(), found),
    }
}

/// One plain-English paragraph describing what each worker produced.
pub fn compose_summary(
    ticker: &TickerInfo,
    monday: NaiveDate,
    stock_price: &StockPriceReport,
    financial_reports: &LinkSection,
    company_news: &LinkSection,
    market_news: &LinkSection,
) -> String {
    let mut parts = vec![format!(
        "Analysis of {} ({}) for the week starting {}.",
        ticker.company_name,
        ticker.symbol,
        monday.format("%Y-%m-%d")
    )];

    if !stock_price.data.is_empty() {
        parts.push(stock_price.summary.clone());
    } else if stock_price.error.is_some() {
        parts.push(format!(
            "Stock price retrieval failed: {}",
            stock_price.summary
        ));
    } else {
        parts.push("No stock price data was found for the period.".to_string());
    }

    parts.push(describe_section(
        financial_reports,
        "financial report items",
        "financial reports",
    ));
    parts.push(describe_section(
        company_news,
        "company news articles",
        "company news articles",
    ));
    parts.push(describe_section(
        market_news,
        "market news articles",
        "market news articles",
    ));

    parts.join(" ")
}

async fn prompt<R, W>(input: &mut R, output: &mut W, text: &str) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output.write_all(text.as_bytes()).await?;
    output.flush().await?;

    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
