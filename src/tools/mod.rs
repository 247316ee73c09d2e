//! Tool trait and registry
//!
//! Every tool answers with a result dictionary carrying `status`. Upstream
//! failures become `status: "error"` outputs; only malformed arguments are
//! returned as `Err`.

use crate::cities;
use crate::dates::monday_of_week;
use crate::error::AgentError;
use crate::gemini::FunctionDeclaration;
use crate::models::{ToolInput, ToolOutput};
use crate::search::{SearchQuery, WebSearch};
use crate::sentiment::SentimentAnalyzer;
use crate::workers::{self, StockPriceAgent};
use crate::yahoo::{MarketData, TickerValidation};
use crate::Result;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

pub const GREETING: &str = "Hello! How are you today?";

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// JSON schema (OpenAPI subset) of the arguments object.
    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Function declarations for the model, in name order.
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.list()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| FunctionDeclaration {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//
// ================= Argument helpers =================
//

fn ensure_object_parameters(input: &ToolInput) -> Result<()> {
    if input.parameters.is_object() || input.parameters.is_null() {
        Ok(())
    } else {
        Err(AgentError::InvalidToolInput(format!(
            "{}: arguments must be a JSON object",
            input.tool_name
        )))
    }
}

fn require_str(input: &ToolInput, key: &str) -> Result<String> {
    ensure_object_parameters(input)?;
    input
        .parameters
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            AgentError::InvalidToolInput(format!(
                "{}: expected a non-empty string '{}'",
                input.tool_name, key
            ))
        })
}

fn optional_date(input: &ToolInput, key: &str) -> Result<Option<NaiveDate>> {
    match input.parameters.get(key).and_then(Value::as_str) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                AgentError::InvalidToolInput(format!(
                    "{}: '{}' must be a YYYY-MM-DD date, got '{}'",
                    input.tool_name, key, raw
                ))
            }),
    }
}

fn string_params(names: &[(&str, &str)]) -> Value {
    let properties: serde_json::Map<String, Value> = names
        .iter()
        .map(|(name, description)| {
            (
                name.to_string(),
                json!({ "type": "string", "description": description }),
            )
        })
        .collect();
    let required: Vec<&str> = names.iter().map(|(name, _)| *name).collect();

    json!({ "type": "object", "properties": properties, "required": required })
}

//
// ================= Weather / time =================
//

pub struct GetWeatherTool;

#[async_trait::async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Retrieves the current weather report for a specified city."
    }

    fn parameters_schema(&self) -> Value {
        string_params(&[("city", "Name of the city, e.g. \"New York\"")])
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let city = require_str(input, "city")?;
        Ok(cities::get_weather(&city).into())
    }
}

pub struct GetCurrentTimeTool;

#[async_trait::async_trait]
impl Tool for GetCurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Returns the current local time in a specified city."
    }

    fn parameters_schema(&self) -> Value {
        string_params(&[("city", "Name of the city, e.g. \"Tokyo\"")])
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let city = require_str(input, "city")?;
        Ok(cities::get_current_time(&city).into())
    }
}

pub struct CityTimezonesCandidatesTool;

#[async_trait::async_trait]
impl Tool for CityTimezonesCandidatesTool {
    fn name(&self) -> &str {
        "get_city_timezones_candidates"
    }

    fn description(&self) -> &str {
        "Lists the cities for which the current time can be looked up."
    }

    async fn execute(&self, _input: &ToolInput) -> Result<ToolOutput> {
        Ok(ToolOutput::success(
            json!({ "cities": cities::get_city_timezones_candidates() }),
        ))
    }
}

pub struct CityWeatherCandidatesTool;

#[async_trait::async_trait]
impl Tool for CityWeatherCandidatesTool {
    fn name(&self) -> &str {
        "get_city_weather_candidates"
    }

    fn description(&self) -> &str {
        "Lists the cities for which a weather report is available."
    }

    async fn execute(&self, _input: &ToolInput) -> Result<ToolOutput> {
        Ok(ToolOutput::success(
            json!({ "cities": cities::get_city_weather_candidates() }),
        ))
    }
}

pub struct SayHelloTool;

#[async_trait::async_trait]
impl Tool for SayHelloTool {
    fn name(&self) -> &str {
        "say_hello"
    }

    fn description(&self) -> &str {
        "Greets the user."
    }

    async fn execute(&self, _input: &ToolInput) -> Result<ToolOutput> {
        Ok(ToolOutput::success(json!(GREETING)))
    }
}

//
// ================= Finance =================
//

pub struct ValidateTickerTool {
    market: Arc<dyn MarketData>,
}

impl ValidateTickerTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait::async_trait]
impl Tool for ValidateTickerTool {
    fn name(&self) -> &str {
        "validate_ticker"
    }

    fn description(&self) -> &str {
        "Checks whether a stock ticker symbol exists on Yahoo Finance and returns its quote."
    }

    fn parameters_schema(&self) -> Value {
        string_params(&[("ticker", "Ticker symbol, e.g. \"AAPL\"")])
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let ticker = require_str(input, "ticker")?.to_uppercase();

        Ok(match self.market.validate_ticker(&ticker).await {
            TickerValidation::Valid(quote) => {
                ToolOutput::success(json!({ "data": serde_json::to_value(&quote)? }))
            }
            TickerValidation::NotFound { ticker } => {
                ToolOutput::failure(format!("Ticker '{}' not found", ticker))
            }
            TickerValidation::Failed { message } => ToolOutput::failure(message),
        })
    }
}

pub struct SummarizeFinancialsTool {
    market: Arc<dyn MarketData>,
}

impl SummarizeFinancialsTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self { market }
    }
}

#[async_trait::async_trait]
impl Tool for SummarizeFinancialsTool {
    fn name(&self) -> &str {
        "summarize_financials"
    }

    fn description(&self) -> &str {
        "Retrieves earnings and key statistics for a ticker from Yahoo Finance."
    }

    fn parameters_schema(&self) -> Value {
        string_params(&[("ticker", "Ticker symbol, e.g. \"MSFT\"")])
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let ticker = require_str(input, "ticker")?.to_uppercase();

        Ok(match self.market.financial_summary(&ticker).await {
            Ok(summary) => ToolOutput::success(json!({ "summary": summary })),
            Err(AgentError::NotFound(message)) => ToolOutput::failure(message),
            Err(e) => ToolOutput::failure(e.to_string()),
        })
    }
}

pub struct GetStockPricesTool {
    agent: StockPriceAgent,
}

impl GetStockPricesTool {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self {
            agent: StockPriceAgent::new(market),
        }
    }
}

#[async_trait::async_trait]
impl Tool for GetStockPricesTool {
    fn name(&self) -> &str {
        "get_stock_prices"
    }

    fn description(&self) -> &str {
        "Fetches daily open, close, high, low and volume for a ticker between two dates (end date exclusive)."
    }

    fn parameters_schema(&self) -> Value {
        string_params(&[
            ("ticker", "Ticker symbol"),
            ("start_date", "First day, YYYY-MM-DD"),
            ("end_date", "Day after the last day, YYYY-MM-DD"),
        ])
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let ticker = input
            .parameters
            .get("ticker")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_uppercase();
        let start = optional_date(input, "start_date")?;
        let end = optional_date(input, "end_date")?;

        let report = self.agent.get_stock_prices(&ticker, start, end).await;
        if report.error.is_some() {
            return Ok(ToolOutput::failure(report.summary));
        }
        Ok(ToolOutput::success(serde_json::to_value(&report)?))
    }
}

pub struct SearchNewsTool {
    search: Arc<dyn WebSearch>,
}

impl SearchNewsTool {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }
}

#[async_trait::async_trait]
impl Tool for SearchNewsTool {
    fn name(&self) -> &str {
        "search_news"
    }

    fn description(&self) -> &str {
        "Searches the web for news matching a query, optionally restricted to a date range."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search terms, e.g. \"AAPL stock news\"" },
                "start_date": { "type": "string", "description": "Optional first day, YYYY-MM-DD" },
                "end_date": { "type": "string", "description": "Optional last day, YYYY-MM-DD" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let query = require_str(input, "query")?;
        let start = optional_date(input, "start_date")?;
        let end = optional_date(input, "end_date")?;

        let result = match (start, end) {
            (Some(start), Some(end)) => {
                workers::search_news(self.search.as_ref(), &query, start, end).await
            }
            _ => self.search.text(&SearchQuery::new(query)).await,
        };

        Ok(match result {
            Ok(articles) => ToolOutput::success(json!({ "articles": articles })),
            Err(e) => ToolOutput::failure(e.to_string()),
        })
    }
}

pub struct WeeklyNewsTool {
    search: Arc<dyn WebSearch>,
}

impl WeeklyNewsTool {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }
}

#[async_trait::async_trait]
impl Tool for WeeklyNewsTool {
    fn name(&self) -> &str {
        "get_weekly_news"
    }

    fn description(&self) -> &str {
        "Retrieves up to ten news results about a ticker for a week, given as weeks before the current one (0 = this week)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ticker": { "type": "string", "description": "Ticker symbol" },
                "week_offset": { "type": "integer", "description": "0 = this week, 1 = last week, ..." }
            },
            "required": ["ticker"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let ticker = require_str(input, "ticker")?;
        let offset = match input.parameters.get("week_offset") {
            None | Some(Value::Null) => 0,
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    AgentError::InvalidToolInput(format!(
                        "{}: 'week_offset' must be a non-negative integer",
                        input.tool_name
                    ))
                })?,
        };

        let monday = monday_of_week(offset)?;
        Ok(
            match workers::weekly_ticker_news(self.search.as_ref(), &ticker, monday).await {
                Ok(articles) => ToolOutput::success(json!({
                    "week_start": monday.format("%Y-%m-%d").to_string(),
                    "articles": articles,
                })),
                Err(e) => ToolOutput::failure(e.to_string()),
            },
        )
    }
}

pub struct AnalyzeSentimentTool;

#[async_trait::async_trait]
impl Tool for AnalyzeSentimentTool {
    fn name(&self) -> &str {
        "analyze_sentiment"
    }

    fn description(&self) -> &str {
        "Scores text as positive, negative or neutral from fixed word lists."
    }

    fn parameters_schema(&self) -> Value {
        string_params(&[("text", "Text to score, e.g. concatenated headlines")])
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        ensure_object_parameters(input)?;
        let text = input
            .parameters
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let report = SentimentAnalyzer::analyze(text);
        Ok(ToolOutput::success(serde_json::to_value(&report)?))
    }
}

//
// ================= Registries =================
//

pub fn weather_time_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(GetWeatherTool));
    registry.register(Arc::new(GetCurrentTimeTool));
    registry.register(Arc::new(CityTimezonesCandidatesTool));
    registry.register(Arc::new(CityWeatherCandidatesTool));
    registry
}

pub fn greeting_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SayHelloTool));
    registry
}

pub fn ticker_validation_registry(market: Arc<dyn MarketData>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ValidateTickerTool::new(market)));
    registry
}

pub fn news_registry(search: Arc<dyn WebSearch>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SearchNewsTool::new(search.clone())));
    registry.register(Arc::new(WeeklyNewsTool::new(search)));
    registry
}

pub fn financial_summary_registry(market: Arc<dyn MarketData>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SummarizeFinancialsTool::new(market.clone())));
    registry.register(Arc::new(GetStockPricesTool::new(market)));
    registry
}

pub fn sentiment_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(AnalyzeSentimentTool));
    registry
}
