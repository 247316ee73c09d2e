//! Core data models shared by tools, workers and the supervisor

use crate::sentiment::SentimentReport;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

//
// ================= Tool I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: Value,
}

/// Result dictionary returned by every tool. `data` always carries a
/// `status` of `"success"` or `"error"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn success(payload: Value) -> Self {
        let data = match payload {
            Value::Object(mut map) => {
                map.insert("status".to_string(), json!("success"));
                Value::Object(map)
            }
            other => json!({ "status": "success", "result": other }),
        };

        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            data: json!({ "status": "error", "error_message": message }),
            error: Some(message),
        }
    }
}

//
// ================= Static lookups =================
//

/// Outcome of a weather or time lookup, serialized the way the model sees it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum LookupReport {
    Success { report: String },
    Error { error_message: String },
}

impl LookupReport {
    pub fn is_success(&self) -> bool {
        matches!(self, LookupReport::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            LookupReport::Success { report } => report,
            LookupReport::Error { error_message } => error_message,
        }
    }
}

impl From<LookupReport> for ToolOutput {
    fn from(report: LookupReport) -> Self {
        match report {
            LookupReport::Success { report } => ToolOutput::success(json!({ "report": report })),
            LookupReport::Error { error_message } => ToolOutput::failure(error_message),
        }
    }
}

//
// ================= Search =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub summary: String,
}

/// A list of links from one search worker. `error` is set only when the
/// search itself failed; an empty `items` without error means no results.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LinkSection {
    pub items: Vec<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LinkSection {
    pub fn found(items: Vec<SearchHit>) -> Self {
        Self { items, error: None }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

//
// ================= Prices =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyPrice {
    pub date: String,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockPriceReport {
    pub data: Vec<DailyPrice>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

//
// ================= Analysis report =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TickerInfo {
    pub symbol: String,
    pub company_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisPeriod {
    pub start: String,
    pub end: String,
}

/// Final consolidated output of the supervisor. Assembled once, then printed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub ticker: String,
    pub company_name: String,
    pub analysis_period: AnalysisPeriod,
    pub stock_price: StockPriceReport,
    pub financial_reports: LinkSection,
    pub company_news: LinkSection,
    pub market_news: LinkSection,
    pub news_sentiment: SentimentReport,
    pub overall_summary: String,
}
