//! Finance Q&A agents
//!
//! Console agents backed by Gemini function calling:
//! - a weather/time assistant over a small city table
//! - a greeting agent
//! - a finance supervisor that delegates to ticker validation, news
//!   retrieval, financial summary and sentiment sub-agents
//!
//! plus a non-LLM supervisor (`supervisor`) that validates a ticker, picks a
//! week and runs the worker searches in order, producing one JSON report.

pub mod agent;
pub mod cities;
pub mod config;
pub mod dates;
pub mod error;
pub mod execution;
pub mod gemini;
pub mod logging;
pub mod models;
pub mod repl;
pub mod search;
pub mod sentiment;
pub mod supervisor;
pub mod tools;
pub mod workers;
pub mod yahoo;

pub use error::{AgentError, Result};

// Re-export common types
pub use models::*;
