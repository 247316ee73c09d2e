//! LLM agents and the tool-calling loop
//!
//! INPUT → MODEL → (FUNCTION CALLS → TOOLS → FUNCTION RESPONSES)* → ANSWER
//!
//! An [`LlmAgent`] is a declaration: name, model, instruction and tools.
//! An [`AgentRunner`] drives one agent against an [`Llm`] for a session.

use crate::config::Settings;
use crate::error::AgentError;
use crate::execution::{ExecutionEngine, Observation};
use crate::gemini::{
    Content, GeminiClient, GenerateRequest, GenerationConfig, Llm, Part, ToolDeclarations,
};
use crate::models::{ToolInput, ToolOutput};
use crate::search::{DuckDuckGoSearch, WebSearch};
use crate::tools::{self, Tool, ToolRegistry};
use crate::yahoo::{MarketData, YahooFinanceClient};
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Model responses that still request tools after this many rounds fail the turn.
pub const MAX_TOOL_ROUNDS: usize = 8;

pub struct LlmAgent {
    pub name: String,
    pub description: String,
    pub model: String,
    pub instruction: String,
    engine: ExecutionEngine,
}

impl LlmAgent {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            model: model.into(),
            instruction: String::new(),
            engine: ExecutionEngine::new(ToolRegistry::new()),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_tools(mut self, registry: ToolRegistry) -> Self {
        self.engine = ExecutionEngine::new(registry);
        self
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.engine.registry().list()
    }

    fn request(&self, history: &[Content]) -> GenerateRequest {
        let declarations = self.engine.registry().declarations();
        let tools = if declarations.is_empty() {
            Vec::new()
        } else {
            vec![ToolDeclarations {
                function_declarations: declarations,
            }]
        };

        GenerateRequest {
            contents: history.to_vec(),
            system_instruction: (!self.instruction.is_empty())
                .then(|| Content::system(self.instruction.clone())),
            tools,
            generation_config: Some(GenerationConfig::default()),
        }
    }
}

/// Conversation state for one user talking to one agent.
#[derive(Debug, Clone)]
pub struct AgentSession {
    pub id: Uuid,
    pub agent_name: String,
    history: Vec<Content>,
}

impl AgentSession {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_name: agent_name.into(),
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }
}

#[derive(Debug, Clone)]
pub struct TurnResult {
    pub text: String,
    pub observations: Vec<Observation>,
    pub tool_rounds: usize,
}

pub struct AgentRunner {
    agent: Arc<LlmAgent>,
    llm: Arc<dyn Llm>,
}

impl AgentRunner {
    pub fn new(agent: Arc<LlmAgent>, llm: Arc<dyn Llm>) -> Self {
        Self { agent, llm }
    }

    pub fn agent(&self) -> &LlmAgent {
        &self.agent
    }

    pub fn new_session(&self) -> AgentSession {
        AgentSession::new(self.agent.name.clone())
    }

    /// Send `text` and keep answering function calls until the model replies
    /// without any. A failed turn leaves the session history untouched.
    pub async fn run_turn(&self, session: &mut AgentSession, text: &str) -> Result<TurnResult> {
        let checkpoint = session.history.len();
        session.history.push(Content::user(text));

        info!(
            agent = %self.agent.name,
            session_id = %session.id,
            "Agent turn started"
        );

        match self.drive(session).await {
            Ok(result) => {
                info!(
                    agent = %self.agent.name,
                    tool_rounds = result.tool_rounds,
                    tool_calls = result.observations.len(),
                    "Agent turn complete"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(agent = %self.agent.name, error = %e, "Agent turn failed");
                session.history.truncate(checkpoint);
                Err(e)
            }
        }
    }

    async fn drive(&self, session: &mut AgentSession) -> Result<TurnResult> {
        let mut observations = Vec::new();
        let mut tool_rounds = 0;

        loop {
            let request = self.agent.request(&session.history);
            let reply = self.llm.generate(&self.agent.model, &request).await?;
            session.history.push(reply.clone());

            let calls = reply.function_calls();
            if calls.is_empty() {
                return Ok(TurnResult {
                    text: reply.text(),
                    observations,
                    tool_rounds,
                });
            }

            if tool_rounds >= MAX_TOOL_ROUNDS {
                return Err(AgentError::MaxToolRounds(format!(
                    "{} still requested tools after {} rounds",
                    self.agent.name, MAX_TOOL_ROUNDS
                )));
            }

            let mut responses = Vec::with_capacity(calls.len());
            for call in calls {
                let observation = self.agent.engine.execute_call(call).await;
                debug!(
                    tool_name = %observation.tool_name,
                    status = ?observation.status,
                    execution_time_ms = observation.execution_time_ms,
                    "Tool call observed"
                );
                responses.push(Part::function_response(
                    observation.tool_name.clone(),
                    observation.tool_output.clone(),
                ));
                observations.push(observation);
            }

            session.history.push(Content {
                role: "user".to_string(),
                parts: responses,
            });
            tool_rounds += 1;
        }
    }
}

/// Exposes a sub-agent as a tool taking `{"request": "..."}`.
///
/// Every call runs in a fresh session; the sub-agent's final text comes
/// back as `{"response": "..."}`.
pub struct AgentTool {
    runner: AgentRunner,
}

impl AgentTool {
    pub fn new(agent: Arc<LlmAgent>, llm: Arc<dyn Llm>) -> Self {
        Self {
            runner: AgentRunner::new(agent, llm),
        }
    }
}

#[async_trait::async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.runner.agent().name
    }

    fn description(&self) -> &str {
        &self.runner.agent().description
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "request": {
                    "type": "string",
                    "description": format!("The request to send to the {} agent", self.runner.agent().name)
                }
            },
            "required": ["request"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let request = match input.parameters.get("request") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        if request.trim().is_empty() {
            return Err(AgentError::InvalidToolInput(format!(
                "{}: expected a non-empty 'request'",
                input.tool_name
            )));
        }

        let mut session = self.runner.new_session();
        Ok(match self.runner.run_turn(&mut session, &request).await {
            Ok(turn) if turn.text.trim().is_empty() => {
                ToolOutput::success(json!({ "response": "No response from agent" }))
            }
            Ok(turn) => ToolOutput::success(json!({ "response": turn.text })),
            Err(e) => ToolOutput::failure(e.to_string()),
        })
    }
}

//
// ================= Catalog =================
//

pub fn weather_time_agent(model: &str) -> LlmAgent {
    LlmAgent::new("weather_time_agent", model)
        .with_description("Agent to answer questions about the time and weather in a city.")
        .with_instruction(
            "You are a helpful agent who can answer user questions about the time and weather in a city.",
        )
        .with_tools(tools::weather_time_registry())
}

pub fn greeting_agent(model: &str) -> LlmAgent {
    LlmAgent::new("greeting_agent", model)
        .with_description("Agent to say hello to the user")
        .with_instruction("You are an agent who has a great personality. You can say hello to the user.")
        .with_tools(tools::greeting_registry())
}

pub fn ticker_validation_agent(model: &str, market: Arc<dyn MarketData>) -> LlmAgent {
    LlmAgent::new("ticker_validator", model)
        .with_description("Checks whether a ticker symbol exists on Yahoo Finance.")
        .with_instruction(
            "Use the validate_ticker tool to check if the ticker provided by the user exists on \
             Yahoo Finance. If the ticker is invalid, return an error message and stop the workflow.",
        )
        .with_tools(tools::ticker_validation_registry(market))
}

pub fn news_retrieval_agent(model: &str, search: Arc<dyn WebSearch>) -> LlmAgent {
    LlmAgent::new("news_retriever", model)
        .with_description("Retrieves news headlines for a ticker and week.")
        .with_instruction(
            "Retrieve recent news for the validated ticker during the specified week using \
             search_news or get_weekly_news. Provide a list of headlines and short summaries.",
        )
        .with_tools(tools::news_registry(search))
}

pub fn financial_summary_agent(model: &str, market: Arc<dyn MarketData>) -> LlmAgent {
    LlmAgent::new("financial_summary", model)
        .with_description("Summarizes earnings, key statistics and price moves for a ticker.")
        .with_instruction(
            "Gather recent earnings or financial statement information using summarize_financials \
             for the validated ticker. Use get_stock_prices for the daily price moves of the week.",
        )
        .with_tools(tools::financial_summary_registry(market))
}

pub fn sentiment_agent(model: &str) -> LlmAgent {
    LlmAgent::new("sentiment_analyzer", model)
        .with_description("Scores the sentiment of news text.")
        .with_instruction("Evaluate the sentiment of the news articles using analyze_sentiment.")
        .with_tools(tools::sentiment_registry())
}

/// Root finance agent. Sub-agents run on `specific_model` and are reached
/// through [`AgentTool`]s.
pub fn finance_supervisor(
    root_model: &str,
    specific_model: &str,
    llm: Arc<dyn Llm>,
    market: Arc<dyn MarketData>,
    search: Arc<dyn WebSearch>,
) -> LlmAgent {
    let sub_agents = [
        ticker_validation_agent(specific_model, market.clone()),
        news_retrieval_agent(specific_model, search),
        financial_summary_agent(specific_model, market),
        sentiment_agent(specific_model),
    ];

    let mut registry = ToolRegistry::new();
    for agent in sub_agents {
        registry.register(Arc::new(AgentTool::new(Arc::new(agent), llm.clone())));
    }

    LlmAgent::new("finance_supervisor", root_model)
        .with_description("Supervisor agent for stock price movement analysis.")
        .with_instruction(
            "You converse with the user to obtain a stock ticker and week. Then coordinate \
             sub-agents to validate the ticker, collect news, summarize financial data and \
             analyze sentiment. Provide a concise weekly report of potential reasons for stock \
             price movements.",
        )
        .with_tools(registry)
}

/// Every agent program the binaries can start, with its configured model.
pub struct AgentCatalog {
    settings: Settings,
    llm: Arc<dyn Llm>,
    market: Arc<dyn MarketData>,
    search: Arc<dyn WebSearch>,
}

impl AgentCatalog {
    pub fn new(
        settings: Settings,
        llm: Arc<dyn Llm>,
        market: Arc<dyn MarketData>,
        search: Arc<dyn WebSearch>,
    ) -> Self {
        Self {
            settings,
            llm,
            market,
            search,
        }
    }

    /// Production wiring: Gemini, Yahoo Finance and DuckDuckGo.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let llm = Arc::new(GeminiClient::from_settings(&settings)?);
        let market = Arc::new(YahooFinanceClient::from_settings(&settings)?);
        let search = Arc::new(DuckDuckGoSearch::from_settings(&settings)?);
        Ok(Self::new(settings, llm, market, search))
    }

    pub fn weather_time(&self) -> AgentRunner {
        self.runner(weather_time_agent(&self.settings.root_agent_model))
    }

    pub fn greeting(&self) -> AgentRunner {
        self.runner(greeting_agent(&self.settings.root_agent_model))
    }

    pub fn finance_supervisor(&self) -> AgentRunner {
        self.runner(finance_supervisor(
            &self.settings.root_agent_model,
            &self.settings.specific_agent_model,
            self.llm.clone(),
            self.market.clone(),
            self.search.clone(),
        ))
    }

    fn runner(&self, agent: LlmAgent) -> AgentRunner {
        AgentRunner::new(Arc::new(agent), self.llm.clone())
    }
}
