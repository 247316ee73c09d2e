//! Function-call execution
//!
//! Turns one model function call into one tool invocation and records what
//! happened. Every outcome, including an unknown tool, becomes a response
//! the model can read; nothing here aborts the conversation.

use crate::gemini::FunctionCall;
use crate::models::ToolInput;
use crate::tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
}

/// One executed function call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub observation_id: Uuid,
    pub tool_name: String,
    pub tool_input: Value,
    /// Dictionary sent back to the model as the function response.
    pub tool_output: Value,
    pub execution_time_ms: u64,
    pub status: ExecutionStatus,
}

pub struct ExecutionEngine {
    tool_registry: ToolRegistry,
}

impl ExecutionEngine {
    pub fn new(tool_registry: ToolRegistry) -> Self {
        Self { tool_registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.tool_registry
    }

    pub async fn execute_call(&self, call: &FunctionCall) -> Observation {
        let start = Instant::now();

        let tool_input = ToolInput {
            tool_name: call.name.clone(),
            parameters: call.args.clone(),
        };

        debug!(tool_name = %call.name, "Executing function call");

        let (status, tool_output) = match self.tool_registry.get(&call.name) {
            Some(tool) => match tool.execute(&tool_input).await {
                Ok(output) if output.success => (ExecutionStatus::Success, output.data),
                Ok(output) => {
                    debug!(
                        tool_name = %call.name,
                        error = ?output.error,
                        "Tool reported an error status"
                    );
                    (ExecutionStatus::Failed, output.data)
                }
                Err(e) => {
                    warn!(tool_name = %call.name, error = %e, "Tool execution failed");
                    (
                        ExecutionStatus::Failed,
                        json!({ "status": "error", "error_message": e.to_string() }),
                    )
                }
            },
            None => {
                warn!(tool_name = %call.name, "Tool not registered");
                (
                    ExecutionStatus::Skipped,
                    json!({
                        "status": "error",
                        "error_message": format!("Tool not registered: {}", call.name)
                    }),
                )
            }
        };

        Observation {
            observation_id: Uuid::new_v4(),
            tool_name: call.name.clone(),
            tool_input: call.args.clone(),
            tool_output,
            execution_time_ms: start.elapsed().as_millis() as u64,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{greeting_registry, weather_time_registry};

    fn call(name: &str, args: Value) -> FunctionCall {
        FunctionCall {
            name: name.to_string(),
            args,
        }
    }

    #[tokio::test]
    async fn test_execute_registered_tool() {
        let engine = ExecutionEngine::new(greeting_registry());
        let observation = engine.execute_call(&call("say_hello", json!({}))).await;

        assert_eq!(observation.status, ExecutionStatus::Success);
        assert_eq!(observation.tool_output["status"], "success");
        assert_eq!(observation.tool_output["result"], "Hello! How are you today?");
    }

    #[tokio::test]
    async fn test_error_status_and_bad_arguments() {
        let engine = ExecutionEngine::new(weather_time_registry());

        let observation = engine
            .execute_call(&call("get_weather", json!({"city": "Atlantis"})))
            .await;
        assert_eq!(observation.status, ExecutionStatus::Failed);
        assert_eq!(observation.tool_output["status"], "error");

        let observation = engine
            .execute_call(&call("get_weather", json!({"town": "Paris"})))
            .await;
        assert_eq!(observation.status, ExecutionStatus::Failed);
        assert!(observation.tool_output["error_message"]
            .as_str()
            .unwrap()
            .contains("'city'"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_skipped() {
        let engine = ExecutionEngine::new(greeting_registry());
        let observation = engine.execute_call(&call("launch_rocket", Value::Null)).await;

        assert_eq!(observation.status, ExecutionStatus::Skipped);
        assert_eq!(
            observation.tool_output["error_message"],
            "Tool not registered: launch_rocket"
        );
    }
}
