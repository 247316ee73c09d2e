//! Gemini `generateContent` client
//!
//! Speaks the public REST wire format directly: text parts, function calls
//! and function responses. Either the Generative Language API (API key) or
//! Vertex AI (bearer token) is used, decided once from [`Settings`].
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::config::Settings;
use crate::error::AgentError;
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const AI_STUDIO_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const LLM_TIMEOUT: Duration = Duration::from_secs(60);

/// gcloud access tokens live for an hour; refetch a little before that.
const TOKEN_TTL: Duration = Duration::from_secs(50 * 60);

//
// ================= Wire types =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

/// One part of a message. Exactly one field is set in practice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn function_call(name: impl Into<String>, args: Value) -> Self {
        Self {
            function_call: Some(FunctionCall {
                name: name.into(),
                args,
            }),
            ..Default::default()
        }
    }

    pub fn function_response(name: impl Into<String>, response: Value) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                name: name.into(),
                response,
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::text(text)],
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: "model".to_string(),
            parts,
        }
    }

    /// System instructions carry no role on the wire.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: String::new(),
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenated text of every text part.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn function_calls(&self) -> Vec<&FunctionCall> {
        self.parts
            .iter()
            .filter_map(|p| p.function_call.as_ref())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDeclarations {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: i32,
    pub max_output_tokens: i32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.9,
            top_k: 40,
            max_output_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclarations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i64,
    #[serde(default)]
    candidates_token_count: i64,
}

//
// ================= Client =================
//

/// Model seam used by the agent runner.
#[async_trait]
pub trait Llm: Send + Sync {
    async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<Content>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    AiStudio {
        api_key: String,
    },
    Vertex {
        project: String,
        location: String,
        access_token: Option<String>,
    },
}

struct CachedToken {
    value: String,
    fetched_at: Instant,
}

impl CachedToken {
    fn is_fresh_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < TOKEN_TTL
    }
}

pub struct GeminiClient {
    client: Client,
    endpoint: Endpoint,
    base_url: Option<String>,
    token_command: (String, Vec<String>),
    cached_token: Mutex<Option<CachedToken>>,
}

impl GeminiClient {
    pub fn new(endpoint: Endpoint) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(LLM_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            base_url: None,
            token_command: (
                "gcloud".to_string(),
                vec!["auth".to_string(), "print-access-token".to_string()],
            ),
            cached_token: Mutex::new(None),
        })
    }

    /// Command whose stdout is the Vertex AI access token when none is
    /// configured. Defaults to `gcloud auth print-access-token`.
    pub fn with_token_command(mut self, program: impl Into<String>, args: &[&str]) -> Self {
        self.token_command = (program.into(), args.iter().map(|a| a.to_string()).collect());
        self
    }

    /// Point the client at a different host (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let endpoint = match settings.vertex()? {
            Some(vertex) => Endpoint::Vertex {
                project: vertex.project,
                location: vertex.location,
                access_token: vertex.access_token,
            },
            None => Endpoint::AiStudio {
                api_key: settings.api_key.clone().ok_or_else(|| {
                    AgentError::ConfigError(
                        "GOOGLE_API_KEY (or GEMINI_API_KEY) must be set unless GOOGLE_GENAI_USE_VERTEXAI is enabled"
                            .to_string(),
                    )
                })?,
            },
        };

        Self::new(endpoint)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Full `generateContent` URL for `model`.
    pub fn url(&self, model: &str) -> String {
        match &self.endpoint {
            Endpoint::AiStudio { .. } => format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url.as_deref().unwrap_or(AI_STUDIO_BASE_URL),
                model
            ),
            Endpoint::Vertex {
                project, location, ..
            } => {
                let base = self
                    .base_url
                    .clone()
                    .unwrap_or_else(|| format!("https://{}-aiplatform.googleapis.com", location));
                format!(
                    "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
                    base, project, location, model
                )
            }
        }
    }

    /// Cached command token, refetched once it is older than [`TOKEN_TTL`].
    async fn command_token(&self) -> Result<String> {
        if let Ok(guard) = self.cached_token.lock() {
            if let Some(token) = guard.as_ref().filter(|t| t.is_fresh_at(Instant::now())) {
                return Ok(token.value.clone());
            }
        }

        let value = self.fetch_command_token().await?;
        if let Ok(mut guard) = self.cached_token.lock() {
            *guard = Some(CachedToken {
                value: value.clone(),
                fetched_at: Instant::now(),
            });
        }
        Ok(value)
    }

    fn invalidate_token(&self) {
        if let Ok(mut guard) = self.cached_token.lock() {
            *guard = None;
        }
    }

    async fn fetch_command_token(&self) -> Result<String> {
        let (program, args) = &self.token_command;
        debug!(program = %program, "Fetching access token");

        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                AgentError::ConfigError(format!(
                    "Could not run {} to obtain an access token (set GOOGLE_CLOUD_ACCESS_TOKEN instead): {}",
                    program, e
                ))
            })?;

        if !output.status.success() {
            return Err(AgentError::ConfigError(format!(
                "{} failed: {}",
                program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(AgentError::ConfigError(format!(
                "{} returned an empty access token",
                program
            )));
        }
        Ok(token)
    }

    async fn send(&self, builder: RequestBuilder, request: &GenerateRequest) -> Result<Response> {
        builder.json(request).send().await.map_err(|e| {
            error!("Gemini API request failed: {}", e);
            AgentError::LlmError(format!("Gemini API error: {}", e))
        })
    }

    /// POST with the endpoint's credentials. A 401 on a command token drops
    /// the cached token and retries once with a fresh one.
    async fn post(&self, url: &str, request: &GenerateRequest) -> Result<Response> {
        match &self.endpoint {
            Endpoint::AiStudio { api_key } => {
                let builder = self.client.post(url).query(&[("key", api_key.as_str())]);
                self.send(builder, request).await
            }
            Endpoint::Vertex {
                access_token: Some(token),
                ..
            } => self.send(self.client.post(url).bearer_auth(token), request).await,
            Endpoint::Vertex {
                access_token: None,
                ..
            } => {
                let token = self.command_token().await?;
                let response = self
                    .send(self.client.post(url).bearer_auth(token), request)
                    .await?;
                if response.status() != StatusCode::UNAUTHORIZED {
                    return Ok(response);
                }

                warn!("Vertex AI rejected the access token, fetching a new one");
                self.invalidate_token();
                let token = self.command_token().await?;
                self.send(self.client.post(url).bearer_auth(token), request).await
            }
        }
    }
}

#[async_trait]
impl Llm for GeminiClient {
    async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<Content> {
        let url = self.url(model);

        info!(model = %model, contents = request.contents.len(), "Calling Gemini API");

        let response = self.post(&url, request).await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Gemini API error response: {}", error_text);
            return Err(AgentError::LlmError(format!(
                "Gemini API error (HTTP {}): {}",
                status.as_u16(),
                error_text
            )));
        }

        let gemini_response: GenerateResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AgentError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        if let Some(usage) = &gemini_response.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                "Gemini usage"
            );
        }

        let candidate = gemini_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::LlmError("No response from Gemini API".to_string()))?;

        let mut content = candidate.content.filter(|c| !c.parts.is_empty()).ok_or_else(|| {
            AgentError::LlmError(format!(
                "Empty response from Gemini (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ))
        })?;

        if content.role.is_empty() {
            content.role = "model".to_string();
        }

        Ok(content)
    }
}
