//! Environment-derived settings shared by every agent binary

use crate::error::AgentError;
use crate::Result;
use std::env;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://html.duckduckgo.com";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Vertex AI project/region pair, present only when Vertex mode is enabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexSettings {
    pub project: String,
    pub location: String,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub use_vertex_ai: bool,
    pub project: Option<String>,
    pub location: Option<String>,
    pub root_agent_model: String,
    pub specific_agent_model: String,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub http_timeout: Duration,
    pub yahoo_base_url: String,
    pub search_base_url: String,
}

impl Settings {
    /// Load `.env` (if any) and read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenv::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let use_vertex_ai = non_empty("GOOGLE_GENAI_USE_VERTEXAI")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let http_timeout = match non_empty("HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    AgentError::ConfigError(format!(
                        "HTTP_TIMEOUT_SECS must be a positive integer, got '{}'",
                        raw
                    ))
                })?;
                if secs == 0 {
                    return Err(AgentError::ConfigError(
                        "HTTP_TIMEOUT_SECS must be greater than zero".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let settings = Self {
            use_vertex_ai,
            project: non_empty("GOOGLE_CLOUD_PROJECT"),
            location: non_empty("GOOGLE_CLOUD_LOCATION"),
            root_agent_model: non_empty("ROOT_AGENT_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            specific_agent_model: non_empty("SPECIFIC_AGENT_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: non_empty("GOOGLE_API_KEY").or_else(|| non_empty("GEMINI_API_KEY")),
            access_token: non_empty("GOOGLE_CLOUD_ACCESS_TOKEN"),
            http_timeout,
            yahoo_base_url: non_empty("YAHOO_FINANCE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_YAHOO_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            search_base_url: non_empty("SEARCH_BASE_URL")
                .unwrap_or_else(|| DEFAULT_SEARCH_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        };

        info!(
            vertex = settings.use_vertex_ai,
            root_model = %settings.root_agent_model,
            specific_model = %settings.specific_agent_model,
            "Settings loaded"
        );

        Ok(settings)
    }

    /// Vertex project and region, required when `GOOGLE_GENAI_USE_VERTEXAI` is set.
    pub fn vertex(&self) -> Result<Option<VertexSettings>> {
        if !self.use_vertex_ai {
            return Ok(None);
        }

        let project = self.project.clone().ok_or_else(|| {
            AgentError::ConfigError(
                "GOOGLE_CLOUD_PROJECT must be set when GOOGLE_GENAI_USE_VERTEXAI is enabled"
                    .to_string(),
            )
        })?;
        let location = self.location.clone().ok_or_else(|| {
            AgentError::ConfigError(
                "GOOGLE_CLOUD_LOCATION must be set when GOOGLE_GENAI_USE_VERTEXAI is enabled"
                    .to_string(),
            )
        })?;

        Ok(Some(VertexSettings {
            project,
            location,
            access_token: self.access_token.clone(),
        }))
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings_from(&[]).unwrap();
        assert!(!settings.use_vertex_ai);
        assert_eq!(settings.root_agent_model, DEFAULT_MODEL);
        assert_eq!(settings.specific_agent_model, DEFAULT_MODEL);
        assert_eq!(settings.http_timeout, Duration::from_secs(10));
        assert_eq!(settings.yahoo_base_url, DEFAULT_YAHOO_BASE_URL);
        assert!(settings.vertex().unwrap().is_none());
    }

    #[test]
    fn test_model_overrides_and_api_key_fallback() {
        let settings = settings_from(&[
            ("ROOT_AGENT_MODEL", "gemini-2.0-pro"),
            ("SPECIFIC_AGENT_MODEL", "gemini-2.0-flash-lite"),
            ("GEMINI_API_KEY", "abc"),
            ("YAHOO_FINANCE_BASE_URL", "http://localhost:9000/"),
        ])
        .unwrap();

        assert_eq!(settings.root_agent_model, "gemini-2.0-pro");
        assert_eq!(settings.specific_agent_model, "gemini-2.0-flash-lite");
        assert_eq!(settings.api_key.as_deref(), Some("abc"));
        assert_eq!(settings.yahoo_base_url, "http://localhost:9000");
    }

    #[test]
    fn test_false_flag_does_not_enable_vertex() {
        let settings = settings_from(&[
            ("GOOGLE_GENAI_USE_VERTEXAI", "false"),
            ("GOOGLE_CLOUD_PROJECT", "test-project"),
            ("GOOGLE_CLOUD_LOCATION", "test-region"),
        ])
        .unwrap();
        assert!(settings.vertex().unwrap().is_none());
    }

    #[test]
    fn test_vertex_requires_project_and_location() {
        let settings = settings_from(&[("GOOGLE_GENAI_USE_VERTEXAI", "TRUE")]).unwrap();
        assert!(matches!(settings.vertex(), Err(AgentError::ConfigError(_))));

        let settings = settings_from(&[
            ("GOOGLE_GENAI_USE_VERTEXAI", "1"),
            ("GOOGLE_CLOUD_PROJECT", "test-project"),
            ("GOOGLE_CLOUD_LOCATION", "us-central1"),
        ])
        .unwrap();
        let vertex = settings.vertex().unwrap().unwrap();
        assert_eq!(vertex.project, "test-project");
        assert_eq!(vertex.location, "us-central1");
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        assert!(settings_from(&[("HTTP_TIMEOUT_SECS", "soon")]).is_err());
        assert!(settings_from(&[("HTTP_TIMEOUT_SECS", "0")]).is_err());
    }
}
