//! `agent.run` request and result types.
//!
//! The one business method the backend invokes through the one-shot adapter.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

// ============================================================================
// Constants
// ============================================================================

/// Method name.
pub const AGENT_RUN_METHOD: &str = "agent.run";

/// Content reported when the gateway returns none.
const EMPTY_CONTENT: &str = "No response";

// ============================================================================
// AgentRunParams
// ============================================================================

/// Parameters of `agent.run`.
#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRunParams {
    /// Agent to run.
    pub agent_id: String,
    /// User message.
    pub message: String,
    /// Model provider key, when the workspace brings its own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Agent personality / system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl AgentRunParams {
    /// Creates parameters for running `agent_id` on `message`.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            message: message.into(),
            api_key: None,
            model: None,
            system_prompt: None,
        }
    }

    /// Sets the provider key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

impl std::fmt::Debug for AgentRunParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRunParams")
            .field("agent_id", &self.agent_id)
            .field("message_len", &self.message.len())
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// AgentRunOutput
// ============================================================================

/// What an agent run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRunOutput {
    /// Agent reply text.
    pub content: String,
    /// Total tokens consumed.
    pub token_usage: u64,
    /// Cost in dollars.
    pub cost: f64,
}

impl AgentRunOutput {
    /// Interprets an `agent.run` payload.
    ///
    /// Gateways differ in field names, so content falls back from `content`
    /// to `response`, and tokens from `tokens` to `usage.total_tokens`.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Self {
        let content = ["content", "response"]
            .iter()
            .find_map(|key| {
                payload
                    .get(*key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or(EMPTY_CONTENT)
            .to_string();

        let token_usage = payload
            .get("tokens")
            .and_then(Value::as_u64)
            .or_else(|| {
                payload
                    .get("usage")
                    .and_then(|usage| usage.get("total_tokens"))
                    .and_then(Value::as_u64)
            })
            .unwrap_or_default();

        let cost = payload
            .get("cost")
            .and_then(Value::as_f64)
            .unwrap_or_default();

        Self {
            content,
            token_usage,
            cost,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
