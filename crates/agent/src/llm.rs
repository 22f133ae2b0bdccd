//! The LLM as an external oracle.
//!
//! The model is a translator, never a decision maker: it may extract a
//! booking intent or request an availability check, but availability
//! itself is always answered by the deterministic checker, and the
//! router rejects any model text that claims a slot status on its own
//! (see `policy`).

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;

use innkeep_core::config::{LlmConfig, LlmProvider};

pub const CHECK_AVAILABILITY_TOOL: &str = "check_availability";
pub const RESERVATION_INTENT_TOOL: &str = "reservation_intent";

pub const SYSTEM_PROMPT: &str = "Si asistent Kmetije Pod Goro za rezervacije sob in vikend \
     kosil. O razpoložljivosti terminov NIKOLI ne ugibaš: vedno pokliči orodje \
     check_availability. Če gost želi rezervacijo, pokliči orodje reservation_intent z \
     ustreznim action. Odgovarjaj kratko in prijazno, v jeziku gosta.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OracleRole {
    System,
    User,
    Assistant,
}

impl OracleRole {
    fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OracleMessage {
    pub role: OracleRole,
    pub content: String,
}

impl OracleMessage {
    pub fn new(role: OracleRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OracleRequest {
    pub messages: Vec<OracleMessage>,
    pub force_tool: Option<&'static str>,
}

/// A tool invocation as the model produced it. Arguments stay raw JSON
/// text; the router owns parsing them, so a malformed payload surfaces
/// as a routing failure (ask the guest to restate), not a transport one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OracleOutcome {
    ToolCalls(Vec<ToolCall>),
    Text(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle call timed out after {0} seconds")]
    Timeout(u64),
    #[error("oracle transport failure: {0}")]
    Transport(String),
    #[error("oracle protocol failure: {0}")]
    Protocol(String),
}

#[async_trait]
pub trait LlmOracle: Send + Sync {
    async fn invoke(&self, request: OracleRequest) -> Result<OracleOutcome, OracleError>;
}

/// The fixed tool schema every oracle request carries.
pub fn default_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: CHECK_AVAILABILITY_TOOL,
            description: "Preveri razpoložljivost sobe ali mize za izbran datum. Edini \
                 dovoljeni vir podatkov o prostih terminih.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "service": {"type": "string", "enum": ["room", "table"]},
                    "date": {"type": "string", "description": "Format: DD.MM.YYYY"},
                    "time": {"type": "string", "description": "Format: HH:MM (samo za mize)"},
                    "people": {"type": "integer"},
                    "nights": {"type": "integer"}
                },
                "required": ["service", "date"]
            }),
        },
        ToolSpec {
            name: RESERVATION_INTENT_TOOL,
            description: "Ugotovi, ali gost želi rezervirati sobo ali mizo. Vrni action.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["NONE", "BOOKING_ROOM", "BOOKING_TABLE"]
                    },
                    "date": {"type": "string"},
                    "time": {"type": "string"},
                    "people": {"type": "integer"},
                    "nights": {"type": "integer"}
                },
                "required": ["action"]
            }),
        },
    ]
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum ReservationAction {
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "BOOKING_ROOM")]
    BookingRoom,
    #[serde(rename = "BOOKING_TABLE")]
    BookingTable,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ReservationIntentArgs {
    pub action: ReservationAction,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub people: Option<u32>,
    #[serde(default)]
    pub nights: Option<u32>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CheckAvailabilityArgs {
    pub service: String,
    pub date: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub people: Option<u32>,
    #[serde(default)]
    pub nights: Option<u32>,
}

/// OpenAI-compatible chat-completions client. Ollama and most gateways
/// speak the same shape; the base URL comes from config.
pub struct HttpLlmOracle {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    timeout_secs: u64,
    max_retries: u32,
}

impl HttpLlmOracle {
    pub fn from_config(config: &LlmConfig) -> Result<Self, OracleError> {
        let base = config.base_url.clone().unwrap_or_else(|| default_base_url(config.provider));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| OracleError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }

    fn body(&self, request: &OracleRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|message| json!({"role": message.role.as_str(), "content": message.content}))
            .collect();

        let tools: Vec<Value> = default_tools()
            .into_iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    }
                })
            })
            .collect();

        let tool_choice = match request.force_tool {
            Some(name) => json!({"type": "function", "function": {"name": name}}),
            None => json!("auto"),
        };

        json!({
            "model": self.model,
            "messages": messages,
            "tools": tools,
            "tool_choice": tool_choice,
            "temperature": 0.2,
        })
    }

    async fn call_once(&self, body: &Value) -> Result<OracleOutcome, OracleError> {
        let mut http_request = self.client.post(&self.endpoint).json(body);
        if let Some(api_key) = &self.api_key {
            http_request = http_request.bearer_auth(api_key.expose_secret());
        }

        let response = http_request.send().await.map_err(|error| {
            if error.is_timeout() {
                OracleError::Timeout(self.timeout_secs)
            } else {
                OracleError::Transport(error.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(OracleError::Transport(format!(
                "oracle returned status {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|error| OracleError::Protocol(error.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| OracleError::Protocol("oracle response had no choices".to_string()))?;

        if !choice.message.tool_calls.is_empty() {
            let calls = choice
                .message
                .tool_calls
                .into_iter()
                .map(|call| ToolCall { name: call.function.name, arguments: call.function.arguments })
                .collect();
            return Ok(OracleOutcome::ToolCalls(calls));
        }

        match choice.message.content {
            Some(content) if !content.trim().is_empty() => Ok(OracleOutcome::Text(content)),
            _ => Err(OracleError::Protocol("oracle response had no content".to_string())),
        }
    }
}

fn default_base_url(provider: LlmProvider) -> String {
    match provider {
        LlmProvider::OpenAi => "https://api.openai.com/v1".to_string(),
        LlmProvider::Anthropic => "https://api.anthropic.com/v1".to_string(),
        LlmProvider::Ollama => "http://localhost:11434/v1".to_string(),
    }
}

#[async_trait]
impl LlmOracle for HttpLlmOracle {
    async fn invoke(&self, request: OracleRequest) -> Result<OracleOutcome, OracleError> {
        let body = self.body(&request);
        let mut last_error = OracleError::Transport("oracle was never called".to_string());

        for _attempt in 0..=self.max_retries {
            match self.call_once(&body).await {
                Ok(outcome) => return Ok(outcome),
                // Timeouts are not retried: the turn must stay bounded.
                Err(error @ OracleError::Timeout(_)) => return Err(error),
                Err(error @ OracleError::Protocol(_)) => return Err(error),
                Err(error) => last_error = error,
            }
        }

        Err(last_error)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    function: ChatToolFunction,
}

#[derive(Debug, Deserialize)]
struct ChatToolFunction {
    name: String,
    arguments: String,
}

/// Deterministic oracle for tests and smoke runs: pops pre-scripted
/// outcomes and records every request it saw.
#[derive(Default)]
pub struct ScriptedOracle {
    outcomes: Mutex<VecDeque<Result<OracleOutcome, OracleError>>>,
    requests: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    pub fn with(outcomes: Vec<Result<OracleOutcome, OracleError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn seen_requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn calls_made(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl LlmOracle for ScriptedOracle {
    async fn invoke(&self, request: OracleRequest) -> Result<OracleOutcome, OracleError> {
        self.requests.lock().await.push(request);
        self.outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or(Err(OracleError::Transport("script exhausted".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use innkeep_core::config::{LlmConfig, LlmProvider};

    use super::{
        default_tools, HttpLlmOracle, OracleMessage, OracleRequest, OracleRole,
        ReservationAction, ReservationIntentArgs, CHECK_AVAILABILITY_TOOL,
        RESERVATION_INTENT_TOOL,
    };

    #[test]
    fn tool_schema_names_are_fixed() {
        let tools = default_tools();
        let names: Vec<&str> = tools.iter().map(|tool| tool.name).collect();
        assert_eq!(names, vec![CHECK_AVAILABILITY_TOOL, RESERVATION_INTENT_TOOL]);
    }

    #[test]
    fn reservation_intent_arguments_parse_from_raw_json() {
        let args: ReservationIntentArgs = serde_json::from_str(
            r#"{"action":"BOOKING_TABLE","date":"10.10.2026","time":"13:00","people":4}"#,
        )
        .expect("valid arguments");
        assert_eq!(args.action, ReservationAction::BookingTable);
        assert_eq!(args.people, Some(4));
        assert_eq!(args.nights, None);
    }

    #[test]
    fn malformed_arguments_fail_to_parse() {
        let result = serde_json::from_str::<ReservationIntentArgs>(r#"{"action":"MAYBE"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn request_body_carries_forced_tool_choice() {
        let oracle = HttpLlmOracle::from_config(&LlmConfig {
            provider: LlmProvider::Ollama,
            api_key: None,
            base_url: None,
            model: "llama3.1".to_string(),
            timeout_secs: 5,
            max_retries: 0,
        })
        .expect("oracle builds");

        let request = OracleRequest {
            messages: vec![OracleMessage::new(OracleRole::User, "rad bi rezerviral")],
            force_tool: Some(RESERVATION_INTENT_TOOL),
        };
        let body = oracle.body(&request);

        assert_eq!(body["tool_choice"]["function"]["name"], RESERVATION_INTENT_TOOL);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["tools"].as_array().map(Vec::len), Some(2));
    }
}
