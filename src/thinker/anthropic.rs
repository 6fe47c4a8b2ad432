use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_MODEL;
use crate::prompts::react::{build_react_system_prompt, build_task_message};

use super::{Prompt, Step, StepResult, Thinker, TokenUsage, ToolCall};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Connection settings. The API key is passed in explicitly; nothing is
/// read from the environment here.
#[derive(Debug, Clone)]
pub struct ThinkerConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub api_url: String,
}

impl ThinkerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: MAX_TOKENS,
            api_url: API_URL.to_string(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// An LLM thinker that calls the Anthropic Messages API.
pub struct AnthropicThinker {
    config: ThinkerConfig,
    client: reqwest::Client,
}

impl AnthropicThinker {
    pub fn new(config: ThinkerConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            bail!("no Anthropic API key configured. Pass --api-key or set ANTHROPIC_API_KEY.");
        }
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    fn build_messages(prompt: &Prompt) -> Vec<Message> {
        let mut messages = vec![Message {
            role: "user".to_string(),
            content: build_task_message(prompt),
        }];

        // Each completed cycle: what the assistant said, then what it observed
        for entry in &prompt.transcript {
            let assistant_msg = if entry.is_invalid_format() {
                entry.call.input.clone()
            } else {
                serde_json::json!({
                    "thought": entry.thought,
                    "action": {
                        "tool": entry.call.tool,
                        "input": replay_input(&entry.call.input)
                    }
                })
                .to_string()
            };
            messages.push(Message {
                role: "assistant".to_string(),
                content: assistant_msg,
            });
            messages.push(Message {
                role: "user".to_string(),
                content: format!("Observation: {}", entry.observation),
            });
        }

        messages
    }

    /// Turn the model's text into a step. Replies that can't be understood
    /// become [`Step::Invalid`] so the loop can show the model its mistake.
    fn parse_response(text: &str) -> Step {
        let invalid = |error: String| Step::Invalid {
            raw: text.to_string(),
            error,
        };

        let response: serde_json::Value = match serde_json::from_str(extract_json(text)) {
            Ok(value) => value,
            Err(e) => return invalid(format!("reply is not valid JSON: {e}")),
        };

        let thought = response
            .get("thought")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        if let Some(answer) = response.get("answer") {
            let answer = match answer {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Step::Finish { thought, answer };
        }

        if let Some(action) = response.get("action")
            && let Some(tool) = action.get("tool").and_then(|t| t.as_str())
        {
            let input = action
                .get("input")
                .map(action_input)
                .unwrap_or_default();
            return Step::Act {
                thought,
                call: ToolCall::new(tool, input),
            };
        }

        invalid("reply has neither an \"answer\" nor an \"action\" with a \"tool\"".to_string())
    }
}

/// Inverse of [`action_input`]: JSON object text goes back as the object the
/// model sent, a plain query goes back as `{"query": ...}`.
fn replay_input(input: &str) -> serde_json::Value {
    match serde_json::from_str::<serde_json::Value>(input) {
        Ok(value @ serde_json::Value::Object(_)) => value,
        _ => serde_json::json!({ "query": input }),
    }
}

/// Flatten the action input to the single query string a tool takes.
/// `"text"` and `{"query": "text"}` both give `text`; anything richer is
/// passed through as JSON.
fn action_input(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(obj) if obj.len() == 1 => match obj.values().next() {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        },
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Thinker for AnthropicThinker {
    async fn next_step(&self, prompt: &Prompt) -> Result<StepResult> {
        let system = build_react_system_prompt(prompt);
        let messages = Self::build_messages(prompt);

        let body = ApiRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: &system,
            messages: &messages,
        };

        let resp = self
            .client
            .post(&self.config.api_url)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .header("x-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Anthropic API error ({}): {}", status, text);
        }

        let api_resp: ApiResponse = resp.json().await?;

        let text: String = api_resp
            .content
            .iter()
            .filter_map(|block| {
                if block.content_type == "text" {
                    block.text.as_deref()
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            bail!("Anthropic API returned empty response");
        }

        let usage = api_resp.usage.map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        });
        if let Some(usage) = usage {
            tracing::debug!(
                input = usage.input_tokens,
                output = usage.output_tokens,
                "token usage"
            );
        }

        Ok(StepResult {
            step: Self::parse_response(&text),
            usage,
        })
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

/// Extract JSON from text that may be wrapped in markdown code fences.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(after) = trimmed.strip_prefix("```json")
        && let Some(json) = after.strip_suffix("```")
    {
        return json.trim();
    }
    if let Some(after) = trimmed.strip_prefix("```")
        && let Some(json) = after.strip_suffix("```")
    {
        return json.trim();
    }

    trimmed
}

// --- API types ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message],
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::TranscriptEntry;

    fn prompt(transcript: Vec<TranscriptEntry>) -> Prompt {
        Prompt {
            role: "Writer".to_string(),
            goal: "write".to_string(),
            backstory: "".to_string(),
            task: "do something".to_string(),
            expected_output: "text".to_string(),
            context: None,
            transcript,
            available_tools: vec![],
        }
    }

    #[test]
    fn parse_finish_response() {
        let json = r#"{"thought": "I have the answer", "answer": "42"}"#;
        match AnthropicThinker::parse_response(json) {
            Step::Finish { thought, answer } => {
                assert_eq!(thought, "I have the answer");
                assert_eq!(answer, "42");
            }
            _ => panic!("expected Finish"),
        }
    }

    #[test]
    fn parse_action_with_query_object() {
        let json = r#"{
            "thought": "I need data",
            "action": {"tool": "Search", "input": {"query": "robotics trends"}}
        }"#;
        match AnthropicThinker::parse_response(json) {
            Step::Act { thought, call } => {
                assert_eq!(thought, "I need data");
                assert_eq!(call, ToolCall::new("Search", "robotics trends"));
            }
            _ => panic!("expected Act"),
        }
    }

    #[test]
    fn parse_action_with_string_input() {
        let json = r#"{"thought": "t", "action": {"tool": "Search", "input": "cobots"}}"#;
        match AnthropicThinker::parse_response(json) {
            Step::Act { call, .. } => assert_eq!(call.input, "cobots"),
            _ => panic!("expected Act"),
        }
    }

    #[test]
    fn parse_action_with_multi_key_input_keeps_json() {
        let json = r#"{"thought": "t", "action": {"tool": "Search", "input": {"a": 1, "b": 2}}}"#;
        match AnthropicThinker::parse_response(json) {
            Step::Act { call, .. } => {
                let v: serde_json::Value = serde_json::from_str(&call.input).unwrap();
                assert_eq!(v["a"], 1);
                assert_eq!(v["b"], 2);
            }
            _ => panic!("expected Act"),
        }
    }

    #[test]
    fn parse_action_without_input_is_empty() {
        let json = r#"{"thought": "t", "action": {"tool": "Search"}}"#;
        match AnthropicThinker::parse_response(json) {
            Step::Act { call, .. } => assert_eq!(call.input, ""),
            _ => panic!("expected Act"),
        }
    }

    #[test]
    fn parse_fenced_json() {
        let text = "```json\n{\"thought\": \"done\", \"answer\": \"hello\"}\n```";
        match AnthropicThinker::parse_response(text) {
            Step::Finish { answer, .. } => assert_eq!(answer, "hello"),
            _ => panic!("expected Finish"),
        }
    }

    #[test]
    fn parse_invalid_json_is_invalid_step() {
        match AnthropicThinker::parse_response("not json at all") {
            Step::Invalid { raw, error } => {
                assert_eq!(raw, "not json at all");
                assert!(error.starts_with("reply is not valid JSON"), "{error}");
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn parse_no_action_no_answer_is_invalid_step() {
        let step = AnthropicThinker::parse_response(r#"{"thought": "hmm"}"#);
        assert!(matches!(step, Step::Invalid { .. }));
    }

    #[test]
    fn parse_answer_takes_priority_over_action() {
        let json = r#"{
            "thought": "done",
            "answer": "the answer",
            "action": {"tool": "Search", "input": "x"}
        }"#;
        let step = AnthropicThinker::parse_response(json);
        assert!(matches!(step, Step::Finish { .. }));
    }

    #[test]
    fn extract_json_strips_fences() {
        assert_eq!(extract_json("```\n{\"a\": 1}\n```"), r#"{"a": 1}"#);
        assert_eq!(extract_json("  {\"a\": 1} \n"), r#"{"a": 1}"#);
    }

    #[test]
    fn build_messages_task_only() {
        let messages = AnthropicThinker::build_messages(&prompt(vec![]));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert!(messages[0].content.starts_with("Current Task: do something"));
    }

    #[test]
    fn build_messages_replays_transcript() {
        let messages = AnthropicThinker::build_messages(&prompt(vec![TranscriptEntry {
            thought: "let me check".to_string(),
            call: ToolCall::new("Search", "kernel"),
            observation: "Error performing search: offline".to_string(),
        }]));

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, "assistant");
        assert!(messages[1].content.contains("let me check"));
        assert!(messages[1].content.contains("kernel"));
        assert_eq!(messages[2].role, "user");
        assert_eq!(messages[2].content, "Observation: Error performing search: offline");
    }

    #[test]
    fn build_messages_replays_multi_key_input_as_object() {
        let messages = AnthropicThinker::build_messages(&prompt(vec![TranscriptEntry {
            thought: "t".to_string(),
            call: ToolCall::new("Search", r#"{"a":1,"b":2}"#),
            observation: "ok".to_string(),
        }]));

        let sent: serde_json::Value = serde_json::from_str(&messages[1].content).unwrap();
        assert_eq!(sent["action"]["input"], serde_json::json!({"a": 1, "b": 2}));
    }

    #[test]
    fn build_messages_replays_plain_input_as_query() {
        let messages = AnthropicThinker::build_messages(&prompt(vec![TranscriptEntry {
            thought: "t".to_string(),
            call: ToolCall::new("Search", "cobots"),
            observation: "ok".to_string(),
        }]));

        let sent: serde_json::Value = serde_json::from_str(&messages[1].content).unwrap();
        assert_eq!(sent["action"]["input"], serde_json::json!({"query": "cobots"}));
    }

    #[test]
    fn build_messages_replays_invalid_reply_verbatim() {
        let messages = AnthropicThinker::build_messages(&prompt(vec![
            TranscriptEntry::invalid_format("I think I'll search", "reply is not valid JSON"),
        ]));

        assert_eq!(messages[1].role, "assistant");
        assert_eq!(messages[1].content, "I think I'll search");
        assert_eq!(
            messages[2].content,
            "Observation: Invalid format: reply is not valid JSON"
        );
    }

    #[test]
    fn new_rejects_empty_key() {
        assert!(AnthropicThinker::new(ThinkerConfig::new("  ")).is_err());
    }

    #[test]
    fn config_defaults() {
        let config = ThinkerConfig::new("k").model("claude-x");
        assert_eq!(config.model, "claude-x");
        assert_eq!(config.max_tokens, MAX_TOKENS);
        assert_eq!(config.api_url, API_URL);
    }
}
