//! Streaming client for the model API.
//!
//! Speaks the Messages API with `stream: true`, parsing the server-sent
//! event lines and accumulating text plus tool-use blocks until the message
//! completes.

use crate::error::{AgentError, AgentResult};
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// Why the model stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Other(String),
}

impl StopReason {
    fn parse(s: &str) -> Self {
        match s {
            "end_turn" => Self::EndTurn,
            "tool_use" => Self::ToolUse,
            "max_tokens" => Self::MaxTokens,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// A completed model turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTurn {
    pub text: String,
    pub tool_uses: Vec<ToolUse>,
    pub stop_reason: StopReason,
}

/// Tool definition advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Client for the model endpoint.
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Stream one model turn, invoking `on_text` for each text delta.
    pub async fn stream_message(
        &self,
        system: &str,
        messages: &[Value],
        tools: &[ToolDef],
        mut on_text: impl FnMut(&str),
    ) -> AgentResult<ModelTurn> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": messages,
            "tools": tools,
            "stream": true,
        });

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let mut accumulator = StreamAccumulator::default();
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Complete lines only; a partial line stays buffered.
            while let Some(newline) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline).collect();
                let line = line.trim_end();
                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                let event: Value = match serde_json::from_str(data) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(?e, "Skipping malformed stream event");
                        continue;
                    }
                };
                if let Some(delta) = accumulator.apply(&event)? {
                    on_text(&delta);
                }
            }
        }

        let turn = accumulator.finish();
        debug!(
            text_len = turn.text.len(),
            tools = turn.tool_uses.len(),
            ?turn.stop_reason,
            "Model turn complete"
        );
        Ok(turn)
    }
}

/// Accumulates stream events into a [`ModelTurn`].
///
/// Extracted from the transport so the event grammar is testable without a
/// live endpoint.
#[derive(Default)]
struct StreamAccumulator {
    text: String,
    tool_uses: Vec<ToolUse>,
    /// (id, name, partial json) of the tool_use block being streamed.
    current_tool: Option<(String, String, String)>,
    stop_reason: Option<StopReason>,
}

impl StreamAccumulator {
    /// Apply one event; returns a text delta to forward, if any.
    fn apply(&mut self, event: &Value) -> AgentResult<Option<String>> {
        let event_type = event.get("type").and_then(|v| v.as_str()).unwrap_or("");
        match event_type {
            "content_block_start" => {
                let block = event.get("content_block").cloned().unwrap_or(Value::Null);
                if block.get("type").and_then(|v| v.as_str()) == Some("tool_use") {
                    let id = block
                        .get("id")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    let name = block
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string();
                    self.current_tool = Some((id, name, String::new()));
                }
                Ok(None)
            }
            "content_block_delta" => {
                let delta = event.get("delta").cloned().unwrap_or(Value::Null);
                match delta.get("type").and_then(|v| v.as_str()) {
                    Some("text_delta") => {
                        let text = delta
                            .get("text")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string();
                        self.text.push_str(&text);
                        Ok(Some(text))
                    }
                    Some("input_json_delta") => {
                        if let Some((_, _, partial)) = self.current_tool.as_mut() {
                            partial.push_str(
                                delta
                                    .get("partial_json")
                                    .and_then(|v| v.as_str())
                                    .unwrap_or_default(),
                            );
                        }
                        Ok(None)
                    }
                    _ => Ok(None),
                }
            }
            "content_block_stop" => {
                if let Some((id, name, partial)) = self.current_tool.take() {
                    let input = if partial.trim().is_empty() {
                        Value::Object(Default::default())
                    } else {
                        serde_json::from_str(&partial).map_err(|e| {
                            AgentError::MalformedStream(format!("tool input for {name}: {e}"))
                        })?
                    };
                    self.tool_uses.push(ToolUse { id, name, input });
                }
                Ok(None)
            }
            "message_delta" => {
                if let Some(reason) = event
                    .get("delta")
                    .and_then(|d| d.get("stop_reason"))
                    .and_then(|v| v.as_str())
                {
                    self.stop_reason = Some(StopReason::parse(reason));
                }
                Ok(None)
            }
            // message_start, ping, message_stop carry nothing we keep.
            _ => Ok(None),
        }
    }

    fn finish(self) -> ModelTurn {
        ModelTurn {
            text: self.text,
            tool_uses: self.tool_uses,
            stop_reason: self.stop_reason.unwrap_or(StopReason::EndTurn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feed(accumulator: &mut StreamAccumulator, events: &[Value]) -> Vec<String> {
        let mut deltas = Vec::new();
        for event in events {
            if let Some(delta) = accumulator.apply(event).unwrap() {
                deltas.push(delta);
            }
        }
        deltas
    }

    #[test]
    fn test_text_accumulation() {
        let mut acc = StreamAccumulator::default();
        let deltas = feed(
            &mut acc,
            &[
                json!({"type": "content_block_start", "content_block": {"type": "text"}}),
                json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": "Hello "}}),
                json!({"type": "content_block_delta", "delta": {"type": "text_delta", "text": "world"}}),
                json!({"type": "content_block_stop"}),
                json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}}),
            ],
        );
        assert_eq!(deltas, vec!["Hello ", "world"]);
        let turn = acc.finish();
        assert_eq!(turn.text, "Hello world");
        assert_eq!(turn.stop_reason, StopReason::EndTurn);
        assert!(turn.tool_uses.is_empty());
    }

    #[test]
    fn test_tool_use_accumulation() {
        let mut acc = StreamAccumulator::default();
        feed(
            &mut acc,
            &[
                json!({"type": "content_block_start",
                       "content_block": {"type": "tool_use", "id": "tu_1", "name": "order_book"}}),
                json!({"type": "content_block_delta",
                       "delta": {"type": "input_json_delta", "partial_json": "{\"market\""}}),
                json!({"type": "content_block_delta",
                       "delta": {"type": "input_json_delta", "partial_json": ": 16}"}}),
                json!({"type": "content_block_stop"}),
                json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}}),
            ],
        );
        let turn = acc.finish();
        assert_eq!(turn.stop_reason, StopReason::ToolUse);
        assert_eq!(turn.tool_uses.len(), 1);
        assert_eq!(turn.tool_uses[0].name, "order_book");
        assert_eq!(turn.tool_uses[0].input, json!({"market": 16}));
    }

    #[test]
    fn test_empty_tool_input_defaults_to_object() {
        let mut acc = StreamAccumulator::default();
        feed(
            &mut acc,
            &[
                json!({"type": "content_block_start",
                       "content_block": {"type": "tool_use", "id": "tu_2", "name": "positions"}}),
                json!({"type": "content_block_stop"}),
            ],
        );
        let turn = acc.finish();
        assert_eq!(turn.tool_uses[0].input, json!({}));
    }

    #[test]
    fn test_unknown_events_ignored() {
        let mut acc = StreamAccumulator::default();
        let deltas = feed(
            &mut acc,
            &[json!({"type": "ping"}), json!({"type": "message_start"})],
        );
        assert!(deltas.is_empty());
    }

    #[test]
    fn test_stop_reason_parse() {
        assert_eq!(StopReason::parse("tool_use"), StopReason::ToolUse);
        assert_eq!(StopReason::parse("max_tokens"), StopReason::MaxTokens);
        assert!(matches!(StopReason::parse("refusal"), StopReason::Other(_)));
    }
}
