//! Events emitted to the agent's transport.
//!
//! The transport contract is a server-sent-event stream with named events;
//! [`AgentEvent::to_sse`] renders one event in that framing.

use serde::Serialize;
use serde_json::Value;

/// One transport event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AgentEvent {
    /// Incremental model tokens.
    Text { text: String },
    /// The model invoked a tool.
    ToolCall { name: String, input: Value },
    /// A tool finished; `result` is the parsed JSON minus any report field.
    ToolResult { name: String, result: Value },
    /// Accumulated assistant text for history.
    AssistantMessage { text: String },
    Error { message: String },
    Done,
}

impl AgentEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::AssistantMessage { .. } => "assistant_message",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }

    /// Render as one SSE frame: `event: <name>\ndata: <json>\n\n`.
    pub fn to_sse(&self) -> String {
        let data = match self {
            Self::Done => "{}".to_string(),
            other => serde_json::to_string(other).unwrap_or_else(|_| "{}".to_string()),
        };
        format!("event: {}\ndata: {}\n\n", self.name(), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_names() {
        assert_eq!(
            AgentEvent::Text {
                text: "hi".to_string()
            }
            .name(),
            "text"
        );
        assert_eq!(
            AgentEvent::ToolCall {
                name: "positions".to_string(),
                input: json!({})
            }
            .name(),
            "tool_call"
        );
        assert_eq!(AgentEvent::Done.name(), "done");
    }

    #[test]
    fn test_sse_framing() {
        let frame = AgentEvent::Text {
            text: "hello".to_string(),
        }
        .to_sse();
        assert!(frame.starts_with("event: text\ndata: "));
        assert!(frame.ends_with("\n\n"));
        assert!(frame.contains(r#""text":"hello""#));
    }

    #[test]
    fn test_done_has_empty_data() {
        assert_eq!(AgentEvent::Done.to_sse(), "event: done\ndata: {}\n\n");
    }
}
