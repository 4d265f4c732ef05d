//! The tool-execution loop.
//!
//! Streams a model turn, executes any requested tools, feeds the results
//! back, and iterates until the model stops without tool use. Bounded to
//! [`MAX_ROUNDS`] rounds, then force-terminated.

use crate::anthropic::{AnthropicClient, StopReason, ToolUse};
use crate::error::{AgentError, AgentResult};
use crate::events::AgentEvent;
use crate::tools::{tool_catalogue, ToolContext};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// Round cap; the loop force-terminates past it.
pub const MAX_ROUNDS: usize = 10;

/// Default persona and rules for the trading agent.
pub fn default_system_prompt() -> String {
    "You are PerplBot, a trading assistant for a perpetual-futures DEX. \
     You answer questions about the user's account, positions, markets, and \
     risk using the provided tools, and you place orders only on explicit \
     instruction.\n\
     Rules:\n\
     - Before calling open_position, close_position, or cancel_order you MUST \
       have an explicit user confirmation of the exact action in this \
       conversation; otherwise propose the action and ask.\n\
     - For any liquidation question, call the liquidation_analysis tool \
       rather than estimating yourself.\n\
     - Prefer dry_run_trade to preview cost and risk before proposing a \
       trade.\n\
     - Report numbers in display units and say which market they refer to."
        .to_string()
}

/// Run the loop until a terminal text response, streaming events to `sink`.
///
/// Returns the final assistant text. Tool failures become an error event and
/// an error tool-result for the current round; the model sees the error as
/// tool output and the loop continues.
pub async fn run_agent(
    client: &AnthropicClient,
    ctx: &ToolContext,
    mut messages: Vec<Value>,
    system: &str,
    sink: &UnboundedSender<AgentEvent>,
) -> AgentResult<String> {
    let tools = tool_catalogue();

    for round in 0..MAX_ROUNDS {
        let turn = client
            .stream_message(system, &messages, &tools, |delta| {
                let _ = sink.send(AgentEvent::Text {
                    text: delta.to_string(),
                });
            })
            .await?;

        if turn.stop_reason != StopReason::ToolUse {
            let _ = sink.send(AgentEvent::AssistantMessage {
                text: turn.text.clone(),
            });
            let _ = sink.send(AgentEvent::Done);
            return Ok(turn.text);
        }

        debug!(round, tools = turn.tool_uses.len(), "Tool round");
        let mut running_text = turn.text.clone();
        let mut result_blocks = Vec::new();

        for tool_use in &turn.tool_uses {
            let _ = sink.send(AgentEvent::ToolCall {
                name: tool_use.name.clone(),
                input: tool_use.input.clone(),
            });

            match ctx.execute(&tool_use.name, &tool_use.input).await {
                Ok(mut result) => {
                    // `_report` is rendered separately from the structured
                    // payload.
                    let report = extract_report(&mut result);
                    let _ = sink.send(AgentEvent::ToolResult {
                        name: tool_use.name.clone(),
                        result: result.clone(),
                    });
                    if let Some(report) = report {
                        let _ = sink.send(AgentEvent::Text { text: report });
                    }

                    running_text
                        .push_str(&format!("\n[Called {}: {}]", tool_use.name, result));
                    result_blocks.push(tool_result_block(tool_use, result.to_string(), false));
                }
                Err(e) => {
                    warn!(tool = %tool_use.name, ?e, "Tool execution failed");
                    let message = e.to_string();
                    let _ = sink.send(AgentEvent::Error {
                        message: message.clone(),
                    });
                    running_text
                        .push_str(&format!("\n[Called {}: error: {}]", tool_use.name, message));
                    result_blocks.push(tool_result_block(tool_use, message, true));
                }
            }
        }

        messages.push(assistant_message(&running_text, &turn.tool_uses));
        messages.push(json!({"role": "user", "content": result_blocks}));
    }

    let message = format!("Tool loop force-terminated after {MAX_ROUNDS} rounds");
    let _ = sink.send(AgentEvent::Error {
        message: message.clone(),
    });
    let _ = sink.send(AgentEvent::Done);
    Err(AgentError::MaxRoundsExceeded(MAX_ROUNDS))
}

/// Remove and return a `_report` string from a tool result object.
fn extract_report(result: &mut Value) -> Option<String> {
    let report = result.as_object_mut()?.remove("_report")?;
    report.as_str().map(|s| s.to_string())
}

fn assistant_message(text: &str, tool_uses: &[ToolUse]) -> Value {
    let mut content = Vec::new();
    if !text.is_empty() {
        content.push(json!({"type": "text", "text": text}));
    }
    for tool_use in tool_uses {
        content.push(json!({
            "type": "tool_use",
            "id": tool_use.id,
            "name": tool_use.name,
            "input": tool_use.input,
        }));
    }
    json!({"role": "assistant", "content": content})
}

fn tool_result_block(tool_use: &ToolUse, content: String, is_error: bool) -> Value {
    json!({
        "type": "tool_result",
        "tool_use_id": tool_use.id,
        "content": content,
        "is_error": is_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_use(name: &str) -> ToolUse {
        ToolUse {
            id: "tu_1".to_string(),
            name: name.to_string(),
            input: json!({"market": 16}),
        }
    }

    #[test]
    fn test_extract_report_removes_field() {
        let mut result = json!({"value": 1, "_report": "human text"});
        let report = extract_report(&mut result);
        assert_eq!(report.as_deref(), Some("human text"));
        assert_eq!(result, json!({"value": 1}));

        let mut plain = json!({"value": 1});
        assert_eq!(extract_report(&mut plain), None);
    }

    #[test]
    fn test_assistant_message_carries_tool_use_blocks() {
        let message = assistant_message("hello\n[Called x: {}]", &[tool_use("order_book")]);
        assert_eq!(message["role"], "assistant");
        let content = message["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "tool_use");
        assert_eq!(content[1]["name"], "order_book");
    }

    #[test]
    fn test_tool_result_block_shape() {
        let block = tool_result_block(&tool_use("positions"), "{\"ok\":true}".to_string(), false);
        assert_eq!(block["type"], "tool_result");
        assert_eq!(block["tool_use_id"], "tu_1");
        assert_eq!(block["is_error"], false);
    }

    #[test]
    fn test_system_prompt_routes_liquidation_questions() {
        let prompt = default_system_prompt();
        assert!(prompt.contains("liquidation_analysis"));
        assert!(prompt.contains("confirmation"));
    }
}
