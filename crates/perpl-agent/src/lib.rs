//! LLM tool-execution loop.
//!
//! Streams model output, invokes a fixed catalogue of trading tools against
//! the core components, and feeds results back until the model emits a
//! terminal text response. Consumers receive named events suitable for an
//! SSE transport.

pub mod anthropic;
pub mod error;
pub mod events;
pub mod r#loop;
pub mod tools;

pub use anthropic::{AnthropicClient, ModelTurn, StopReason, ToolUse};
pub use error::{AgentError, AgentResult};
pub use events::AgentEvent;
pub use r#loop::{default_system_prompt, run_agent, MAX_ROUNDS};
pub use tools::{tool_catalogue, ToolContext};
