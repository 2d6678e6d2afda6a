pub mod noop;
pub mod openai;
pub mod prompt_builder;
mod prompts;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A function tool offered to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as the model produced them.
    pub arguments: String,
}

/// One entry of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        call_id: String,
        content: String,
    },
}

/// What the model did with its turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    /// Free-text answer; the conversation is over.
    Final(String),
    /// The model wants tool results before answering.
    ToolCalls {
        content: Option<String>,
        calls: Vec<ToolCall>,
    },
}

/// Trait for talking to a tool-calling chat model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model identifier for logs.
    fn model(&self) -> &str;

    /// Run one model turn over the whole conversation so far.
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ModelReply>;
}

/// Truncate long strings for debug logging.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut cut = max_len;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...\n[truncated {} chars]", &s[..cut], s[cut..].chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo";
        // byte 2 is inside 'é'
        assert_eq!(truncate(s, 2), "h...\n[truncated 4 chars]");
        assert_eq!(truncate(s, 64), "héllo");
    }

    #[test]
    fn truncate_counts_dropped_chars_not_bytes() {
        let s = "ab€€€";
        // each '€' is three bytes
        assert_eq!(truncate(s, 2), "ab...\n[truncated 3 chars]");
    }
}
