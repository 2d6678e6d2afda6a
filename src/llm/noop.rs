use super::{ChatMessage, LlmClient, ModelReply, ToolCall, ToolSpec};
use crate::extract::NO_STAGED_FILES_MARKER;
use crate::tools::GitCapability;
use anyhow::{Result, anyhow};
use async_trait::async_trait;

/// Scripted stand-in for a model, used with --no-model or model=none.
///
/// Follows the task prompt literally: list staged files, bail out with the
/// no-staged marker if there are none, otherwise read the diff and answer with
/// a generic chore message.
pub struct NoopClient;

impl NoopClient {
    fn tool<'a>(tools: &'a [ToolSpec], capability: GitCapability) -> Result<&'a ToolSpec> {
        tools
            .iter()
            .find(|t| t.name.ends_with(capability.as_str()))
            .ok_or_else(|| anyhow!("no tool offered for {}", capability.as_str()))
    }

    fn call(spec: &ToolSpec, n: usize) -> ModelReply {
        ModelReply::ToolCalls {
            content: None,
            calls: vec![ToolCall {
                id: format!("noop_{n}"),
                name: spec.name.clone(),
                arguments: "{}".to_string(),
            }],
        }
    }

    /// Result text of the tool call with `call_id`, if it has come back yet.
    fn result_of<'a>(messages: &'a [ChatMessage], call_id: &str) -> Option<&'a str> {
        messages.iter().find_map(|m| match m {
            ChatMessage::Tool { call_id: id, content } if id == call_id => Some(content.as_str()),
            _ => None,
        })
    }
}

#[async_trait]
impl LlmClient for NoopClient {
    fn model(&self) -> &str {
        "none"
    }

    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ModelReply> {
        let list = Self::tool(tools, GitCapability::ListStagedFiles)?;
        let diff = Self::tool(tools, GitCapability::DiffStaged)?;

        let Some(listing) = Self::result_of(messages, "noop_1") else {
            return Ok(Self::call(list, 1));
        };

        let files = listing.lines().filter(|l| !l.trim().is_empty()).count();
        if files == 0 {
            return Ok(ModelReply::Final(format!("{NO_STAGED_FILES_MARKER}.")));
        }

        if Self::result_of(messages, "noop_2").is_none() {
            return Ok(Self::call(diff, 2));
        }

        Ok(ModelReply::Final(format!(
            "chore: update {files} staged file(s)"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool_specs;

    fn tool_result(id: &str, content: &str) -> ChatMessage {
        ChatMessage::Tool {
            call_id: id.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn asks_for_listing_first() {
        let reply = NoopClient
            .complete(&[ChatMessage::User("go".into())], &tool_specs("git_"))
            .await
            .unwrap();

        match reply {
            ModelReply::ToolCalls { calls, .. } => {
                assert_eq!(calls[0].name, "git_list_staged_files")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_listing_yields_marker() {
        let reply = NoopClient
            .complete(&[tool_result("noop_1", "")], &tool_specs("git_"))
            .await
            .unwrap();
        assert_eq!(reply, ModelReply::Final("No staged files found.".into()));
    }

    #[tokio::test]
    async fn reads_diff_then_answers() {
        let tools = tool_specs("git_");
        let mut history = vec![tool_result("noop_1", "a.rs\nb.rs")];

        let reply = NoopClient.complete(&history, &tools).await.unwrap();
        assert!(matches!(
            reply,
            ModelReply::ToolCalls { ref calls, .. } if calls[0].name == "git_diff_staged"
        ));

        history.push(tool_result("noop_2", "diff --git a/a.rs b/a.rs"));
        let reply = NoopClient.complete(&history, &tools).await.unwrap();
        assert_eq!(
            reply,
            ModelReply::Final("chore: update 2 staged file(s)".into())
        );
    }

    #[tokio::test]
    async fn refuses_without_tools() {
        assert!(NoopClient.complete(&[], &[]).await.is_err());
    }
}
