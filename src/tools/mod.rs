pub mod git_cli;
pub mod mcp;

use crate::llm::ToolSpec;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

/// The only operations the model may ask the provider for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitCapability {
    ListStagedFiles,
    DiffStaged,
}

impl GitCapability {
    pub const ALL: [GitCapability; 2] = [GitCapability::ListStagedFiles, GitCapability::DiffStaged];

    pub fn as_str(&self) -> &'static str {
        match self {
            GitCapability::ListStagedFiles => "list_staged_files",
            GitCapability::DiffStaged => "diff_staged",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            GitCapability::ListStagedFiles => {
                "List the files staged for the next commit (git diff --cached --name-only)."
            }
            GitCapability::DiffStaged => {
                "Show the diff of staged changes only (git diff --cached)."
            }
        }
    }

    /// Tool name as the model sees it, e.g. `git_diff_staged`.
    pub fn tool_name(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.as_str())
    }

    /// Map a tool name chosen by the model back onto a capability.
    pub fn from_tool_name(prefix: &str, name: &str) -> Option<Self> {
        let bare = name.strip_prefix(prefix)?;
        Self::ALL.into_iter().find(|c| c.as_str() == bare)
    }

    pub fn tool_spec(&self, prefix: &str) -> ToolSpec {
        ToolSpec {
            name: self.tool_name(prefix),
            description: self.description().to_string(),
            // The repository is fixed by the provider, so there is nothing to pass.
            parameters: json!({ "type": "object", "properties": {} }),
        }
    }
}

/// Every capability, namespaced with `prefix`.
pub fn tool_specs(prefix: &str) -> Vec<ToolSpec> {
    GitCapability::ALL
        .iter()
        .map(|c| c.tool_spec(prefix))
        .collect()
}

/// An external process answering staged-change queries for one repository.
///
/// Lifecycle is `start`, any number of `invoke`s, then `shutdown`. `shutdown`
/// must be safe to call even when `start` failed part-way.
#[async_trait]
pub trait CapabilityProvider: Send {
    /// Short label for logs.
    fn name(&self) -> &str;

    async fn start(&mut self) -> Result<()>;

    async fn invoke(&mut self, capability: GitCapability) -> Result<String>;

    async fn shutdown(&mut self) -> Result<()>;
}
