use crate::extract::NO_STAGED_FILES_MARKER;
use crate::git::RepositoryRoot;
use crate::llm::prompts;
use crate::tools::GitCapability;

/// System instructions (the behaviour contract) plus the per-run task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Build the instructions for one run against `root`.
///
/// The system half only varies with the root; the user half is the ordered
/// task sequence naming the tools under `tool_prefix`.
pub fn commit_message_prompt(root: &RepositoryRoot, tool_prefix: &str) -> PromptPair {
    let list_tool = GitCapability::ListStagedFiles.tool_name(tool_prefix);
    let diff_tool = GitCapability::DiffStaged.tool_name(tool_prefix);

    let mut system = prompts::BEHAVIOR_CONTRACT.to_owned();
    system.push_str(&format!(
        "\nThe Git repository root is: {root}\n\
         Every git tool call operates on this repository only."
    ));

    let user = format!(
        "You are working in the Git repository at: {root}\n\
         \n\
         Do the following in order:\n\
         1. Call `{list_tool}` to list the staged file names.\n\
         2. If there are staged files, call `{diff_tool}` to read the staged diff.\n\
         3. Write one conventional commit message based on the staged diff only.\n\
         \n\
         If no staged files are found, your entire response must be exactly:\n\
         {NO_STAGED_FILES_MARKER}.\n\
         Otherwise output only the commit message."
    );

    PromptPair { system, user }
}
