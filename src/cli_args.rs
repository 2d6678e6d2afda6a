use clap::{ArgAction, ArgGroup, Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

/// Which capability provider backs the agent's git tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// External MCP git server spoken to over stdio (e.g. `uvx mcp-server-git`)
    Mcp,
    /// Local `git` binary invoked per tool call
    Git,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Mcp => "mcp",
            ProviderKind::Git => "git",
        }
    }
}

/// CLI options
#[derive(Parser, Debug)]
#[command(
    name = "gai",
    version,
    about = "Prints one conventional commit message for your staged changes, written by an LLM agent"
)]
#[command(group(
    ArgGroup::new("model_group")
        .args(["model", "no_model"])
        .multiple(false)
))]
pub struct Cli {
    /// Directory to start repository discovery from (defaults to $GAI_ORIGINAL_DIR, then cwd)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Model name to use (e.g. gpt-4o-mini). If 'none', acts like --no-model.
    #[arg(long, env = "GAI_MODEL")]
    pub model: Option<String>,

    /// Disable model calls; a scripted offline agent answers instead
    #[arg(long)]
    pub no_model: bool,

    /// API key (otherwise uses OPENAI_API_KEY env var)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API (e.g. http://localhost:11434/v1 for Ollama)
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub api_base_url: Option<String>,

    /// Capability provider exposing the staged-change tools to the model
    #[arg(long, value_enum)]
    pub provider: Option<ProviderKind>,

    /// Command that starts the MCP git server
    #[arg(long)]
    pub mcp_command: Option<String>,

    /// Argument for the MCP git server command (repeatable)
    #[arg(long = "mcp-arg", allow_hyphen_values = true)]
    pub mcp_args: Vec<String>,

    /// Prefix for the tool names the model sees
    #[arg(long)]
    pub tool_prefix: Option<String>,

    /// Also write the generated message into .git/COMMIT_EDITMSG
    #[arg(long)]
    pub apply: bool,

    /// Path to a TOML config file (defaults to ~/.config/gai.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); logs go to stderr
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_and_no_model_conflict() {
        let res = Cli::try_parse_from(["gai", "--model", "gpt-4o", "--no-model"]);
        assert!(res.is_err());
    }

    #[test]
    fn repeated_mcp_args_are_collected() {
        let cli = Cli::try_parse_from([
            "gai",
            "--provider",
            "mcp",
            "--mcp-command",
            "python",
            "--mcp-arg",
            "-m",
            "--mcp-arg",
            "mcp_server_git",
        ])
        .unwrap();

        assert_eq!(cli.provider, Some(ProviderKind::Mcp));
        assert_eq!(cli.mcp_command.as_deref(), Some("python"));
        assert_eq!(cli.mcp_args, vec!["-m", "mcp_server_git"]);
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::try_parse_from(["gai", "-vvv"]).unwrap();
        assert_eq!(cli.verbose, 3);
    }
}
