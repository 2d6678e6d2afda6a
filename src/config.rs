use crate::cli_args::{Cli, ProviderKind};
use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TOOL_PREFIX: &str = "git_";
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

/// How to reach the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelConfig {
    /// Scripted offline client, no network.
    Offline,
    OpenAi {
        api_key: String,
        model: String,
        api_base_url: String,
        request_timeout: Option<Duration>,
    },
}

/// Command line and remote tool names for the MCP git server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServerConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Remote tool answering "list staged files". Unset means the listing is
    /// derived from the `diff --git` headers of the staged diff.
    pub list_staged_tool: Option<String>,
    pub diff_staged_tool: String,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        McpServerConfig {
            command: "uvx".to_string(),
            args: vec!["mcp-server-git".to_string()],
            list_staged_tool: None,
            diff_staged_tool: "git_diff_staged".to_string(),
        }
    }
}

/// Final resolved configuration for gai.
#[derive(Debug, Clone)]
pub struct Config {
    pub model: ModelConfig,
    pub provider: ProviderKind,
    pub mcp: McpServerConfig,
    pub tool_prefix: String,
    pub max_tool_rounds: usize,
    pub apply: bool,
}

impl Config {
    /// Build the final config from CLI flags (and their env bindings), the TOML file, and defaults.
    ///
    /// Precedence:
    ///   1. CLI flags (`--model`), or the env var clap binds to them (`GAI_MODEL`)
    ///   2. TOML `~/.config/gai.toml` (or `--config <path>`)
    ///   3. Hardcoded defaults
    pub fn from_sources(cli: &Cli) -> Result<Self> {
        let path = cli.config.clone().or_else(config_path);
        let file_cfg = path
            .as_deref()
            .and_then(load_file_config)
            .unwrap_or_default();

        Self::resolve(cli, file_cfg)
    }

    fn resolve(cli: &Cli, file_cfg: FileConfig) -> Result<Self> {
        let model_name = cli
            .model
            .clone()
            .or(file_cfg.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let use_no_model = cli.no_model || model_name.eq_ignore_ascii_case("none");

        let model = if use_no_model {
            ModelConfig::Offline
        } else {
            let api_key = cli
                .api_key
                .clone()
                .or(file_cfg.openai_api_key)
                .ok_or_else(|| {
                    anyhow!(
                        "OPENAI_API_KEY (or --api-key) is required unless --no-model or model=none is used"
                    )
                })?;

            let api_base_url = cli
                .api_base_url
                .clone()
                .or(file_cfg.api_base_url)
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

            ModelConfig::OpenAi {
                api_key,
                model: model_name,
                api_base_url,
                request_timeout: file_cfg.request_timeout_secs.map(Duration::from_secs),
            }
        };

        let file_mcp = file_cfg.mcp.unwrap_or_default();
        let defaults = McpServerConfig::default();
        let mcp_args = if !cli.mcp_args.is_empty() {
            cli.mcp_args.clone()
        } else {
            file_mcp.args.unwrap_or(defaults.args)
        };
        let mcp = McpServerConfig {
            command: cli
                .mcp_command
                .clone()
                .or(file_mcp.command)
                .unwrap_or(defaults.command),
            args: mcp_args,
            list_staged_tool: file_mcp.list_staged_tool.or(defaults.list_staged_tool),
            diff_staged_tool: file_mcp.diff_staged_tool.unwrap_or(defaults.diff_staged_tool),
        };

        let max_tool_rounds = file_cfg
            .max_tool_rounds
            .unwrap_or(DEFAULT_MAX_TOOL_ROUNDS);
        if max_tool_rounds == 0 {
            return Err(anyhow!("max_tool_rounds must be at least 1"));
        }

        Ok(Config {
            model,
            provider: cli.provider.or(file_cfg.provider).unwrap_or(ProviderKind::Mcp),
            mcp,
            tool_prefix: cli
                .tool_prefix
                .clone()
                .or(file_cfg.tool_prefix)
                .unwrap_or_else(|| DEFAULT_TOOL_PREFIX.to_string()),
            max_tool_rounds,
            apply: cli.apply,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    /// Default model to use when not provided via CLI or env.
    pub model: Option<String>,
    pub openai_api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub provider: Option<ProviderKind>,
    pub tool_prefix: Option<String>,
    pub max_tool_rounds: Option<usize>,
    /// Unset means the model call may wait indefinitely.
    pub request_timeout_secs: Option<u64>,
    pub mcp: Option<FileMcpConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct FileMcpConfig {
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
    pub list_staged_tool: Option<String>,
    pub diff_staged_tool: Option<String>,
}

/// Return `~/.config/gai.toml`
fn config_path() -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(home.join(".config").join("gai.toml"))
}

fn load_file_config(path: &Path) -> Option<FileConfig> {
    if !path.exists() {
        return None;
    }

    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) => {
            log::warn!("Ignoring unreadable config {}: {e}", path.display());
            return None;
        }
    };

    match toml::from_str::<FileConfig>(&data) {
        Ok(cfg) => {
            log::debug!("Loaded config from {}", path.display());
            Some(cfg)
        }
        Err(e) => {
            log::warn!("Ignoring malformed config {}: {e}", path.display());
            None
        }
    }
}
