use crate::cli_args::ProviderKind;
use crate::config::{Config, ModelConfig};
use crate::git::RepositoryRoot;
use crate::llm::LlmClient;
use crate::llm::noop::NoopClient;
use crate::llm::openai::OpenAiClient;
use crate::tools::CapabilityProvider;
use crate::tools::git_cli::GitCliProvider;
use crate::tools::mcp::McpProvider;
use anyhow::Result;
use log::debug;

/// Build the LLM client based on CLI + config.
pub fn build_llm_client(cfg: &Config) -> Result<Box<dyn LlmClient>> {
    match &cfg.model {
        ModelConfig::Offline => {
            debug!("Using NoopClient (no model calls)");
            Ok(Box::new(NoopClient))
        }
        ModelConfig::OpenAi {
            api_key,
            model,
            api_base_url,
            request_timeout,
        } => {
            debug!("Using OpenAiClient with model {model} at {api_base_url}");
            Ok(Box::new(OpenAiClient::new(
                api_key.clone(),
                model.clone(),
                api_base_url.clone(),
                *request_timeout,
            )?))
        }
    }
}

/// Build the capability provider, bound to `root`.
pub fn build_provider(cfg: &Config, root: &RepositoryRoot) -> Box<dyn CapabilityProvider> {
    debug!("Using {} capability provider", cfg.provider.as_str());
    match cfg.provider {
        ProviderKind::Mcp => Box::new(McpProvider::new(root, cfg.mcp.clone())),
        ProviderKind::Git => Box::new(GitCliProvider::new(root)),
    }
}
