mod agent;
mod cli_args;
mod config;
mod error;
mod extract;
mod git;
mod llm;
mod logging;
mod setup;
mod tools;

use crate::agent::Orchestrator;
use crate::cli_args::Cli;
use crate::config::Config;
use crate::extract::CommitMessage;
use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::process::ExitCode;
use std::time::Duration;

/// Spinner on stderr while the agent works; invisible when stderr is not a terminal.
fn spinner(verbosity: u8) -> ProgressBar {
    if verbosity > 0 {
        // Log lines and a spinner fight over the same terminal.
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Analyzing staged changes...");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn run(cli: &Cli) -> Result<Option<CommitMessage>> {
    let cfg = Config::from_sources(cli)?;

    let root = git::locate_root(cli.dir.as_deref());
    let prompts = llm::prompt_builder::commit_message_prompt(&root, &cfg.tool_prefix);

    let llm = setup::build_llm_client(&cfg)?;
    let provider = setup::build_provider(&cfg, &root);
    let mut orchestrator = Orchestrator::new(llm, provider, cfg.tool_prefix.clone(), cfg.max_tool_rounds);

    let pb = spinner(cli.verbose);
    let outcome = orchestrator.run_session(&prompts).await;
    pb.finish_and_clear();
    log::debug!("Session ended in state {}", orchestrator.state());

    let message = extract::extract(&outcome?);

    if cfg.apply
        && let Some(msg) = &message
    {
        let path = git::write_commit_editmsg(&root, msg.as_str())?;
        log::info!("Wrote commit message to {}", path.display());
    }

    Ok(message)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    match run(&cli).await {
        Ok(Some(message)) => {
            println!("{message}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
