use super::{CapabilityProvider, GitCapability};
use crate::git::RepositoryRoot;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

/// Answers tool calls by running the local `git` binary in the repository root.
pub struct GitCliProvider {
    root: PathBuf,
    git: String,
}

impl GitCliProvider {
    pub fn new(root: &RepositoryRoot) -> Self {
        GitCliProvider {
            root: root.as_path().to_path_buf(),
            git: "git".to_string(),
        }
    }

    /// Use a different git executable.
    #[cfg(test)]
    pub fn with_git(mut self, git: impl Into<String>) -> Self {
        self.git = git.into();
        self
    }

    async fn git_output(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.git)
            .args(args)
            .current_dir(&self.root)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {} {:?}", self.git, args))?;

        if !output.status.success() {
            return Err(anyhow!(
                "{} {:?} exited with status {:?}: {}",
                self.git,
                args,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl CapabilityProvider for GitCliProvider {
    fn name(&self) -> &str {
        "git"
    }

    async fn start(&mut self) -> Result<()> {
        let version = self.git_output(&["--version"]).await?;
        log::debug!("Using {}", version.trim());
        Ok(())
    }

    async fn invoke(&mut self, capability: GitCapability) -> Result<String> {
        match capability {
            GitCapability::ListStagedFiles => {
                let output = self.git_output(&["diff", "--cached", "--name-only"]).await?;
                let files: Vec<&str> = output
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .collect();
                Ok(files.join("\n"))
            }
            GitCapability::DiffStaged => self.git_output(&["diff", "--cached"]).await,
        }
    }

    async fn shutdown(&mut self) -> Result<()> {
        // One process per call; nothing stays running.
        Ok(())
    }
}
