use anyhow::{Context, Result, anyhow};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as GitCommand;

/// Env var a wrapper script sets to the directory the user invoked it from.
pub const ORIGINAL_DIR_ENV: &str = "GAI_ORIGINAL_DIR";

/// Top of the working tree every tool call is scoped to.
///
/// When discovery fails this is the origin directory instead, which may not be
/// a repository at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRoot(PathBuf);

impl RepositoryRoot {
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for RepositoryRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Run a git command in `dir` and capture stdout as String.
pub fn git_output_in(dir: &Path, args: &[&str]) -> Result<String> {
    let output = GitCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("failed to run git {:?} in {}", args, dir.display()))?;

    if !output.status.success() {
        return Err(anyhow!(
            "git {:?} exited with status {:?}: {}",
            args,
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Pick the directory discovery starts from: explicit origin, then
/// `$GAI_ORIGINAL_DIR`, then the process working directory.
pub fn origin_directory(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }

    env::var_os(ORIGINAL_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve the repository root with `git rev-parse --show-toplevel`.
///
/// Never fails: outside a repository (or without git) the origin directory
/// itself is returned.
pub fn locate_root(explicit_origin: Option<&Path>) -> RepositoryRoot {
    let origin = origin_directory(explicit_origin);

    match git_output_in(&origin, &["rev-parse", "--show-toplevel"]) {
        Ok(out) if !out.trim().is_empty() => {
            let root = PathBuf::from(out.trim());
            log::debug!("Repository root: {}", root.display());
            RepositoryRoot(root)
        }
        Ok(_) => {
            log::debug!(
                "git reported an empty top-level; using {}",
                origin.display()
            );
            RepositoryRoot(origin)
        }
        Err(e) => {
            log::debug!(
                "Root discovery degraded ({e:#}); using {}",
                origin.display()
            );
            RepositoryRoot(origin)
        }
    }
}

/// Get the path to the Git directory (e.g. .git) for the repository at `root`.
pub fn git_dir(root: &RepositoryRoot) -> Result<PathBuf> {
    let dir = git_output_in(root.as_path(), &["rev-parse", "--git-dir"])?
        .trim()
        .to_string();
    let dir = PathBuf::from(dir);

    // rev-parse answers relative to the directory it ran in.
    if dir.is_relative() {
        Ok(root.as_path().join(dir))
    } else {
        Ok(dir)
    }
}

/// Write the commit message into .git/COMMIT_EDITMSG so the next `git commit`
/// will use it as the default message in the editor.
pub fn write_commit_editmsg(root: &RepositoryRoot, message: &str) -> Result<PathBuf> {
    let path = git_dir(root)?.join("COMMIT_EDITMSG");
    fs::write(&path, format!("{message}\n"))
        .with_context(|| format!("failed to write commit message to {:?}", path))?;
    Ok(path)
}
