use thiserror::Error;

/// Ways an analysis session can fail. Both are fatal for the run.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The capability provider could not start, or failed while serving a tool call.
    #[error("capability provider unavailable: {0:#}")]
    ProviderUnavailable(anyhow::Error),

    /// The model call failed (auth, quota, network, bad response, runaway tool loop).
    #[error("model invocation failed: {0:#}")]
    ModelInvocationFailed(anyhow::Error),
}
