use crate::error::SessionError;
use crate::extract::RawAgentOutput;
use crate::llm::prompt_builder::PromptPair;
use crate::llm::{ChatMessage, LlmClient, ModelReply, ToolCall, ToolSpec, truncate};
use crate::tools::{CapabilityProvider, GitCapability, tool_specs};
use anyhow::anyhow;
use std::fmt;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    ProviderStarting,
    Conversing,
    ProviderStopping,
    Completed,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::ProviderStarting => "provider-starting",
            SessionState::Conversing => "conversing",
            SessionState::ProviderStopping => "provider-stopping",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Runs one analysis session: provider up, model conversation, provider down.
pub struct Orchestrator {
    llm: Box<dyn LlmClient>,
    provider: Box<dyn CapabilityProvider>,
    tool_prefix: String,
    max_tool_rounds: usize,
    state: SessionState,
}

impl Orchestrator {
    pub fn new(
        llm: Box<dyn LlmClient>,
        provider: Box<dyn CapabilityProvider>,
        tool_prefix: impl Into<String>,
        max_tool_rounds: usize,
    ) -> Self {
        Orchestrator {
            llm,
            provider,
            tool_prefix: tool_prefix.into(),
            max_tool_rounds,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        log::debug!("Session {} -> {}", self.state, next);
        self.state = next;
    }

    /// Run the session to completion. The provider is shut down on every path.
    pub async fn run_session(
        &mut self,
        prompts: &PromptPair,
    ) -> Result<RawAgentOutput, SessionError> {
        self.transition(SessionState::ProviderStarting);
        let outcome = match self.provider.start().await {
            Ok(()) => {
                self.transition(SessionState::Conversing);
                self.converse(prompts).await
            }
            Err(e) => Err(SessionError::ProviderUnavailable(e.context(format!(
                "failed to start {} provider",
                self.provider.name()
            )))),
        };

        self.transition(SessionState::ProviderStopping);
        if let Err(e) = self.provider.shutdown().await {
            log::warn!("{} provider did not shut down cleanly: {e:#}", self.provider.name());
        }

        match outcome {
            Ok(output) => {
                self.transition(SessionState::Completed);
                Ok(output)
            }
            Err(e) => {
                self.transition(SessionState::Failed);
                Err(e)
            }
        }
    }

    async fn converse(&mut self, prompts: &PromptPair) -> Result<RawAgentOutput, SessionError> {
        let tools = tool_specs(&self.tool_prefix);
        let mut messages = vec![
            ChatMessage::System(prompts.system.clone()),
            ChatMessage::User(prompts.user.clone()),
        ];

        for round in 0..=self.max_tool_rounds {
            let reply = self
                .llm
                .complete(&messages, &tools)
                .await
                .map_err(SessionError::ModelInvocationFailed)?;

            let (content, calls) = match reply {
                ModelReply::Final(text) => {
                    log::debug!("Model answered after {round} tool round(s)");
                    log::trace!("Raw answer:\n{}", truncate(&text, 2000));
                    return Ok(RawAgentOutput(text));
                }
                ModelReply::ToolCalls { content, calls } => (content, calls),
            };

            if round == self.max_tool_rounds {
                break;
            }

            messages.push(ChatMessage::Assistant {
                content,
                tool_calls: calls.clone(),
            });
            for call in &calls {
                let result = self.dispatch(call, &tools).await?;
                messages.push(ChatMessage::Tool {
                    call_id: call.id.clone(),
                    content: result,
                });
            }
        }

        Err(SessionError::ModelInvocationFailed(anyhow!(
            "model {} kept calling tools after {} rounds without answering",
            self.llm.model(),
            self.max_tool_rounds
        )))
    }

    async fn dispatch(&mut self, call: &ToolCall, tools: &[ToolSpec]) -> Result<String, SessionError> {
        let Some(capability) = GitCapability::from_tool_name(&self.tool_prefix, &call.name) else {
            log::warn!("Model called unknown tool {:?}", call.name);
            let offered: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
            return Ok(format!(
                "Error: unknown tool {:?}. Available tools: {}",
                call.name,
                offered.join(", ")
            ));
        };

        log::debug!("Tool call {} -> {}", call.name, self.provider.name());
        let output = self
            .provider
            .invoke(capability)
            .await
            .map_err(|e| SessionError::ProviderUnavailable(e.context(format!("tool {} failed", call.name))))?;
        log::trace!("{} returned:\n{}", call.name, truncate(&output, 2000));
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::noop::NoopClient;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Records lifecycle calls; serves canned tool output.
    #[derive(Clone, Default)]
    struct FakeProvider {
        log: Arc<Mutex<Vec<String>>>,
        fail_start: bool,
        fail_invoke: bool,
        staged: String,
    }

    impl FakeProvider {
        fn events(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CapabilityProvider for FakeProvider {
        fn name(&self) -> &str {
            "fake"
        }

        async fn start(&mut self) -> Result<()> {
            self.log.lock().unwrap().push("start".into());
            if self.fail_start {
                return Err(anyhow!("connection refused"));
            }
            Ok(())
        }

        async fn invoke(&mut self, capability: GitCapability) -> Result<String> {
            self.log
                .lock()
                .unwrap()
                .push(format!("invoke {}", capability.as_str()));
            if self.fail_invoke {
                return Err(anyhow!("server crashed"));
            }
            Ok(match capability {
                GitCapability::ListStagedFiles => self.staged.clone(),
                GitCapability::DiffStaged => "diff --git a/a.rs b/a.rs".into(),
            })
        }

        async fn shutdown(&mut self) -> Result<()> {
            self.log.lock().unwrap().push("shutdown".into());
            Ok(())
        }
    }

    /// Plays back a fixed list of replies.
    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<ModelReply>>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<ModelReply>>) -> Self {
            ScriptedClient {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _: &[ChatMessage], _: &[ToolSpec]) -> Result<ModelReply> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("script exhausted")))
        }
    }

    fn call(name: &str) -> ModelReply {
        ModelReply::ToolCalls {
            content: None,
            calls: vec![ToolCall {
                id: "c1".into(),
                name: name.into(),
                arguments: "{}".into(),
            }],
        }
    }

    fn prompts() -> PromptPair {
        PromptPair {
            system: "sys".into(),
            user: "task".into(),
        }
    }

    #[tokio::test]
    async fn completes_and_shuts_down() {
        let provider = FakeProvider {
            staged: "a.rs".into(),
            ..Default::default()
        };
        let mut orch = Orchestrator::new(Box::new(NoopClient), Box::new(provider.clone()), "git_", 8);

        let out = orch.run_session(&prompts()).await.unwrap();

        assert_eq!(out, RawAgentOutput("chore: update 1 staged file(s)".into()));
        assert_eq!(orch.state(), SessionState::Completed);
        assert_eq!(
            provider.events(),
            vec!["start", "invoke list_staged_files", "invoke diff_staged", "shutdown"]
        );
    }

    #[tokio::test]
    async fn no_staged_files_skips_diff() {
        let provider = FakeProvider::default();
        let mut orch = Orchestrator::new(Box::new(NoopClient), Box::new(provider.clone()), "git_", 8);

        let out = orch.run_session(&prompts()).await.unwrap();

        assert_eq!(out, RawAgentOutput("No staged files found.".into()));
        assert_eq!(
            provider.events(),
            vec!["start", "invoke list_staged_files", "shutdown"]
        );
    }

    #[tokio::test]
    async fn start_failure_is_provider_unavailable_and_still_shuts_down() {
        let provider = FakeProvider {
            fail_start: true,
            ..Default::default()
        };
        let mut orch = Orchestrator::new(Box::new(NoopClient), Box::new(provider.clone()), "git_", 8);

        let err = orch.run_session(&prompts()).await.unwrap_err();

        assert!(matches!(err, SessionError::ProviderUnavailable(_)));
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(orch.state(), SessionState::Failed);
        assert_eq!(provider.events(), vec!["start", "shutdown"]);
    }

    #[tokio::test]
    async fn model_failure_propagates_after_shutdown() {
        let provider = FakeProvider::default();
        let llm = ScriptedClient::new(vec![Err(anyhow!("HTTP 401"))]);
        let mut orch = Orchestrator::new(Box::new(llm), Box::new(provider.clone()), "git_", 8);

        let err = orch.run_session(&prompts()).await.unwrap_err();

        assert!(matches!(err, SessionError::ModelInvocationFailed(_)));
        assert_eq!(provider.events(), vec!["start", "shutdown"]);
    }

    #[tokio::test]
    async fn tool_failure_mid_session_is_provider_unavailable() {
        let provider = FakeProvider {
            fail_invoke: true,
            ..Default::default()
        };
        let llm = ScriptedClient::new(vec![Ok(call("git_list_staged_files"))]);
        let mut orch = Orchestrator::new(Box::new(llm), Box::new(provider.clone()), "git_", 8);

        let err = orch.run_session(&prompts()).await.unwrap_err();

        assert!(matches!(err, SessionError::ProviderUnavailable(_)));
        assert!(err.to_string().contains("server crashed"));
        assert_eq!(provider.events().last().map(String::as_str), Some("shutdown"));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_back_to_model() {
        let provider = FakeProvider::default();
        let llm = ScriptedClient::new(vec![
            Ok(call("git_commit")),
            Ok(ModelReply::Final("fix: stop".into())),
        ]);
        let mut orch = Orchestrator::new(Box::new(llm), Box::new(provider.clone()), "git_", 8);

        let out = orch.run_session(&prompts()).await.unwrap();

        assert_eq!(out, RawAgentOutput("fix: stop".into()));
        assert_eq!(provider.events(), vec!["start", "shutdown"]);
    }

    #[tokio::test]
    async fn endless_tool_calls_are_cut_off() {
        let provider = FakeProvider::default();
        let llm = ScriptedClient::new(vec![
            Ok(call("git_list_staged_files")),
            Ok(call("git_list_staged_files")),
            Ok(call("git_list_staged_files")),
        ]);
        let mut orch = Orchestrator::new(Box::new(llm), Box::new(provider.clone()), "git_", 2);

        let err = orch.run_session(&prompts()).await.unwrap_err();

        assert!(matches!(err, SessionError::ModelInvocationFailed(_)));
        assert!(err.to_string().contains("2 rounds"));
        assert_eq!(
            provider.events(),
            vec![
                "start",
                "invoke list_staged_files",
                "invoke list_staged_files",
                "shutdown"
            ]
        );
    }
}
