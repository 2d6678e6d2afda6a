use super::{ChatMessage, LlmClient, ModelReply, ToolCall, ToolSpec, truncate};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimal request/response structs for the Chat Completions API with tools.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

fn function_type() -> String {
    "function".to_string()
}

impl From<&ChatMessage> for WireMessage {
    fn from(msg: &ChatMessage) -> Self {
        let plain = |role: &str, content: &str| WireMessage {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        };

        match msg {
            ChatMessage::System(text) => plain("system", text),
            ChatMessage::User(text) => plain("user", text),
            ChatMessage::Assistant {
                content,
                tool_calls,
            } => WireMessage {
                role: "assistant".to_string(),
                content: content.clone(),
                tool_calls: tool_calls
                    .iter()
                    .map(|c| WireToolCall {
                        id: c.id.clone(),
                        kind: function_type(),
                        function: WireFunctionCall {
                            name: c.name.clone(),
                            arguments: c.arguments.clone(),
                        },
                    })
                    .collect(),
                tool_call_id: None,
            },
            ChatMessage::Tool { call_id, content } => WireMessage {
                role: "tool".to_string(),
                content: Some(content.clone()),
                tool_calls: Vec::new(),
                tool_call_id: Some(call_id.clone()),
            },
        }
    }
}

impl From<WireMessage> for ModelReply {
    fn from(msg: WireMessage) -> Self {
        if msg.tool_calls.is_empty() {
            return ModelReply::Final(msg.content.unwrap_or_default());
        }

        ModelReply::ToolCalls {
            content: msg.content.filter(|c| !c.trim().is_empty()),
            calls: msg
                .tool_calls
                .into_iter()
                .map(|c| ToolCall {
                    id: c.id,
                    name: c.function.name,
                    arguments: c.function.arguments,
                })
                .collect(),
        }
    }
}

/// OpenAI-compatible implementation of LlmClient.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    api_base_url: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: String,
        model: String,
        api_base_url: String,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build HTTP client")?;

        Ok(OpenAiClient {
            client,
            api_key,
            model,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn chat_url(&self) -> String {
        if self.api_base_url.ends_with("/v1") {
            format!("{}/chat/completions", self.api_base_url)
        } else {
            format!("{}/v1/chat/completions", self.api_base_url)
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ModelReply> {
        let req = ChatRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            tools: tools
                .iter()
                .map(|t| WireTool {
                    kind: "function",
                    function: WireFunction {
                        name: &t.name,
                        description: &t.description,
                        parameters: &t.parameters,
                    },
                })
                .collect(),
        };

        let url = self.chat_url();
        log::info!("Calling model {:?} at {url}", self.model);
        if let Some(ChatMessage::User(prompt)) = messages.get(1) {
            log::trace!("Task prompt:\n{}", truncate(prompt, 3000));
        }

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .with_context(|| format!("failed to send request to {url}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "model API error: HTTP {} - {}",
                status.as_u16(),
                truncate(&text, 500)
            ));
        }

        let chat_resp: ChatResponse = resp
            .json()
            .await
            .context("failed to parse chat completion response")?;

        if let Some(usage) = &chat_resp.usage {
            log::info!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }

        let message = chat_resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| anyhow!("no choices returned from model"))?;

        Ok(ModelReply::from(message))
    }
}
