//! Streaming LLM provider core: a minimal message/request/response shape
//! plus the bounded iterative tool-call resolution loop shared by
//! [`Provider::generate`] and [`Provider::new_stream`].
//!
//! Message and content types here are intentionally thin — just enough
//! structure to drive the tool-calling loop — rather than a full chat
//! transcript model; a caller integrating a specific model API is
//! expected to adapt to/from its own richer types at the boundary.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;

use crate::error::{ProviderError, ToolError};
use crate::graph::NodeContext;
use crate::stream::Generator;
use crate::tool::{ToolDescriptor, ToolRegistry};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ContentPart {
    Text(String),
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },
    ToolResult {
        id: String,
        name: String,
        result: Value,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl Message {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    /// Concatenation of every [`ContentPart::Text`] part, in order.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The tool calls requested by this message, in order.
    pub fn tool_calls(&self) -> Vec<(String, String, Value)> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::ToolCall {
                    id,
                    name,
                    arguments,
                } => Some((id.clone(), name.clone(), arguments.clone())),
                _ => None,
            })
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct ProviderRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDescriptor>,
}

impl ProviderRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProviderResponse {
    pub message: Message,
}

/// A model backend: one-shot completion, or an incremental stream of
/// content deltas for the current turn.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn generate(
        &self,
        ctx: &NodeContext,
        req: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError>;

    async fn new_stream(
        &self,
        ctx: &NodeContext,
        req: ProviderRequest,
    ) -> Result<Box<dyn Generator<ContentPart, ProviderError> + Send>, ProviderError>;
}

/// Bounds on the tool-resolution loop. `max_iterations` must be at least
/// 1 — a loop constructed with 0 fails fast with "too many iterations
/// requested" before issuing any model call.
#[derive(Clone, Copy, Debug)]
pub struct ProviderLoopConfig {
    pub max_iterations: u32,
}

impl ProviderLoopConfig {
    pub fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }
}

/// Runs the non-streaming iterative tool-resolution loop to completion:
/// calls the model, and for as long as it keeps requesting tool calls,
/// invokes them and re-enters the model with the results attached, up to
/// `config.max_iterations` turns.
pub async fn generate_with_tools(
    provider: &dyn Provider,
    tools: &ToolRegistry,
    ctx: &NodeContext,
    messages: &mut Vec<Message>,
    config: ProviderLoopConfig,
) -> Result<Message, ProviderError> {
    let mut remaining = config.max_iterations;
    let descriptors = tools.descriptors();

    loop {
        if remaining == 0 {
            return Err(ProviderError::TooManyIterations);
        }
        if ctx.is_canceled() {
            return Err(ProviderError::Canceled);
        }

        let request = ProviderRequest::new(messages.clone()).with_tools(descriptors.clone());
        let response = provider.generate(ctx, request).await?;
        let assistant = response.message;
        let calls = assistant.tool_calls();

        if calls.is_empty() {
            return Ok(assistant);
        }

        messages.push(assistant);
        invoke_tools(tools, ctx, &calls, messages).await?;
        remaining -= 1;
    }
}

async fn invoke_tools(
    tools: &ToolRegistry,
    ctx: &NodeContext,
    calls: &[(String, String, Value)],
    messages: &mut Vec<Message>,
) -> Result<(), ProviderError> {
    for (id, name, arguments) in calls {
        if ctx.is_canceled() {
            return Err(ProviderError::Canceled);
        }
        let tool = tools
            .get(name)
            .ok_or_else(|| ProviderError::ToolNotFound(name.clone()))?;
        let result = tool
            .handle(ctx, arguments.clone())
            .await
            .map_err(ProviderError::from)?;
        messages.push(Message {
            role: Role::Tool,
            parts: vec![ContentPart::ToolResult {
                id: id.clone(),
                name: name.clone(),
                result,
            }],
        });
    }
    Ok(())
}

/// Streaming counterpart of [`generate_with_tools`]: forwards
/// every content delta of every turn to the consumer while driving the
/// same bounded tool-resolution loop in the background. If the consumer
/// stops polling, the worker's next channel send fails and the loop
/// abandons further iterations without issuing more model or tool calls.
pub struct ToolLoopStream {
    rx: UnboundedReceiverStream<Result<ContentPart, ProviderError>>,
    _worker: JoinSet<()>,
}

impl ToolLoopStream {
    pub fn spawn(
        provider: Arc<dyn Provider>,
        tools: ToolRegistry,
        ctx: NodeContext,
        messages: Vec<Message>,
        config: ProviderLoopConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut worker = JoinSet::new();
        worker.spawn(Self::run(provider, tools, ctx, messages, config, tx));
        Self {
            rx: UnboundedReceiverStream::new(rx),
            _worker: worker,
        }
    }

    async fn run(
        provider: Arc<dyn Provider>,
        tools: ToolRegistry,
        ctx: NodeContext,
        mut messages: Vec<Message>,
        config: ProviderLoopConfig,
        tx: mpsc::UnboundedSender<Result<ContentPart, ProviderError>>,
    ) {
        let mut remaining = config.max_iterations;
        let descriptors = tools.descriptors();

        loop {
            if remaining == 0 {
                let _ = tx.send(Err(ProviderError::TooManyIterations));
                return;
            }
            if ctx.is_canceled() {
                let _ = tx.send(Err(ProviderError::Canceled));
                return;
            }

            let request = ProviderRequest::new(messages.clone()).with_tools(descriptors.clone());
            let mut turn = match provider.new_stream(&ctx, request).await {
                Ok(s) => s,
                Err(e) => {
                    let _ = tx.send(Err(e));
                    return;
                }
            };

            let mut text = String::new();
            let mut calls: Vec<(String, String, Value)> = Vec::new();

            loop {
                match turn.next().await {
                    None => break,
                    Some(Err(e)) => {
                        let _ = tx.send(Err(e));
                        return;
                    }
                    Some(Ok(part)) => {
                        match &part {
                            ContentPart::Text(t) => text.push_str(t),
                            ContentPart::ToolCall {
                                id,
                                name,
                                arguments,
                            } => calls.push((id.clone(), name.clone(), arguments.clone())),
                            ContentPart::ToolResult { .. } => {}
                        }
                        if tx.send(Ok(part)).is_err() {
                            return;
                        }
                    }
                }
            }

            if calls.is_empty() {
                return;
            }

            let mut parts = vec![ContentPart::Text(text)];
            parts.extend(calls.iter().map(|(id, name, arguments)| ContentPart::ToolCall {
                id: id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
            }));
            messages.push(Message {
                role: Role::Assistant,
                parts,
            });

            if let Err(e) = invoke_tools(&tools, &ctx, &calls, &mut messages).await {
                let _ = tx.send(Err(e));
                return;
            }
            remaining -= 1;
        }
    }
}

#[async_trait]
impl Generator<ContentPart, ProviderError> for ToolLoopStream {
    async fn next(&mut self) -> Option<Result<ContentPart, ProviderError>> {
        self.rx.next().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::FunctionTool;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    fn test_ctx() -> NodeContext {
        NodeContext::new("test", CancellationToken::new())
    }

    /// A fake model that: on turn 1 returns a tool call, afterwards
    /// returns plain text. Drives the bounded tool-iteration loop through
    /// one round of tool resolution.
    struct ScriptedProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn generate(
            &self,
            _ctx: &NodeContext,
            _req: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let turn = self.calls.fetch_add(1, Ordering::SeqCst);
            let message = if turn == 0 {
                Message {
                    role: Role::Assistant,
                    parts: vec![
                        ContentPart::Text("let me check".into()),
                        ContentPart::ToolCall {
                            id: "call-1".into(),
                            name: "echo".into(),
                            arguments: json!({"value": "hi"}),
                        },
                    ],
                }
            } else {
                Message::text(Role::Assistant, "done")
            };
            Ok(ProviderResponse { message })
        }

        async fn new_stream(
            &self,
            _ctx: &NodeContext,
            _req: ProviderRequest,
        ) -> Result<Box<dyn Generator<ContentPart, ProviderError> + Send>, ProviderError> {
            unimplemented!("not exercised by these tests")
        }
    }

    #[derive(Deserialize)]
    struct EchoInput {
        value: String,
    }

    fn echo_tools() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FunctionTool::new(
            "echo",
            "echoes its input",
            json!({}),
            |_ctx, input: EchoInput| async move { Ok::<_, ToolError>(json!({"echo": input.value})) },
        )));
        registry
    }

    #[tokio::test]
    async fn two_iterations_resolves_after_one_tool_call() {
        let provider = ScriptedProvider {
            calls: AtomicUsize::new(0),
        };
        let tools = echo_tools();
        let ctx = test_ctx();
        let mut messages = vec![Message::text(Role::User, "please check")];
        let result = generate_with_tools(
            &provider,
            &tools,
            &ctx,
            &mut messages,
            ProviderLoopConfig::new(2),
        )
        .await
        .unwrap();
        assert_eq!(result.text_content(), "done");
    }

    #[tokio::test]
    async fn one_iteration_budget_fails_after_turn_one() {
        let provider = ScriptedProvider {
            calls: AtomicUsize::new(0),
        };
        let tools = echo_tools();
        let ctx = test_ctx();
        let mut messages = vec![Message::text(Role::User, "please check")];
        let err = generate_with_tools(
            &provider,
            &tools,
            &ctx,
            &mut messages,
            ProviderLoopConfig::new(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::TooManyIterations));
    }

    #[tokio::test]
    async fn zero_iteration_budget_fails_immediately() {
        let provider = ScriptedProvider {
            calls: AtomicUsize::new(0),
        };
        let tools = echo_tools();
        let ctx = test_ctx();
        let mut messages = vec![Message::text(Role::User, "please check")];
        let err = generate_with_tools(
            &provider,
            &tools,
            &ctx,
            &mut messages,
            ProviderLoopConfig::new(0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::TooManyIterations));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_tool_name_fails_with_tool_not_found() {
        struct OneShotProvider;

        #[async_trait]
        impl Provider for OneShotProvider {
            async fn generate(
                &self,
                _ctx: &NodeContext,
                _req: ProviderRequest,
            ) -> Result<ProviderResponse, ProviderError> {
                Ok(ProviderResponse {
                    message: Message {
                        role: Role::Assistant,
                        parts: vec![ContentPart::ToolCall {
                            id: "call-1".into(),
                            name: "does-not-exist".into(),
                            arguments: json!({}),
                        }],
                    },
                })
            }

            async fn new_stream(
                &self,
                _ctx: &NodeContext,
                _req: ProviderRequest,
            ) -> Result<Box<dyn Generator<ContentPart, ProviderError> + Send>, ProviderError> {
                unimplemented!()
            }
        }

        let provider = OneShotProvider;
        let tools = ToolRegistry::new();
        let ctx = test_ctx();
        let mut messages = vec![Message::text(Role::User, "hi")];
        let err = generate_with_tools(
            &provider,
            &tools,
            &ctx,
            &mut messages,
            ProviderLoopConfig::new(2),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::ToolNotFound(name) if name == "does-not-exist"));
    }

    #[test]
    fn tool_loop_stream_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ToolLoopStream>();
    }
}
