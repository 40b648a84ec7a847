//! End-to-end scenarios for the bounded tool-iteration loop: two
//! iterations resolve a single tool call, and cutting the iteration
//! budget to one surfaces "too many iterations requested" instead.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use flowgraph::error::{ProviderError, ToolError};
use flowgraph::graph::NodeContext;
use flowgraph::provider::{
    generate_with_tools, ContentPart, Message, Provider, ProviderLoopConfig, ProviderRequest,
    ProviderResponse, Role,
};
use flowgraph::stream::Generator;
use flowgraph::tool::{FunctionTool, ToolRegistry};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

struct TwoTurnProvider {
    turn: AtomicUsize,
}

#[async_trait]
impl Provider for TwoTurnProvider {
    async fn generate(
        &self,
        _ctx: &NodeContext,
        _req: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        let turn = self.turn.fetch_add(1, Ordering::SeqCst);
        let message = if turn == 0 {
            Message {
                role: Role::Assistant,
                parts: vec![
                    ContentPart::Text("checking the weather".into()),
                    ContentPart::ToolCall {
                        id: "call-1".into(),
                        name: "get_weather".into(),
                        arguments: json!({"city": "Paris"}),
                    },
                ],
            }
        } else {
            Message::text(Role::Assistant, "it's sunny in Paris")
        };
        Ok(ProviderResponse { message })
    }

    async fn new_stream(
        &self,
        _ctx: &NodeContext,
        _req: ProviderRequest,
    ) -> Result<Box<dyn Generator<ContentPart, ProviderError> + Send>, ProviderError> {
        unimplemented!("not exercised by this scenario")
    }
}

#[derive(Deserialize)]
struct WeatherInput {
    city: String,
}

fn weather_tools() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FunctionTool::new(
        "get_weather",
        "looks up the current weather for a city",
        json!({"type": "object", "properties": {"city": {"type": "string"}}}),
        |_ctx, input: WeatherInput| async move {
            Ok::<_, ToolError>(json!({"city": input.city, "condition": "sunny"}))
        },
    )));
    registry
}

fn ctx() -> NodeContext {
    NodeContext::new("provider-test", CancellationToken::new())
}

/// **Scenario**: with a budget of two iterations, turn 1 carries a tool
/// call and turn 2 resolves with plain text; the loop returns turn 2's
/// text without error.
#[tokio::test]
async fn two_iteration_budget_resolves_tool_call() {
    let provider = TwoTurnProvider {
        turn: AtomicUsize::new(0),
    };
    let tools = weather_tools();
    let mut messages = vec![Message::text(Role::User, "what's the weather in Paris?")];

    let result = generate_with_tools(
        &provider,
        &tools,
        &ctx(),
        &mut messages,
        ProviderLoopConfig::new(2),
    )
    .await
    .unwrap();

    assert_eq!(result.text_content(), "it's sunny in Paris");
    // The transcript now carries the original user turn, the
    // tool-call-bearing assistant turn, and the tool result.
    assert_eq!(messages.len(), 3);
}

/// **Scenario**: the same scenario with a budget of one iteration
/// exhausts it after turn 1's tool call and fails with "too many
/// iterations requested".
#[tokio::test]
async fn one_iteration_budget_fails_after_tool_call() {
    let provider = TwoTurnProvider {
        turn: AtomicUsize::new(0),
    };
    let tools = weather_tools();
    let mut messages = vec![Message::text(Role::User, "what's the weather in Paris?")];

    let err = generate_with_tools(
        &provider,
        &tools,
        &ctx(),
        &mut messages,
        ProviderLoopConfig::new(1),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ProviderError::TooManyIterations));
}
