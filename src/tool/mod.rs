//! Tool contract: a JSON-in/JSON-out handler with a name, description,
//! and input schema, plus a typed adapter for ordinary Rust functions.
//!
//! Grounded in the same shape as a tool source's `ToolSpec` /
//! `call_tool(name, arguments)` pair, generalized into a single trait so
//! a tool is addressable by name without a separate "list" round trip.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ToolError;
use crate::graph::NodeContext;

/// A callable tool: JSON arguments in, JSON result out.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    /// Optional output schema; `None` means unspecified/untyped.
    fn output_schema(&self) -> Option<Value> {
        None
    }
    async fn handle(&self, ctx: &NodeContext, input: Value) -> Result<Value, ToolError>;
}

/// Adapts a typed async function `(ctx, I) -> Result<O, ToolError>` into
/// a [`Tool`], decoding the JSON input and encoding the JSON output.
pub struct FunctionTool<F, I, O> {
    name: String,
    description: String,
    input_schema: Value,
    f: F,
    _marker: PhantomData<fn(I) -> O>,
}

impl<F, I, O, Fut> FunctionTool<F, I, O>
where
    F: Fn(NodeContext, I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        f: F,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, I, O, Fut> Tool for FunctionTool<F, I, O>
where
    F: Fn(NodeContext, I) -> Fut + Send + Sync,
    Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    async fn handle(&self, ctx: &NodeContext, input: Value) -> Result<Value, ToolError> {
        let typed: I =
            serde_json::from_value(input).map_err(|e| ToolError::Decode(e.to_string()))?;
        let output = (self.f)(ctx.clone(), typed).await?;
        serde_json::to_value(output).map_err(|e| ToolError::Encode(e.to_string()))
    }
}

/// `Tool` middleware: `(Tool) -> Tool`, composed the same way as graph
/// middleware — the first entry wraps outermost.
pub type ToolMiddleware = Arc<dyn Fn(Arc<dyn Tool>) -> Arc<dyn Tool> + Send + Sync>;

pub fn compose_tool_middleware(middleware: &[ToolMiddleware], inner: Arc<dyn Tool>) -> Arc<dyn Tool> {
    middleware.iter().rev().fold(inner, |acc, mw| mw(acc))
}

/// A lightweight, cloneable description of a tool (name, description,
/// input schema) suitable for handing to a model without exposing the
/// tool's implementation.
#[derive(Clone, Debug)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Name-addressed collection of tools available to a provider loop.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut out: Vec<ToolDescriptor> = self
            .tools
            .values()
            .map(|t| ToolDescriptor {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    #[derive(Deserialize)]
    struct AddInput {
        a: i64,
        b: i64,
    }

    #[derive(Serialize)]
    struct AddOutput {
        sum: i64,
    }

    fn test_ctx() -> NodeContext {
        NodeContext::new("test", CancellationToken::new())
    }

    #[tokio::test]
    async fn function_tool_decodes_input_and_encodes_output() {
        let tool = FunctionTool::new(
            "add",
            "adds two integers",
            json!({"type": "object"}),
            |_ctx, input: AddInput| async move {
                Ok::<_, ToolError>(AddOutput {
                    sum: input.a + input.b,
                })
            },
        );
        let out = tool
            .handle(&test_ctx(), json!({"a": 2, "b": 3}))
            .await
            .unwrap();
        assert_eq!(out, json!({"sum": 5}));
    }

    #[tokio::test]
    async fn function_tool_decode_error_surfaces_as_tool_error() {
        let tool = FunctionTool::new(
            "add",
            "adds two integers",
            json!({"type": "object"}),
            |_ctx, input: AddInput| async move {
                Ok::<_, ToolError>(AddOutput {
                    sum: input.a + input.b,
                })
            },
        );
        let err = tool.handle(&test_ctx(), json!({"a": "oops"})).await;
        assert!(matches!(err, Err(ToolError::Decode(_))));
    }

    #[test]
    fn registry_get_and_descriptors() {
        let tool = Arc::new(FunctionTool::new(
            "add",
            "adds",
            json!({}),
            |_ctx, input: AddInput| async move {
                Ok::<_, ToolError>(AddOutput {
                    sum: input.a + input.b,
                })
            },
        ));
        let mut registry = ToolRegistry::new();
        registry.register(tool);
        assert!(registry.contains("add"));
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.descriptors().len(), 1);
    }
}
