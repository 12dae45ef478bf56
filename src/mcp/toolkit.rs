use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::mcp::error::ToolError;
use crate::mcp::loader::Loader;
use crate::mcp::models::{ToolDescriptor, ToolResponse};

/// Core trait that all tools implement
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object
    fn input_schema(&self) -> Value;

    /// Run the tool. Arguments have not been validated yet.
    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

/// Deserialize tool arguments, mapping failures to `InvalidArguments`.
pub fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

/// Routes tool calls to registered tools once the loader is ready.
pub struct ToolRegistry {
    loader: Arc<Loader>,
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(loader: Arc<Loader>) -> Self {
        Self {
            loader,
            tools: BTreeMap::new(),
        }
    }

    pub fn register_tool(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        info!("Registering tool: {}", name);
        self.tools.insert(name, tool);
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .values()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    /// Invoke `name`. Every failure becomes an `isError` response.
    pub async fn invoke_tool(&self, name: &str, args: Value) -> ToolResponse {
        // Bounded: the loader always signals ready within its startup timeout.
        self.loader.wait_ready().await;

        let Some(tool) = self.tools.get(name) else {
            return ToolResponse::error(ToolError::UnknownTool(name.to_string()).to_string());
        };

        info!("Executing tool: '{}'", name);
        match tool.execute(args).await {
            Ok(text) => ToolResponse::text(text),
            Err(err) => {
                warn!("Tool '{}' failed: {}", name, err);
                ToolResponse::error(format!("Error: {err}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::backend::BackendId;
    use crate::mcp::cache::testing::{FakeInitializer, Plan};
    use serde_json::json;

    struct EchoTool {
        loader: Arc<Loader>,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the text argument"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        async fn execute(&self, args: Value) -> Result<String, ToolError> {
            #[derive(serde::Deserialize)]
            struct Args {
                text: String,
            }
            let args: Args = parse_args("echo", args)?;
            self.loader.resolve(BackendId::Notes).await?;
            Ok(args.text)
        }
    }

    async fn registry(init: FakeInitializer) -> ToolRegistry {
        let loader = Arc::new(Loader::new(Arc::new(init)));
        loader.spawn();
        let mut registry = ToolRegistry::new(Arc::clone(&loader));
        registry.register_tool(Box::new(EchoTool { loader }));
        registry
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_waits_for_ready_and_runs() {
        let registry = registry(FakeInitializer::new()).await;
        let resp = registry.invoke_tool("echo", json!({"text": "hi"})).await;
        assert_eq!(resp, ToolResponse::text("hi"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_tool_is_tool_error() {
        let registry = registry(FakeInitializer::new()).await;
        let resp = registry.invoke_tool("nope", json!({})).await;
        assert!(resp.is_error);
        assert_eq!(resp.content[0].text, "Unknown tool: nope");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_arguments_are_tool_errors() {
        let registry = registry(FakeInitializer::new()).await;
        let resp = registry.invoke_tool("echo", json!({"text": 5})).await;
        assert!(resp.is_error);
        assert!(resp.content[0].text.contains("Invalid arguments for echo"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_failure_surfaces_per_call() {
        let init = FakeInitializer::new().with(BackendId::Notes, Plan::FailTimes(2));
        let registry = registry(init).await;

        // Eager attempt used the first failure; this call hits the second.
        let resp = registry.invoke_tool("echo", json!({"text": "a"})).await;
        assert!(resp.is_error);
        assert!(resp.content[0].text.contains("failed to initialize notes backend"));

        let resp = registry.invoke_tool("echo", json!({"text": "b"})).await;
        assert_eq!(resp, ToolResponse::text("b"));
    }
}
