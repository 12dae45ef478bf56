use std::sync::Arc;

use crate::mcp::backend::{AutomationInitializer, Initializer};
use crate::mcp::loader::Loader;
use crate::mcp::toolkit::ToolRegistry;
use crate::mcp::tools::build_registry;
use crate::shared::config::AppConfig;

#[derive(Clone)]
pub struct McpState {
    pub config: Arc<AppConfig>,
    pub loader: Arc<Loader>,
    pub registry: Arc<ToolRegistry>,
}

impl McpState {
    /// Build state over the real automation backends and start the eager
    /// load in the background.
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let initializer = Arc::new(AutomationInitializer::new(Arc::clone(&config)));
        Self::with_initializer(config, initializer)
    }

    pub fn with_initializer(config: Arc<AppConfig>, initializer: Arc<dyn Initializer>) -> Self {
        let loader = Arc::new(Loader::new(initializer));
        loader.spawn();
        let registry = Arc::new(build_registry(Arc::clone(&loader)));
        Self {
            config,
            loader,
            registry,
        }
    }
}
