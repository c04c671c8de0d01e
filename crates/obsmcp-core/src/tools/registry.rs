//! Tool registry
//!
//! Holds the handlers a protocol engine exposes. One registry is built at
//! startup and shared by every session.

use std::sync::Arc;

use parking_lot::RwLock;
use rmcp::model::Tool;

use super::handler::ToolHandler;
use crate::logging::Logger;

/// Registered tools, in registration order
pub struct ToolRegistry {
    tools: RwLock<Vec<Arc<dyn ToolHandler>>>,
    logger: Arc<dyn Logger>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            tools: RwLock::new(Vec::new()),
            logger,
        }
    }

    /// Add a tool; a tool with the same name is replaced
    pub fn register(&self, handler: Arc<dyn ToolHandler>) {
        let name = handler.definition().name.to_string();
        let mut tools = self.tools.write();
        if let Some(existing) = tools.iter_mut().find(|t| t.definition().name == name) {
            self.logger
                .warn(&format!("[ToolRegistry] Replacing tool: {}", name));
            *existing = handler;
        } else {
            self.logger
                .debug(&format!("[ToolRegistry] Registered tool: {}", name));
            tools.push(handler);
        }
    }

    /// Builder-style `register`
    #[must_use]
    pub fn with_tool(self, handler: Arc<dyn ToolHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Look up a handler by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools
            .read()
            .iter()
            .find(|t| t.definition().name == name)
            .cloned()
    }

    /// Descriptors for `tools/list`
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.read().iter().map(|t| t.definition()).collect()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.read().len()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .definitions()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}
