//! Name-addressed tool store owned by one orchestrator.
//!
//! Tools live in an arena of slots addressed by [`ToolId`]; a name index
//! points into it. Registering an existing name replaces the tool in place,
//! so its id and its position in [`ToolRegistry::to_tool_definitions`] stay
//! stable. Slots freed by `unregister` are never reused.

use std::collections::HashMap;
use std::sync::Arc;

use super::tool::Tool;
use super::types::ToolDefinition;
use crate::error::StepwiseError;

/// Stable handle to a registered tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToolId(usize);

#[derive(Default)]
pub struct ToolRegistry {
    slots: Vec<Option<Arc<dyn Tool>>>,
    by_name: HashMap<String, ToolId>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tool, replacing any tool already registered under its name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> ToolId {
        let name = tool.name().to_string();
        if let Some(&id) = self.by_name.get(&name) {
            tracing::debug!(tool = %name, "replacing registered tool");
            self.slots[id.0] = Some(tool);
            return id;
        }
        let id = ToolId(self.slots.len());
        self.slots.push(Some(tool));
        self.by_name.insert(name, id);
        id
    }

    /// Register every tool in `tools`, in order.
    pub fn register_all(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Vec<ToolId> {
        tools.into_iter().map(|tool| self.register(tool)).collect()
    }

    /// Remove a tool by name. Returns whether it was present.
    pub fn unregister(&mut self, name: &str) -> bool {
        match self.by_name.remove(name) {
            Some(id) => {
                self.slots[id.0] = None;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.by_name.get(name).and_then(|id| self.get_by_id(*id))
    }

    pub fn get_by_id(&self, id: ToolId) -> Option<Arc<dyn Tool>> {
        self.slots.get(id.0).and_then(Clone::clone)
    }

    /// Like [`get`](Self::get), but reports a missing tool as an error.
    pub fn get_or_err(&self, name: &str) -> Result<Arc<dyn Tool>, StepwiseError> {
        self.get(name).ok_or_else(|| StepwiseError::ToolNotFound {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    fn live(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.slots.iter().flatten()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.live().map(|tool| tool.name()).collect()
    }

    /// Definitions for every registered tool, in registration order.
    pub fn to_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.live()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters().schema.clone(),
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.by_name.clear();
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{AgentTool, ToolOutput, ToolParameters};
    use pretty_assertions::assert_eq;

    fn tool(name: &str, description: &str) -> Arc<dyn Tool> {
        Arc::new(AgentTool::new(
            name,
            description,
            ToolParameters::empty(),
            |_args, _ctx| async { Ok(ToolOutput::text("ok")) },
        ))
    }

    #[test]
    fn unregister_missing_returns_false() {
        let mut registry = ToolRegistry::new();
        assert!(!registry.unregister("nope"));
        registry.register(tool("a", "first"));
        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_register_keeps_latest_and_id() {
        let mut registry = ToolRegistry::new();
        let first = registry.register(tool("search", "old"));
        registry.register(tool("other", "x"));
        let second = registry.register(tool("search", "new"));

        assert_eq!(first, second);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("search").unwrap().description(), "new");
        assert_eq!(registry.names(), vec!["search", "other"]);
    }

    #[test]
    fn definitions_follow_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(tool("b", "bee"));
        registry.register(tool("a", "ay"));
        registry.register(tool("c", "see"));
        registry.unregister("a");

        let names: Vec<_> = registry
            .to_tool_definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn ids_are_not_reused_after_unregister() {
        let mut registry = ToolRegistry::new();
        let a = registry.register(tool("a", ""));
        registry.unregister("a");
        let b = registry.register(tool("b", ""));
        assert_ne!(a, b);
        assert!(registry.get_by_id(a).is_none());
        assert_eq!(registry.get_by_id(b).unwrap().name(), "b");
    }

    #[test]
    fn get_or_err_reports_tool_not_found() {
        let registry = ToolRegistry::new();
        let err = registry.get_or_err("ghost").err().unwrap();
        assert!(matches!(err, StepwiseError::ToolNotFound { ref name } if name == "ghost"));
    }

    #[test]
    fn clear_empties_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(tool("a", ""));
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.to_tool_definitions().is_empty());
    }
}
