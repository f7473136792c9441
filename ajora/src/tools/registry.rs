use std::sync::RwLock;

use tracing::{debug, warn};

use crate::sync::{read, write};
use crate::tools::{FrontendTool, ToolDefinition, WILDCARD_TOOL_NAME};

/// Flat, insertion-ordered list of frontend tools.
///
/// Identity is `(name, agent_id)`: the same name may be registered once globally and once per
/// agent. Lookup for an agent prefers its scoped tool over the global one.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<Vec<FrontendTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(tools: Vec<FrontendTool>) -> Self {
        let registry = Self::new();
        registry.set(tools);
        registry
    }

    /// Adds `tool` unless one with the same name and scope exists; returns whether it was added.
    pub fn add(&self, tool: FrontendTool) -> bool {
        let mut tools = write(&self.tools);
        if tools
            .iter()
            .any(|t| t.name == tool.name && t.agent_id == tool.agent_id)
        {
            warn!(
                tool = %tool.name,
                agent_id = ?tool.agent_id,
                "tool already registered for this scope, ignoring"
            );
            return false;
        }
        debug!(tool = %tool.name, agent_id = ?tool.agent_id, "tool added");
        tools.push(tool);
        true
    }

    /// Removes the tool named `name` in the given scope (`None` = the global one).
    pub fn remove(&self, name: &str, agent_id: Option<&str>) -> bool {
        let mut tools = write(&self.tools);
        let before = tools.len();
        tools.retain(|t| !(t.name == name && t.agent_id.as_deref() == agent_id));
        before != tools.len()
    }

    /// Resolves `name` for `agent_id`: the agent-scoped tool first, then the global one.
    pub fn get(&self, name: &str, agent_id: Option<&str>) -> Option<FrontendTool> {
        let tools = read(&self.tools);
        if let Some(id) = agent_id {
            if let Some(scoped) = tools
                .iter()
                .find(|t| t.name == name && t.agent_id.as_deref() == Some(id))
            {
                return Some(scoped.clone());
            }
        }
        tools
            .iter()
            .find(|t| t.name == name && t.agent_id.is_none())
            .cloned()
    }

    /// Replaces every registered tool. Later duplicates of an `(name, agent_id)` pair are dropped.
    pub fn set(&self, new_tools: Vec<FrontendTool>) {
        let mut deduped: Vec<FrontendTool> = Vec::with_capacity(new_tools.len());
        for tool in new_tools {
            if deduped
                .iter()
                .any(|t| t.name == tool.name && t.agent_id == tool.agent_id)
            {
                warn!(tool = %tool.name, "duplicate tool in set_tools, keeping the first");
                continue;
            }
            deduped.push(tool);
        }
        *write(&self.tools) = deduped;
    }

    pub fn list(&self) -> Vec<FrontendTool> {
        read(&self.tools).clone()
    }

    /// Tool definitions exposed to `agent_id`'s model: applicable tools only, one per name with
    /// the scoped tool winning, wildcard excluded. Pure read.
    pub fn definitions_for(&self, agent_id: Option<&str>) -> Vec<ToolDefinition> {
        let tools = read(&self.tools);
        let mut defs: Vec<ToolDefinition> = Vec::new();
        for tool in tools.iter() {
            if tool.name == WILDCARD_TOOL_NAME || !tool.applies_to(agent_id) {
                continue;
            }
            match defs.iter_mut().find(|d| d.name == tool.name) {
                Some(existing) if tool.agent_id.is_some() => *existing = tool.definition(),
                Some(_) => {}
                None => defs.push(tool.definition()),
            }
        }
        defs
    }
}
