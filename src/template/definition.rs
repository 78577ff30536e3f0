//! Workflow definition — the node graph shipped to the external engine.
//!
//! Definitions are produced fresh per deployment and never mutated in
//! place; a config change produces a new definition and a new deployment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The node types the generated automation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Mailbox poll trigger.
    Trigger,
    /// Keyword-driven category decision.
    Categorizer,
    /// Per-category routing condition.
    Branch,
    /// Applies the mailbox label for the decided category.
    AssignLabel,
    /// Notifies the configured team addresses.
    Notify,
}

/// A single node in the workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Stable node id, referenced by connections.
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    pub parameters: serde_json::Value,
}

/// A directed graph of typed nodes with named connections.
///
/// `connections` maps a source node id to its successors. A `BTreeMap`
/// keeps serialization order stable so identical inputs serialize to
/// identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub name: String,
    pub nodes: Vec<Node>,
    pub connections: BTreeMap<String, Vec<String>>,
    pub settings: serde_json::Value,
}

impl WorkflowDefinition {
    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Look up a node by id, mutably.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }
}
