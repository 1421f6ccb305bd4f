//! Flow, FlowDefinition, Node, and Edge entities (§3, §9 "Node
//! polymorphism"). Sibling modules provide behavior: `sanitize` (C1),
//! `node_data` (per-type validated data), `trigger` (C3), `template` (C2),
//! `executor` (C5).

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FlowStatus {
    Draft,
    Active,
    Paused,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Whatsapp,
}

/// The 12 node types (§3, §4.1). Tagged by `type` in the JSON wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Trigger,
    Message,
    Options,
    Delay,
    Condition,
    Api,
    Assign,
    Media,
    WhatsappFlow,
    Handoff,
    Goto,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Default for Position {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

/// A node as stored after sanitization: shape-validated but with `data`
/// left as an opaque JSON object — per-type constraints are checked at
/// execution time (§4.1), not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub position: Position,
}

/// `sourceHandle` carries dispatch information: `true`/`false` for
/// `condition`, `opt-<i>`/`no-match` for `options`, unused elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, rename = "sourceHandle", skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, rename = "targetHandle", skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowDefinition {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl FlowDefinition {
    pub fn find_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Outgoing edges from `node_id`, in definition order.
    pub fn outgoing_edges(&self, node_id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.source == node_id).collect()
    }

    /// First outgoing edge from `node_id`, used when `nextNodeId` is
    /// unset for non-condition nodes (§4.5).
    pub fn first_outgoing_edge(&self, node_id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.source == node_id)
    }

    /// Outgoing edge from `node_id` whose `sourceHandle` equals `handle`.
    pub fn edge_with_handle(&self, node_id: &str, handle: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.source == node_id && e.source_handle.as_deref() == Some(handle))
    }

    pub fn trigger_nodes(&self) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.node_type == NodeType::Trigger).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaFlowInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<bson::oid::ObjectId>,
    pub user_id: String,
    pub name: String,
    pub trigger: String,
    pub status: FlowStatus,
    pub channel: Channel,
    pub definition: FlowDefinition,
    #[serde(default)]
    pub meta_flow: MetaFlowInfo,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Flow {
    pub fn id_string(&self) -> String {
        self.id.map(|id| id.to_hex()).unwrap_or_default()
    }
}
