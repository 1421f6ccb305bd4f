//! Flow-definition sanitizer (C1, §4.1). Accepts an arbitrary JSON value
//! (already-parsed, or raw text) and returns a canonical `FlowDefinition`:
//! every node has a non-empty string id, a type drawn from the 12 known
//! node types, a finite-number position (defaulting to the origin), and a
//! `data` object deep-cloned to detach it from the input. Unknown node
//! properties are preserved by reusing the input's own `data` object rather
//! than rebuilding it field-by-field.
//!
//! Per-node-type `data` shape constraints are *not* enforced here — per
//! §4.1, those are checked lazily at node-execution time (`node_data`).
//! Sanitization only establishes the graph shape the executor can safely
//! walk.

use super::entity::{Edge, FlowDefinition, Node, NodeType, Position};
use crate::error::EngineError;
use serde_json::Value;

const NODE_TYPES: &[(&str, NodeType)] = &[
    ("trigger", NodeType::Trigger),
    ("message", NodeType::Message),
    ("options", NodeType::Options),
    ("delay", NodeType::Delay),
    ("condition", NodeType::Condition),
    ("api", NodeType::Api),
    ("assign", NodeType::Assign),
    ("media", NodeType::Media),
    ("whatsapp_flow", NodeType::WhatsappFlow),
    ("handoff", NodeType::Handoff),
    ("goto", NodeType::Goto),
    ("end", NodeType::End),
];

fn parse_node_type(raw: &str) -> Option<NodeType> {
    NODE_TYPES.iter().find(|(name, _)| *name == raw).map(|(_, t)| *t)
}

/// Parse and sanitize a flow definition from raw JSON text (e.g. the body
/// of a flow-create/update request).
pub fn sanitize_text(input: &str) -> Result<FlowDefinition, EngineError> {
    let value: Value = serde_json::from_str(input)
        .map_err(|e| EngineError::validation(format!("flow definition is not valid JSON: {e}")))?;
    sanitize(&value)
}

/// Sanitize an already-parsed JSON value into a canonical `FlowDefinition`.
/// Idempotent: `sanitize(sanitize(x)) == sanitize(x)` for every well-formed
/// graph (§8), since the output shape is itself valid input.
pub fn sanitize(input: &Value) -> Result<FlowDefinition, EngineError> {
    let nodes_raw = input
        .get("nodes")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let edges_raw = input
        .get("edges")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let nodes = nodes_raw
        .iter()
        .map(sanitize_node)
        .collect::<Result<Vec<_>, _>>()?;
    let edges = edges_raw
        .iter()
        .map(sanitize_edge)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FlowDefinition { nodes, edges })
}

fn sanitize_node(raw: &Value) -> Result<Node, EngineError> {
    let id = raw
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EngineError::validation("node.id must be a non-empty string"))?
        .to_string();

    let type_str = raw
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::validation(format!("node {id} is missing type")))?;
    let node_type = parse_node_type(type_str)
        .ok_or_else(|| EngineError::validation(format!("node {id} has unknown type {type_str}")))?;

    let position = raw
        .get("position")
        .map(sanitize_position)
        .unwrap_or_default();

    // Deep-clone via `Value::clone` (cheap reference-counted clone for
    // strings/large subtrees under serde_json) detaches `data` from the
    // caller's input, preserving any unknown sub-properties untouched.
    let data = raw
        .get("data")
        .cloned()
        .filter(Value::is_object)
        .unwrap_or_else(|| Value::Object(Default::default()));

    Ok(Node { id, node_type, data, position })
}

fn sanitize_position(raw: &Value) -> Position {
    let x = raw.get("x").and_then(Value::as_f64).filter(|v| v.is_finite()).unwrap_or(0.0);
    let y = raw.get("y").and_then(Value::as_f64).filter(|v| v.is_finite()).unwrap_or(0.0);
    Position { x, y }
}

fn sanitize_edge(raw: &Value) -> Result<Edge, EngineError> {
    let id = non_empty_string(raw, "id")?;
    let source = non_empty_string(raw, "source")?;
    let target = non_empty_string(raw, "target")?;
    let source_handle = optional_handle(raw, "sourceHandle");
    let target_handle = optional_handle(raw, "targetHandle");
    Ok(Edge { id, source, target, source_handle, target_handle })
}

fn non_empty_string(raw: &Value, field: &str) -> Result<String, EngineError> {
    raw.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| EngineError::validation(format!("edge.{field} must be a non-empty string")))
}

/// `undefined` (the key absent) means "unset"; an explicit `null` also maps
/// to `None` here since the distinction carries no behavior in this engine
/// — both leave the handle absent for dispatch purposes (§3).
fn optional_handle(raw: &Value, field: &str) -> Option<String> {
    raw.get(field).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitize_fills_defaults() {
        let input = json!({
            "nodes": [{"id": "n1", "type": "message"}],
            "edges": []
        });
        let def = sanitize(&input).unwrap();
        assert_eq!(def.nodes.len(), 1);
        assert_eq!(def.nodes[0].position.x, 0.0);
        assert!(def.nodes[0].data.is_object());
    }

    #[test]
    fn sanitize_rejects_unknown_node_type() {
        let input = json!({"nodes": [{"id": "n1", "type": "bogus"}], "edges": []});
        assert!(sanitize(&input).is_err());
    }

    #[test]
    fn sanitize_rejects_empty_node_id() {
        let input = json!({"nodes": [{"id": "", "type": "end"}], "edges": []});
        assert!(sanitize(&input).is_err());
    }

    #[test]
    fn sanitize_preserves_unknown_data_properties() {
        let input = json!({
            "nodes": [{"id": "n1", "type": "message", "data": {"text": "hi", "extra": {"nested": 1}}}],
            "edges": []
        });
        let def = sanitize(&input).unwrap();
        assert_eq!(def.nodes[0].data["extra"]["nested"], json!(1));
    }

    #[test]
    fn sanitize_is_idempotent() {
        let input = json!({
            "nodes": [
                {"id": "n1", "type": "trigger", "data": {"keyword": "hola"}, "position": {"x": 1.5, "y": -2.0}},
                {"id": "n2", "type": "end"}
            ],
            "edges": [{"id": "e1", "source": "n1", "target": "n2", "sourceHandle": null}]
        });
        let once = sanitize(&input).unwrap();
        let once_json = serde_json::to_value(&once).unwrap();
        let twice = sanitize(&once_json).unwrap();
        assert_eq!(serde_json::to_value(&once).unwrap(), serde_json::to_value(&twice).unwrap());
    }

    #[test]
    fn sanitize_rejects_non_finite_position_by_defaulting() {
        let input = json!({
            "nodes": [{"id": "n1", "type": "end", "position": {"x": f64::NAN, "y": 2.0}}],
            "edges": []
        });
        // NaN doesn't serialize through serde_json::json!, so build manually.
        let mut input = input;
        input["nodes"][0]["position"]["x"] = Value::String("not-a-number".into());
        let def = sanitize(&input).unwrap();
        assert_eq!(def.nodes[0].position.x, 0.0);
        assert_eq!(def.nodes[0].position.y, 2.0);
    }

    #[test]
    fn sanitize_edge_requires_non_empty_fields() {
        let input = json!({"nodes": [], "edges": [{"id": "", "source": "a", "target": "b"}]});
        assert!(sanitize(&input).is_err());
    }
}
