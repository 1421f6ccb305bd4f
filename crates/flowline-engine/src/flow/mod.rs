//! Flow-definition types and behavior: entity shapes (§3), the sanitizer
//! (C1, §4.1), per-node-type data validation, the template interpolator
//! (C2, §4.2), the trigger matcher (C3, §4.3), the restricted boolean
//! condition evaluator (§9), and the executor (C5, §4.5).

pub mod condition;
pub mod entity;
pub mod executor;
pub mod node_data;
pub mod repository;
pub mod sanitize;
pub mod template;
pub mod trigger;

pub use entity::{Channel, Edge, Flow, FlowDefinition, FlowStatus, MetaFlowInfo, Node, NodeType, Position};
