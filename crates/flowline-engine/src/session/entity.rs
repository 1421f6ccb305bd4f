//! Session entity (§3). Uniqueness: `(contactId, flowId)`. `currentNodeId`,
//! when non-null, must always reference a node in the latest snapshot of
//! the owning flow's definition (§3 invariant); a violation is surfaced by
//! the executor as `Errored`, not enforced at the storage layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Errored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<bson::oid::ObjectId>,
    pub contact_id: bson::oid::ObjectId,
    pub flow_id: bson::oid::ObjectId,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node_id: Option<String>,
    #[serde(default)]
    pub context: Value,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Session {
    pub fn id_string(&self) -> String {
        self.id.map(|id| id.to_hex()).unwrap_or_default()
    }

    pub fn new_active(contact_id: bson::oid::ObjectId, flow_id: bson::oid::ObjectId) -> Self {
        Self {
            id: None,
            contact_id,
            flow_id,
            status: SessionStatus::Active,
            current_node_id: None,
            context: Value::Object(Default::default()),
            updated_at: chrono::Utc::now(),
        }
    }

    /// Reset a Completed/Errored session back to Active with cleared
    /// `currentNodeId` and empty context on re-entry (§3, §4.6 step 2).
    pub fn reset_to_active(&mut self) {
        self.status = SessionStatus::Active;
        self.current_node_id = None;
        self.context = Value::Object(Default::default());
    }
}
