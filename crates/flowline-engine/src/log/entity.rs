//! Append-only snapshot of a session's `(status, context)` after each
//! inbound processing (§3).

use crate::session::SessionStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLog {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<bson::oid::ObjectId>,
    pub session_id: bson::oid::ObjectId,
    pub status: SessionStatus,
    pub context: Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl SessionLog {
    pub fn snapshot(session_id: bson::oid::ObjectId, status: SessionStatus, context: Value) -> Self {
        Self { id: None, session_id, status, context, created_at: chrono::Utc::now() }
    }
}
