//! Broadcast and BroadcastRecipient entities (§3). A broadcast's
//! `successCount + failureCount <= totalRecipients` at all times;
//! aggregates are derived deltas applied atomically, never recomputed
//! from scratch during reconciliation (§3 invariant, §4.8).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
    Warning,
}

impl RecipientStatus {
    /// Map a raw Meta status string to its canonical value (§4.8 step 2).
    /// Unknown statuses are capitalized rather than rejected.
    pub fn from_meta_status(raw: &str) -> CanonicalStatus {
        match raw {
            "sent" => CanonicalStatus::Known(RecipientStatus::Sent),
            "delivered" => CanonicalStatus::Known(RecipientStatus::Delivered),
            "read" => CanonicalStatus::Known(RecipientStatus::Read),
            "failed" => CanonicalStatus::Known(RecipientStatus::Failed),
            "undelivered" => CanonicalStatus::Known(RecipientStatus::Failed),
            "deleted" => CanonicalStatus::Known(RecipientStatus::Failed),
            "warning" => CanonicalStatus::Known(RecipientStatus::Warning),
            "pending" => CanonicalStatus::Known(RecipientStatus::Pending),
            "queued" => CanonicalStatus::Known(RecipientStatus::Pending),
            other => CanonicalStatus::Unknown(capitalize(other)),
        }
    }

    /// Whether this status counts toward a broadcast's `successCount`
    /// (§4.8 step 4).
    pub fn is_success(self) -> bool {
        matches!(self, RecipientStatus::Sent | RecipientStatus::Delivered | RecipientStatus::Read)
    }

    /// Whether this status counts toward a broadcast's `failureCount`.
    pub fn is_failure(self) -> bool {
        matches!(self, RecipientStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecipientStatus::Pending => "Pending",
            RecipientStatus::Sent => "Sent",
            RecipientStatus::Delivered => "Delivered",
            RecipientStatus::Read => "Read",
            RecipientStatus::Failed => "Failed",
            RecipientStatus::Warning => "Warning",
        }
    }
}

/// A status after §4.8 step 2's mapping: either one of the six known
/// canonical values, or an unknown raw status capitalized as-is (still
/// written to storage, just outside the success/failure delta sets).
#[derive(Debug, Clone)]
pub enum CanonicalStatus {
    Known(RecipientStatus),
    Unknown(String),
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Broadcast {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<bson::oid::ObjectId>,
    pub user_id: String,
    pub total_recipients: i64,
    pub success_count: i64,
    pub failure_count: i64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRecipient {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<bson::oid::ObjectId>,
    pub broadcast_id: bson::oid::ObjectId,
    pub contact_id: bson::oid::ObjectId,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_updated_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_statuses() {
        assert!(matches!(
            RecipientStatus::from_meta_status("undelivered"),
            CanonicalStatus::Known(RecipientStatus::Failed)
        ));
        assert!(matches!(
            RecipientStatus::from_meta_status("queued"),
            CanonicalStatus::Known(RecipientStatus::Pending)
        ));
    }

    #[test]
    fn capitalizes_unknown_statuses() {
        match RecipientStatus::from_meta_status("weird") {
            CanonicalStatus::Unknown(s) => assert_eq!(s, "Weird"),
            _ => panic!("expected unknown"),
        }
    }

    #[test]
    fn success_and_failure_sets() {
        assert!(RecipientStatus::Sent.is_success());
        assert!(RecipientStatus::Delivered.is_success());
        assert!(RecipientStatus::Read.is_success());
        assert!(!RecipientStatus::Pending.is_success());
        assert!(RecipientStatus::Failed.is_failure());
        assert!(!RecipientStatus::Sent.is_failure());
    }
}
