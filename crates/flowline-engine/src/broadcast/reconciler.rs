//! Broadcast delivery-status reconciler (C8, §4.8).

use super::entity::{CanonicalStatus, RecipientStatus};
use super::repository::{BroadcastRepository, RecipientUpdate};
use crate::error::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// One error entry on an inbound Meta status callback.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StatusError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "error_data")]
    pub error_data: Option<StatusErrorData>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StatusErrorData {
    #[serde(default)]
    pub details: Option<String>,
}

/// One `statuses[]` entry from a Meta webhook change value.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundStatus {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub errors: Vec<StatusError>,
    #[serde(default)]
    pub conversation: Option<InboundConversation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundConversation {
    pub id: String,
}

/// Extract the most specific error message for a failure status (§4.8
/// step 3): `error_data.details` → `message` → `title` → `"Error code
/// <code>"` → the fixed fallback.
fn extract_error_message(errors: &[StatusError]) -> String {
    let Some(first) = errors.first() else {
        return "Meta reported delivery failure".to_string();
    };
    if let Some(details) = first.error_data.as_ref().and_then(|d| d.details.clone()) {
        if !details.is_empty() {
            return details;
        }
    }
    if let Some(message) = &first.message {
        if !message.is_empty() {
            return message.clone();
        }
    }
    if let Some(title) = &first.title {
        if !title.is_empty() {
            return title.clone();
        }
    }
    if let Some(code) = first.code {
        return format!("Error code {code}");
    }
    "Meta reported delivery failure".to_string()
}

/// Parse `timestamp` as Unix seconds if numeric, otherwise as ISO-8601
/// (§4.8 step 3).
fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    if let Ok(seconds) = timestamp.parse::<i64>() {
        return Utc.timestamp_opt(seconds, 0).single();
    }
    DateTime::parse_from_rfc3339(timestamp).ok().map(|dt| dt.with_timezone(&Utc))
}

/// Pure computation of the update to apply for one inbound status against
/// a recipient's current stored status string (§4.8 steps 2-4).
pub fn compute_update(current_status: &str, inbound: &InboundStatus) -> RecipientUpdate {
    let old_known = parse_known(current_status);
    let old_success = old_known.map_or(false, RecipientStatus::is_success);
    let old_failure = old_known.map_or(false, RecipientStatus::is_failure);

    let canonical = RecipientStatus::from_meta_status(&inbound.status);
    let (status_str, new_known) = match &canonical {
        CanonicalStatus::Known(status) => (Some(status.as_str().to_string()), Some(*status)),
        CanonicalStatus::Unknown(s) => (Some(s.clone()), None),
    };
    let new_success = new_known.map_or(false, RecipientStatus::is_success);
    let new_failure = new_known.map_or(false, RecipientStatus::is_failure);

    let is_failure_status = new_known == Some(RecipientStatus::Failed);

    RecipientUpdate {
        status: status_str,
        status_updated_at: inbound.timestamp.as_deref().and_then(parse_timestamp),
        clear_error: !is_failure_status,
        error: is_failure_status.then(|| extract_error_message(&inbound.errors)),
        conversation_id: inbound.conversation.as_ref().map(|c| c.id.clone()),
        success_delta: (new_success as i64) - (old_success as i64),
        failure_delta: (new_failure as i64) - (old_failure as i64),
    }
}

fn parse_known(status: &str) -> Option<RecipientStatus> {
    match status {
        "Pending" => Some(RecipientStatus::Pending),
        "Sent" => Some(RecipientStatus::Sent),
        "Delivered" => Some(RecipientStatus::Delivered),
        "Read" => Some(RecipientStatus::Read),
        "Failed" => Some(RecipientStatus::Failed),
        "Warning" => Some(RecipientStatus::Warning),
        _ => None,
    }
}

/// Reconcile one inbound status against persistence (§4.8 full flow).
/// Statuses with an empty `id` are ignored; an unmatched `messageId` is
/// also a no-op (the status may belong to a message this engine never
/// sent, e.g. a manual-trigger test send).
pub async fn reconcile_one(repo: &BroadcastRepository, user_id: &str, inbound: &InboundStatus) -> Result<()> {
    if inbound.id.is_empty() {
        return Ok(());
    }
    let Some((recipient, broadcast)) = repo.find_recipient_by_message_id(user_id, &inbound.id).await? else {
        return Ok(());
    };
    let update = compute_update(&recipient.status, inbound);
    let recipient_id = recipient.id.expect("persisted recipient has an id");
    let broadcast_id = broadcast.id.expect("persisted broadcast has an id");
    repo.apply_reconciliation(&recipient_id, &broadcast_id, update).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(id: &str, raw: &str) -> InboundStatus {
        InboundStatus { id: id.to_string(), status: raw.to_string(), timestamp: None, errors: vec![], conversation: None }
    }

    #[test]
    fn sent_to_failed_swaps_success_for_failure_delta() {
        let inbound = InboundStatus {
            errors: vec![StatusError { message: Some("Phone not on WhatsApp".into()), ..Default::default() }],
            ..status("m1", "failed")
        };
        let update = compute_update("Sent", &inbound);
        assert_eq!(update.success_delta, -1);
        assert_eq!(update.failure_delta, 1);
        assert_eq!(update.status.as_deref(), Some("Failed"));
        assert_eq!(update.error.as_deref(), Some("Phone not on WhatsApp"));
    }

    #[test]
    fn delivered_to_read_has_no_aggregate_delta() {
        let inbound = status("m1", "read");
        let update = compute_update("Delivered", &inbound);
        assert_eq!(update.success_delta, 0);
        assert_eq!(update.failure_delta, 0);
        assert!(update.clear_error);
    }

    #[test]
    fn pending_to_sent_has_no_delta_either_set() {
        let inbound = status("m1", "sent");
        let update = compute_update("Pending", &inbound);
        assert_eq!(update.success_delta, 1);
        assert_eq!(update.failure_delta, 0);
    }

    #[test]
    fn error_message_fallback_chain() {
        let with_details = InboundStatus {
            errors: vec![StatusError {
                error_data: Some(StatusErrorData { details: Some("detail".into()) }),
                message: Some("msg".into()),
                title: Some("title".into()),
                code: Some(1),
            }],
            ..status("m1", "failed")
        };
        assert_eq!(extract_error_message(&with_details.errors), "detail");

        let code_only = InboundStatus {
            errors: vec![StatusError { code: Some(131056), ..Default::default() }],
            ..status("m1", "failed")
        };
        assert_eq!(extract_error_message(&code_only.errors), "Error code 131056");

        let none = status("m1", "failed");
        assert_eq!(extract_error_message(&none.errors), "Meta reported delivery failure");
    }

    #[test]
    fn timestamp_parses_numeric_seconds_and_iso8601() {
        let numeric = parse_timestamp("1700000000").unwrap();
        assert_eq!(numeric.timestamp(), 1_700_000_000);
        let iso = parse_timestamp("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(iso.timestamp(), 1_704_067_200);
    }

    #[test]
    fn unknown_status_is_capitalized_and_outside_both_sets() {
        let inbound = status("m1", "weird");
        let update = compute_update("Sent", &inbound);
        assert_eq!(update.status.as_deref(), Some("Weird"));
        assert_eq!(update.success_delta, -1);
        assert_eq!(update.failure_delta, 0);
    }
}
