//! Broadcast/BroadcastRecipient persistence. `$inc`-based atomic delta
//! updates grounded on `fc-stream/src/projection.rs`'s dispatch-job-count
//! increment pattern — reconciling one status must never stomp a
//! concurrently-applied delta for another (§3, §4.8).

use super::entity::{Broadcast, BroadcastRecipient};
use crate::error::Result;
use bson::oid::ObjectId;
use bson::{doc, Bson};
use mongodb::{Collection, Database};

pub struct BroadcastRepository {
    broadcasts: Collection<Broadcast>,
    recipients: Collection<BroadcastRecipient>,
}

/// Fields changed on a recipient by one status-reconciliation pass (§4.8
/// step 3), plus the success/failure aggregate deltas to apply alongside
/// it (step 4).
pub struct RecipientUpdate {
    pub status: Option<String>,
    pub status_updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub clear_error: bool,
    pub error: Option<String>,
    pub conversation_id: Option<String>,
    pub success_delta: i64,
    pub failure_delta: i64,
}

impl BroadcastRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            broadcasts: db.collection("broadcasts"),
            recipients: db.collection("broadcast_recipients"),
        }
    }

    pub async fn find_broadcast_by_id(&self, id: &ObjectId) -> Result<Option<Broadcast>> {
        Ok(self.broadcasts.find_one(doc! { "_id": id }).await?)
    }

    /// Locate the recipient by `messageId`, restricted to broadcasts owned
    /// by `user_id` (§4.8 step 1: "the parent broadcast's `userId`
    /// matches the tenant").
    pub async fn find_recipient_by_message_id(
        &self,
        user_id: &str,
        message_id: &str,
    ) -> Result<Option<(BroadcastRecipient, Broadcast)>> {
        let Some(recipient) = self.recipients.find_one(doc! { "messageId": message_id }).await? else {
            return Ok(None);
        };
        let Some(broadcast) = self.broadcasts.find_one(doc! { "_id": &recipient.broadcast_id }).await? else {
            return Ok(None);
        };
        if broadcast.user_id != user_id {
            return Ok(None);
        }
        Ok(Some((recipient, broadcast)))
    }

    /// Apply a recipient field update and its aggregate deltas in one
    /// atomic step per collection: the recipient document update, then
    /// (if non-zero) a single `$inc` on the broadcast's counters.
    pub async fn apply_reconciliation(
        &self,
        recipient_id: &ObjectId,
        broadcast_id: &ObjectId,
        update: RecipientUpdate,
    ) -> Result<()> {
        let mut set_doc = doc! {};
        let mut unset_doc = doc! {};
        if let Some(status) = &update.status {
            set_doc.insert("status", status);
        }
        if let Some(ts) = update.status_updated_at {
            set_doc.insert("statusUpdatedAt", bson::DateTime::from_chrono(ts));
        }
        if update.clear_error {
            unset_doc.insert("error", Bson::String(String::new()));
        } else if let Some(error) = &update.error {
            set_doc.insert("error", error);
        }
        if let Some(conversation_id) = &update.conversation_id {
            set_doc.insert("conversationId", conversation_id);
        }

        let mut recipient_update = doc! {};
        if !set_doc.is_empty() {
            recipient_update.insert("$set", set_doc);
        }
        if !unset_doc.is_empty() {
            recipient_update.insert("$unset", unset_doc);
        }
        if !recipient_update.is_empty() {
            self.recipients
                .update_one(doc! { "_id": recipient_id }, recipient_update)
                .await?;
        }

        if update.success_delta != 0 || update.failure_delta != 0 {
            self.broadcasts
                .update_one(
                    doc! { "_id": broadcast_id },
                    doc! {
                        "$inc": {
                            "successCount": update.success_delta,
                            "failureCount": update.failure_delta,
                        }
                    },
                )
                .await?;
        }
        Ok(())
    }
}
