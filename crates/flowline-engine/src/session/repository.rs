//! Session persistence. Sessions are updated by primary key — the
//! concurrency model (§5) relies on that plus the `(contactId, flowId)`
//! uniqueness constraint rather than in-process locking.

use super::entity::{Session, SessionStatus};
use crate::error::Result;
use bson::doc;
use bson::oid::ObjectId;
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{Collection, Database};
use serde_json::Value;

pub struct SessionRepository {
    collection: Collection<Session>,
}

impl SessionRepository {
    pub fn new(db: &Database) -> Self {
        Self { collection: db.collection("sessions") }
    }

    pub async fn insert(&self, session: &Session) -> Result<ObjectId> {
        let result = self.collection.insert_one(session).await?;
        Ok(result.inserted_id.as_object_id().expect("session _id is an ObjectId"))
    }

    pub async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Session>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    pub async fn find_by_contact_and_flow(&self, contact_id: &ObjectId, flow_id: &ObjectId) -> Result<Option<Session>> {
        Ok(self
            .collection
            .find_one(doc! { "contactId": contact_id, "flowId": flow_id })
            .await?)
    }

    /// The most recently updated Active/Paused session for a contact
    /// (§4.6: "prefer an existing Active/Paused session ... over starting
    /// a new one"). Every flow in this system is WhatsApp-channel, so no
    /// separate channel filter is needed here.
    pub async fn find_latest_open_by_contact(&self, contact_id: &ObjectId) -> Result<Option<Session>> {
        let options = FindOptions::builder().sort(doc! { "updatedAt": -1 }).limit(1).build();
        let mut cursor = self
            .collection
            .find(doc! { "contactId": contact_id, "status": { "$in": ["Active", "Paused"] } })
            .with_options(options)
            .await?;
        Ok(cursor.try_next().await?)
    }

    pub async fn update_state(
        &self,
        id: &ObjectId,
        status: SessionStatus,
        current_node_id: Option<&str>,
        context: &Value,
    ) -> Result<()> {
        let status_str = status_as_str(status);
        let context_bson = bson::to_bson(context)?;
        self.collection
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "status": status_str,
                        "currentNodeId": current_node_id,
                        "context": context_bson,
                        "updatedAt": bson::DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }

    pub async fn reset_to_active(&self, id: &ObjectId) -> Result<()> {
        self.collection
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "status": "Active",
                        "currentNodeId": bson::Bson::Null,
                        "context": {},
                        "updatedAt": bson::DateTime::now(),
                    }
                },
            )
            .await?;
        Ok(())
    }
}

fn status_as_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Active => "Active",
        SessionStatus::Paused => "Paused",
        SessionStatus::Completed => "Completed",
        SessionStatus::Errored => "Errored",
    }
}
