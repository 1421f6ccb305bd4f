//! Flow persistence (§3, §6 "Flow CRUD endpoints are external
//! collaborators"). This repository is the thin slice the engine itself
//! needs: lookup by id and by owning user, and the active/WhatsApp-channel
//! candidate set §4.3's trigger matcher selects over. Grounded on
//! `fc-platform/src/role/repository.rs`'s CRUD shape.

use super::entity::{Channel, Flow, FlowStatus};
use crate::error::Result;
use bson::doc;
use bson::oid::ObjectId;
use futures::TryStreamExt;
use mongodb::{Collection, Database};

pub struct FlowRepository {
    collection: Collection<Flow>,
}

impl FlowRepository {
    pub fn new(db: &Database) -> Self {
        Self { collection: db.collection("flows") }
    }

    pub async fn insert(&self, flow: &Flow) -> Result<ObjectId> {
        let result = self.collection.insert_one(flow).await?;
        Ok(result.inserted_id.as_object_id().expect("flow _id is an ObjectId"))
    }

    pub async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Flow>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    pub async fn find_by_user(&self, user_id: &str) -> Result<Vec<Flow>> {
        let cursor = self.collection.find(doc! { "userId": user_id }).await?;
        Ok(cursor.try_collect().await?)
    }

    /// The candidate set for inbound trigger matching (§4.3): a tenant's
    /// `Active`, WhatsApp-channel flows.
    pub async fn find_active_whatsapp_by_user(&self, user_id: &str) -> Result<Vec<Flow>> {
        let cursor = self
            .collection
            .find(doc! {
                "userId": user_id,
                "status": "Active",
                "channel": "whatsapp",
            })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn update_definition(&self, id: &ObjectId, definition: &super::entity::FlowDefinition) -> Result<()> {
        let definition_bson = bson::to_bson(definition)?;
        self.collection
            .update_one(doc! { "_id": id }, doc! { "$set": { "definition": definition_bson, "updatedAt": bson::DateTime::now() } })
            .await?;
        Ok(())
    }

    pub async fn update_status(&self, id: &ObjectId, status: FlowStatus) -> Result<()> {
        let status_str = status_as_str(status);
        self.collection
            .update_one(doc! { "_id": id }, doc! { "$set": { "status": status_str, "updatedAt": bson::DateTime::now() } })
            .await?;
        Ok(())
    }

    pub async fn is_active_whatsapp(&self, id: &ObjectId) -> Result<bool> {
        let count = self
            .collection
            .count_documents(doc! { "_id": id, "status": "Active", "channel": "whatsapp" })
            .await?;
        Ok(count > 0)
    }
}

fn status_as_str(status: FlowStatus) -> &'static str {
    match status {
        FlowStatus::Draft => "Draft",
        FlowStatus::Active => "Active",
        FlowStatus::Paused => "Paused",
        FlowStatus::Archived => "Archived",
    }
}

#[allow(dead_code)]
fn channel_as_str(channel: Channel) -> &'static str {
    match channel {
        Channel::Whatsapp => "whatsapp",
    }
}
