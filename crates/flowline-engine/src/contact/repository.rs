//! Contact persistence. Grounded on
//! `fc-platform/src/role/repository.rs`'s CRUD shape and
//! `fc-stream/src/projection.rs`'s duplicate-key re-read pattern
//! (`is_duplicate_key_error`) for the insert race in `resolver`.

use super::entity::Contact;
use crate::error::Result;
use bson::doc;
use bson::oid::ObjectId;
use futures::TryStreamExt;
use mongodb::{Collection, Database};

pub struct ContactRepository {
    collection: Collection<Contact>,
}

impl ContactRepository {
    pub fn new(db: &Database) -> Self {
        Self { collection: db.collection("contacts") }
    }

    pub async fn insert(&self, contact: &Contact) -> Result<ObjectId> {
        let result = self.collection.insert_one(contact).await?;
        Ok(result.inserted_id.as_object_id().expect("contact _id is an ObjectId"))
    }

    pub async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Contact>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    /// Find a contact owned by `user_id` whose stored phone is any of
    /// `phones` (§4.6 step 2-3: canonical form, raw trimmed form, and
    /// alternates).
    pub async fn find_by_user_and_phones(&self, user_id: &str, phones: &[String]) -> Result<Option<Contact>> {
        Ok(self
            .collection
            .find_one(doc! { "userId": user_id, "phone": { "$in": phones } })
            .await?)
    }

    pub async fn update_phone(&self, id: &ObjectId, phone: &str) -> Result<()> {
        self.collection
            .update_one(doc! { "_id": id }, doc! { "$set": { "phone": phone } })
            .await?;
        Ok(())
    }

    pub async fn update_name(&self, id: &ObjectId, name: &str) -> Result<()> {
        self.collection
            .update_one(doc! { "_id": id }, doc! { "$set": { "name": name } })
            .await?;
        Ok(())
    }

    #[allow(dead_code)]
    pub async fn find_by_user(&self, user_id: &str) -> Result<Vec<Contact>> {
        let cursor = self.collection.find(doc! { "userId": user_id }).await?;
        Ok(cursor.try_collect().await?)
    }
}
