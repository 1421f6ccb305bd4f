//! Tenant repository. Grounded on `fc-platform/src/role/repository.rs`'s
//! CRUD shape; this engine only ever reads users, never creates or
//! mutates them (§1, "Authentication, per-user settings ... out of
//! scope").

use super::entity::User;
use crate::error::Result;
use bson::doc;
use bson::oid::ObjectId;
use mongodb::{Collection, Database};

pub struct UserRepository {
    collection: Collection<User>,
}

impl UserRepository {
    pub fn new(db: &Database) -> Self {
        Self { collection: db.collection("users") }
    }

    pub async fn find_by_id(&self, id: &ObjectId) -> Result<Option<User>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    /// Resolve the tenant owning a Meta phone number id (§4.7, C7 step 1).
    pub async fn find_by_phone_number_id(&self, phone_number_id: &str) -> Result<Option<User>> {
        Ok(self
            .collection
            .find_one(doc! { "metaPhoneNumberId": phone_number_id })
            .await?)
    }
}
