//! Log persistence: append-only, write-only from the engine's point of
//! view.

use super::entity::SessionLog;
use crate::error::Result;
use mongodb::{Collection, Database};

pub struct LogRepository {
    collection: Collection<SessionLog>,
}

impl LogRepository {
    pub fn new(db: &Database) -> Self {
        Self { collection: db.collection("logs") }
    }

    pub async fn insert(&self, log: &SessionLog) -> Result<()> {
        self.collection.insert_one(log).await?;
        Ok(())
    }
}
