//! MongoDB index initialization (§3, §5). Grounded on
//! `fc-platform/src/shared/indexes.rs`'s per-collection `IndexModel`
//! builder pattern: one function per collection, called once from the
//! binary's startup sequence.

use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Database, IndexModel};
use tracing::info;

/// Create every index this engine relies on for uniqueness or lookup
/// performance. Safe to call on every startup: `create_index` is a no-op
/// when an equivalent index already exists.
pub async fn initialize_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    info!("initializing MongoDB indexes");

    create_user_indexes(db).await?;
    create_contact_indexes(db).await?;
    create_flow_indexes(db).await?;
    create_session_indexes(db).await?;
    create_broadcast_indexes(db).await?;
    create_log_indexes(db).await?;

    info!("MongoDB indexes initialized");
    Ok(())
}

async fn create_user_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let users = db.collection::<mongodb::bson::Document>("users");

    // Inbound tenant resolution by Meta phone number id (§4.7 step 1).
    users
        .create_index(
            IndexModel::builder()
                .keys(doc! { "metaPhoneNumberId": 1 })
                .options(IndexOptions::builder().unique(true).sparse(true).background(true).build())
                .build(),
        )
        .await?;

    info!("created indexes on users");
    Ok(())
}

async fn create_contact_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let contacts = db.collection::<mongodb::bson::Document>("contacts");

    // Uniqueness: (userId, phone) (§3).
    contacts
        .create_index(
            IndexModel::builder()
                .keys(doc! { "userId": 1, "phone": 1 })
                .options(IndexOptions::builder().unique(true).background(true).build())
                .build(),
        )
        .await?;

    info!("created indexes on contacts");
    Ok(())
}

async fn create_flow_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let flows = db.collection::<mongodb::bson::Document>("flows");

    flows
        .create_index(
            IndexModel::builder()
                .keys(doc! { "userId": 1 })
                .options(IndexOptions::builder().background(true).build())
                .build(),
        )
        .await?;

    // The candidate set for trigger matching (§4.3): active, WhatsApp-channel
    // flows owned by one tenant.
    flows
        .create_index(
            IndexModel::builder()
                .keys(doc! { "userId": 1, "status": 1, "channel": 1 })
                .options(IndexOptions::builder().background(true).build())
                .build(),
        )
        .await?;

    info!("created indexes on flows");
    Ok(())
}

async fn create_session_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let sessions = db.collection::<mongodb::bson::Document>("sessions");

    // Uniqueness: (contactId, flowId) (§3).
    sessions
        .create_index(
            IndexModel::builder()
                .keys(doc! { "contactId": 1, "flowId": 1 })
                .options(IndexOptions::builder().unique(true).background(true).build())
                .build(),
        )
        .await?;

    // Latest open session for a contact (§4.6).
    sessions
        .create_index(
            IndexModel::builder()
                .keys(doc! { "contactId": 1, "status": 1, "updatedAt": -1 })
                .options(IndexOptions::builder().background(true).build())
                .build(),
        )
        .await?;

    info!("created indexes on sessions");
    Ok(())
}

async fn create_broadcast_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let broadcasts = db.collection::<mongodb::bson::Document>("broadcasts");
    broadcasts
        .create_index(
            IndexModel::builder()
                .keys(doc! { "userId": 1 })
                .options(IndexOptions::builder().background(true).build())
                .build(),
        )
        .await?;

    let recipients = db.collection::<mongodb::bson::Document>("broadcast_recipients");

    // Reconciliation lookup by Meta messageId (§4.8 step 1).
    recipients
        .create_index(
            IndexModel::builder()
                .keys(doc! { "messageId": 1 })
                .options(IndexOptions::builder().sparse(true).background(true).build())
                .build(),
        )
        .await?;

    recipients
        .create_index(
            IndexModel::builder()
                .keys(doc! { "broadcastId": 1 })
                .options(IndexOptions::builder().background(true).build())
                .build(),
        )
        .await?;

    info!("created indexes on broadcasts, broadcast_recipients");
    Ok(())
}

async fn create_log_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let logs = db.collection::<mongodb::bson::Document>("logs");
    logs.create_index(
        IndexModel::builder()
            .keys(doc! { "sessionId": 1, "createdAt": -1 })
            .options(IndexOptions::builder().background(true).build())
            .build(),
    )
    .await?;

    info!("created indexes on logs");
    Ok(())
}
