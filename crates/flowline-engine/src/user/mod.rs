//! Tenant (`User`) entity and repository (§3). Lifecycle (creation,
//! credential rotation, settings UI) is managed externally; the engine
//! only reads a tenant's Meta credentials and resolves inbound webhook
//! traffic to a tenant by `metaPhoneNumberId` (§4.7, C7 step 1).

pub mod entity;
pub mod repository;

pub use entity::User;
pub use repository::UserRepository;
