//! Append-only session-snapshot log (§3). Written once per inbound-event
//! processing by the executor's caller, never read back by the engine
//! itself — it exists purely as an audit trail for the owning tenant.

pub mod entity;
pub mod repository;

pub use entity::SessionLog;
pub use repository::LogRepository;
