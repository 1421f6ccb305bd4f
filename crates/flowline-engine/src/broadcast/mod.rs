//! Broadcast/BroadcastRecipient entities, repository, and the delivery
//! status reconciler (§3, §4.8 C8).

pub mod entity;
pub mod reconciler;
pub mod repository;

pub use entity::{Broadcast, BroadcastRecipient, RecipientStatus};
pub use repository::BroadcastRepository;
