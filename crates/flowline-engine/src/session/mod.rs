//! Session entity, repository, and resolver (§3, §4.6 C6 session half).

pub mod entity;
pub mod repository;
pub mod resolver;

pub use entity::{Session, SessionStatus};
pub use repository::SessionRepository;
