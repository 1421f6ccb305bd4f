//! Contact entity, repository, and resolver (§3, §4.6 C6 contact half).

pub mod entity;
pub mod repository;
pub mod resolver;

pub use entity::Contact;
pub use repository::ContactRepository;
pub use resolver::{get_or_create_contact, GetOrCreateContactInput};
