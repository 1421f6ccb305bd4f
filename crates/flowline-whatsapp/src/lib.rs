//! Outbound WhatsApp message builder and Meta Graph API client (C4).

pub mod client;
pub mod error;
pub mod payload;

pub use client::{Credentials, SendMessageResult, WhatsAppClient, WhatsAppClientConfig};
pub use error::SendError;
pub use payload::{build_payload, MediaType, PayloadError, SendRequest};
