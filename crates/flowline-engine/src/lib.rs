//! Flow execution engine.
//!
//! Module organization (aggregate-based, one module per persisted entity
//! plus the pure flow-graph modules that do not own storage):
//!
//! - `flow` — Flow/FlowDefinition/Node/Edge entities, the sanitizer (C1),
//!   node-data validation, the template interpolator (C2), the trigger
//!   matcher (C3), the restricted condition evaluator, and the executor
//!   (C5).
//! - `user` — tenant entity + repository, looked up by Meta phone number id.
//! - `contact` — Contact entity + repository + resolver (C6, contact half).
//! - `session` — Session entity + repository + resolver (C6, session half).
//! - `broadcast` — Broadcast/BroadcastRecipient entities + repository and
//!   the status reconciler (C8).
//! - `log` — append-only session snapshot entity + repository.
//! - `webhook` — inbound payload shapes and the dispatch fan-out (C7).
//!
//! `context` and `error` are cross-cutting: path-based JSON access and the
//! crate's error taxonomy respectively.

pub mod broadcast;
pub mod contact;
pub mod context;
pub mod error;
pub mod flow;
pub mod indexes;
pub mod log;
pub mod session;
pub mod user;
pub mod webhook;
