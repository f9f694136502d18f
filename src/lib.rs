//! Scrape public health-data pages, diff against stored state, and push
//! changes to Telegram subscribers.
//!
//! The crate is organized around one `engine::Engine` cycle: each source is
//! fetched through a collaborator trait (`sources`), normalized into typed
//! records (`normalize`), reconciled against relational and key-value state
//! (`db`, `kv`), and deltas are fanned out to subscribed chats
//! (`broadcast`, `gateway`).

pub mod broadcast;
pub mod config;
pub mod db;
pub mod diag;
pub mod engine;
pub mod gateway;
pub mod handlers;
pub mod kv;
pub mod normalize;
pub mod sources;
