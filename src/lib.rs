//! Hybrid semantic matching and request backlog for a business-software
//! marketplace.
//!
//! Two subsystems share the LLM gateway and the catalog:
//! - the interactive matcher parses multi-turn buyer dialogs into a
//!   requirement profile and ranks applications with a hybrid of vector
//!   similarity, categorical overlap, and hard constraints;
//! - the backlog deduplicator attaches feature requests to near-duplicate
//!   cards or opens new ones.

pub mod backlog;
pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod llm;
pub mod matcher;
pub mod types;
