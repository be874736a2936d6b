//! # MRS Common Library
//!
//! Shared code for the market research service crates:
//! - Database schema, migrations and typed repositories
//! - Domain models (projects, topics, queries, research results)
//! - Event types (MrsEvent enum) and the EventBus
//! - Configuration loading
//! - Slug and identifier helpers

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod ids;
pub mod slug;

pub use error::{Error, Result};
