//! Database layer
//!
//! SQLite schema, migrations and typed repository functions. Functions that
//! run a single statement are generic over [`sqlx::SqliteExecutor`] so they
//! work against both the pool and an open transaction; multi-statement
//! functions take `&mut SqliteConnection`.

pub mod init;
pub mod jobs;
pub mod migrations;
pub mod models;
pub mod projects;
pub mod queries;
pub mod results;
pub mod retry;
pub mod settings;
pub mod topics;
pub mod users;

pub use init::init_database;
