//! Storage layer: the generic entity store, per-backend repositories and
//! the database manager.

pub mod database;

pub use database::{DatabaseManager, DatabasePool, DatabaseType};
