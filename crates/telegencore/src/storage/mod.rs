//! SQLite storage: connection pool, migrations and per-entity queries

pub mod billing;
pub mod channels;
pub mod db;
pub mod flows;
pub mod migrations;
pub mod posts;
pub mod users;

// Re-exports for convenience
pub use db::{create_pool, get_connection, init_database, DbConnection, DbPool};
