use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::time::Duration;

use super::migrations::run_migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Every connection enables foreign keys (cascading deletes rely on it) and
/// waits up to 30s on a locked database instead of failing immediately.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
///
/// # Example
///
/// ```no_run
/// use telegencore::storage::create_pool;
///
/// let pool = create_pool("database.sqlite")?;
/// # Ok::<(), r2d2::Error>(())
/// ```
pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    });

    Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)
}

/// Create the pool and bring the schema up to date
pub fn init_database(database_path: &str) -> anyhow::Result<DbPool> {
    let pool = create_pool(database_path).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;
    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;
    log::info!("🗄  Database ready at {}", database_path);
    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}
