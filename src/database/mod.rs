// Copyright 2023 Remi Bernotavicius

use diesel::prelude::Connection as _;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::path::Path;

pub mod models;
pub mod schema;

pub type Connection = diesel::sqlite::SqliteConnection;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to open database: {0}")]
    Connection(#[from] diesel::ConnectionError),
    #[error("failed to migrate database: {0}")]
    Migration(Box<dyn std::error::Error + Send + Sync + 'static>),
    #[error("database query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("failed to encode stored value: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

pub fn establish_connection(path: impl AsRef<Path>) -> Result<Connection> {
    let mut connection = Connection::establish(&path.as_ref().to_string_lossy())?;
    connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(StoreError::Migration)?;
    log::debug!("opened database at {}", path.as_ref().display());
    Ok(connection)
}

/// A private database that disappears with the connection.
#[cfg(test)]
pub fn establish_in_memory() -> Result<Connection> {
    establish_connection(":memory:")
}

#[test]
fn migrations() {
    let mut conn = establish_in_memory().unwrap();
    assert!(!conn.has_pending_migration(MIGRATIONS).unwrap());

    conn.revert_all_migrations(MIGRATIONS).unwrap();
    assert!(conn.has_pending_migration(MIGRATIONS).unwrap());

    conn.run_pending_migrations(MIGRATIONS).unwrap();
    assert!(!conn.has_pending_migration(MIGRATIONS).unwrap());
}
