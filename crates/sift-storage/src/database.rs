// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection setup: PRAGMAs, WAL mode and migrations.
//!
//! Every statement runs on tokio-rusqlite's single background thread, so
//! writes to the turn log are serialized without further locking.

use std::path::Path;

use sift_core::error::SiftError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// An open, migrated SQLite database.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path` and bring its schema up to date.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, SiftError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(SiftError::storage)?;
        }
        let conn = Connection::open(path).await.map_err(map_tr_err)?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// A private in-memory database, used by tests.
    pub async fn open_in_memory() -> Result<Self, SiftError> {
        let conn = Connection::open_in_memory().await.map_err(map_tr_err)?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), SiftError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal_mode {
                    let mode: String =
                        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
                    debug!(mode = %mode, "journal mode set");
                }
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn.busy_timeout(std::time::Duration::from_secs(5))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(map_tr_err)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Fold the WAL back into the main database file.
    pub async fn checkpoint(&self) -> Result<(), SiftError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

/// Map a tokio-rusqlite failure into the storage error variant.
pub(crate) fn map_tr_err<E: std::fmt::Display>(e: E) -> SiftError {
    SiftError::storage(e.to_string())
}
