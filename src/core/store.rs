//! Store handle for the kips database.
//!
//! A `Store` owns the single connection a kips process uses. It is opened once at startup,
//! passed explicitly to every component, and released through [`Store::close`] (or on drop).

use crate::core::db;
use crate::core::error::KipsError;
use crate::core::schemas;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Store {
    /// Absolute or caller-supplied path of the database file
    pub path: PathBuf,
    conn: Connection,
}

impl Store {
    /// Open (creating directory and file if needed) and ensure the schema exists.
    pub fn open(path: &Path, busy_timeout_ms: u64) -> Result<Self, KipsError> {
        let conn = db::db_connect(path, busy_timeout_ms)?;
        ensure_schema(&conn)?;
        info!(db = %path.display(), "store opened");
        Ok(Self {
            path: path.to_path_buf(),
            conn,
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn close(self) -> Result<(), KipsError> {
        let path = self.path;
        db::db_close(self.conn)?;
        info!(db = %path.display(), "store closed");
        Ok(())
    }
}

/// Run `f` inside an IMMEDIATE transaction: committed on `Ok`, rolled back on `Err`.
pub fn with_transaction<F, R>(conn: &mut Connection, f: F) -> Result<R, KipsError>
where
    F: FnOnce(&Transaction<'_>) -> Result<R, KipsError>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let result = f(&tx)?;
    tx.commit()?;
    Ok(result)
}

/// Create every table, index and `updatedAt` trigger that does not exist yet.
///
/// Safe to call on every start: all statements are `IF NOT EXISTS`, so a current
/// schema is left untouched.
pub fn ensure_schema(conn: &Connection) -> Result<(), KipsError> {
    for table in schemas::TABLES {
        conn.execute(table.create, [])?;
        for index in table.indexes {
            conn.execute(index, [])?;
        }
        conn.execute(&schemas::update_timestamp_trigger(table.name), [])?;
        debug!(table = table.name, "schema ensured");
    }
    Ok(())
}
