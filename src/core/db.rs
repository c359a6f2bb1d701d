use crate::core::error;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Open a connection with the pragmas every kips connection runs under:
/// WAL journaling, foreign-key enforcement and a busy timeout.
///
/// The containing directory is created when absent; SQLite creates the file.
pub fn db_connect(db_path: &Path, busy_timeout_ms: u64) -> Result<Connection, error::KipsError> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(error::KipsError::IoError)?;
    }
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
        .map_err(error::KipsError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::KipsError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::KipsError::RusqliteError)?;
    Ok(conn)
}

/// Flush the write-ahead log into the main file and close the connection.
pub fn db_close(conn: Connection) -> Result<(), error::KipsError> {
    conn.query_row("PRAGMA wal_checkpoint(TRUNCATE);", [], |_| Ok(()))
        .map_err(error::KipsError::RusqliteError)?;
    conn.close()
        .map_err(|(_, e)| error::KipsError::RusqliteError(e))
}
