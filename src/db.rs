use crate::types::SessionLogEntry;
use rusqlite::{Connection, Result, NO_PARAMS};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init(&conn)?;
    Ok(conn)
}

pub fn init(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS plate_log (timestamp REAL NOT NULL, location TEXT NOT NULL, plate_number TEXT NOT NULL, authorized INTEGER NOT NULL)",
        NO_PARAMS,
    )?;
    Ok(())
}

/// Inserts one row into 'plate_log'. Rows are never updated or read back.
pub fn append(conn: &Connection, entry: &SessionLogEntry) -> Result<()> {
    conn.execute_named(
        "INSERT INTO plate_log(timestamp, location, plate_number, authorized) VALUES (:timestamp, :location, :plate, :authorized)",
        &[
            (":timestamp", &entry.timestamp),
            (":location", &entry.location),
            (":plate", &entry.plate_number),
            (":authorized", &entry.authorized),
        ],
    )?;
    Ok(())
}

/// Appends all entries in one transaction. Either every row lands or none do.
pub fn append_all(conn: &mut Connection, entries: &[SessionLogEntry]) -> Result<()> {
    let tx = conn.transaction()?;
    for entry in entries {
        append(&tx, entry)?;
    }
    tx.commit()
}

pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
