//! Per-library scheduler cadence database queries (C12).

use chrono::{DateTime, Utc};
use mediarch_common::{Error, LibraryId, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::models::LibrarySchedulerConfig;

fn row_to_config(row: &Row) -> rusqlite::Result<LibrarySchedulerConfig> {
    let last_scan: Option<String> = row.get("last_file_scan_at")?;
    let last_update: Option<String> = row.get("last_provider_update_at")?;
    Ok(LibrarySchedulerConfig {
        library_id: LibraryId::from(Uuid::parse_str(&row.get::<_, String>("library_id")?).unwrap()),
        file_scanner_enabled: row.get::<_, i64>("file_scanner_enabled")? != 0,
        file_scanner_interval_hours: row.get("file_scanner_interval_hours")?,
        provider_updater_enabled: row.get::<_, i64>("provider_updater_enabled")? != 0,
        provider_updater_interval_hours: row.get("provider_updater_interval_hours")?,
        last_file_scan_at: last_scan.map(|s| DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc)),
        last_provider_update_at: last_update
            .map(|s| DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc)),
    })
}

const SELECT_COLUMNS: &str = "library_id, file_scanner_enabled, file_scanner_interval_hours,
    provider_updater_enabled, provider_updater_interval_hours, last_file_scan_at, last_provider_update_at";

/// Get a library's scheduler config, creating the default row if none
/// exists yet (every library gets scheduler config on first access).
pub fn get_or_create_default(conn: &Connection, library_id: LibraryId) -> Result<LibrarySchedulerConfig> {
    if let Some(existing) = get(conn, library_id)? {
        return Ok(existing);
    }

    conn.execute(
        "INSERT INTO library_scheduler_config (library_id) VALUES (:library_id)",
        rusqlite::named_params! { ":library_id": library_id.to_string() },
    )?;

    get(conn, library_id)?.ok_or_else(|| Error::internal("insert did not persist"))
}

/// Get a library's scheduler config.
pub fn get(conn: &Connection, library_id: LibraryId) -> Result<Option<LibrarySchedulerConfig>> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM library_scheduler_config WHERE library_id = :library_id"),
        rusqlite::named_params! { ":library_id": library_id.to_string() },
        row_to_config,
    )
    .optional()
    .map_err(Error::from)
}

/// List every library's scheduler config, used by the scheduler's
/// tick to find libraries whose cadence has elapsed.
pub fn list(conn: &Connection) -> Result<Vec<LibrarySchedulerConfig>> {
    let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM library_scheduler_config"))?;
    let configs = stmt
        .query_map([], row_to_config)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(configs)
}

/// Stamp the last file-scan run time.
pub fn record_file_scan(conn: &Connection, library_id: LibraryId) -> Result<()> {
    let rows_affected = conn.execute(
        "UPDATE library_scheduler_config SET last_file_scan_at = :now WHERE library_id = :library_id",
        rusqlite::named_params! {
            ":library_id": library_id.to_string(),
            ":now": Utc::now().to_rfc3339(),
        },
    )?;

    if rows_affected == 0 {
        return Err(Error::not_found("library scheduler config"));
    }

    Ok(())
}

/// Stamp the last provider-update run time.
pub fn record_provider_update(conn: &Connection, library_id: LibraryId) -> Result<()> {
    let rows_affected = conn.execute(
        "UPDATE library_scheduler_config SET last_provider_update_at = :now WHERE library_id = :library_id",
        rusqlite::named_params! {
            ":library_id": library_id.to_string(),
            ":now": Utc::now().to_rfc3339(),
        },
    )?;

    if rows_affected == 0 {
        return Err(Error::not_found("library scheduler config"));
    }

    Ok(())
}
