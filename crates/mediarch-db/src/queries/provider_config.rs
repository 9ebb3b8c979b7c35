//! Provider configuration database queries.
//!
//! Backing store for per-provider API keys, enablement, and the last
//! connection test result surfaced by `testConnection` (C5).

use chrono::{DateTime, Utc};
use mediarch_common::{Error, Result, TestStatus};
use rusqlite::{Connection, OptionalExtension, Row};
use std::str::FromStr;

use crate::models::ProviderConfig;

fn row_to_config(row: &Row) -> rusqlite::Result<ProviderConfig> {
    let options: Option<String> = row.get("options")?;
    let last_test_at: Option<String> = row.get("last_test_at")?;
    Ok(ProviderConfig {
        provider_name: row.get("provider_name")?,
        enabled: row.get::<_, i64>("enabled")? != 0,
        api_key: row.get("api_key")?,
        personal_api_key: row.get("personal_api_key")?,
        language: row.get("language")?,
        region: row.get("region")?,
        options: options.and_then(|s| serde_json::from_str(&s).ok()),
        last_test_at: last_test_at.map(|s| DateTime::parse_from_rfc3339(&s).unwrap().with_timezone(&Utc)),
        last_test_status: TestStatus::from_str(&row.get::<_, String>("last_test_status")?).unwrap(),
    })
}

const SELECT_COLUMNS: &str =
    "provider_name, enabled, api_key, personal_api_key, language, region, options, last_test_at, last_test_status";

/// Create or update a provider's configuration.
pub fn upsert(
    conn: &Connection,
    provider_name: &str,
    enabled: bool,
    api_key: Option<&str>,
    language: &str,
) -> Result<ProviderConfig> {
    conn.execute(
        "INSERT INTO provider_config (provider_name, enabled, api_key, language)
         VALUES (:name, :enabled, :api_key, :language)
         ON CONFLICT(provider_name) DO UPDATE SET
            enabled = excluded.enabled, api_key = excluded.api_key, language = excluded.language",
        rusqlite::named_params! {
            ":name": provider_name,
            ":enabled": enabled as i64,
            ":api_key": api_key,
            ":language": language,
        },
    )?;

    get(conn, provider_name)?.ok_or_else(|| Error::internal("upsert did not persist"))
}

/// Get a provider's configuration.
pub fn get(conn: &Connection, provider_name: &str) -> Result<Option<ProviderConfig>> {
    conn.query_row(
        &format!("SELECT {SELECT_COLUMNS} FROM provider_config WHERE provider_name = :name"),
        rusqlite::named_params! { ":name": provider_name },
        row_to_config,
    )
    .optional()
    .map_err(Error::from)
}

/// List every configured provider.
pub fn list(conn: &Connection) -> Result<Vec<ProviderConfig>> {
    let mut stmt = conn.prepare(&format!("SELECT {SELECT_COLUMNS} FROM provider_config ORDER BY provider_name"))?;
    let configs = stmt
        .query_map([], row_to_config)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(configs)
}

/// Record the result of a `testConnection` call.
pub fn record_test_result(conn: &Connection, provider_name: &str, status: TestStatus) -> Result<()> {
    let rows_affected = conn.execute(
        "UPDATE provider_config SET last_test_at = :now, last_test_status = :status
         WHERE provider_name = :name",
        rusqlite::named_params! {
            ":name": provider_name,
            ":now": Utc::now().to_rfc3339(),
            ":status": status.to_string(),
        },
    )?;

    if rows_affected == 0 {
        return Err(Error::not_found("provider config"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    #[test]
    fn test_upsert_and_get() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let config = upsert(&conn, "tmdb", true, Some("key"), "en").unwrap();
        assert_eq!(config.provider_name, "tmdb");
        assert_eq!(config.last_test_status, TestStatus::NeverTested);
    }

    #[test]
    fn test_upsert_is_idempotent_on_name() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        upsert(&conn, "tmdb", true, Some("key1"), "en").unwrap();
        let updated = upsert(&conn, "tmdb", false, Some("key2"), "en").unwrap();

        assert!(!updated.enabled);
        assert_eq!(updated.api_key, Some("key2".to_string()));
        assert_eq!(list(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_record_test_result() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        upsert(&conn, "tmdb", true, Some("key"), "en").unwrap();
        record_test_result(&conn, "tmdb", TestStatus::Success).unwrap();

        let config = get(&conn, "tmdb").unwrap().unwrap();
        assert_eq!(config.last_test_status, TestStatus::Success);
        assert!(config.last_test_at.is_some());
    }
}
