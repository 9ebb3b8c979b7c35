//! Auto-selection strategy database queries (C8).
//!
//! Per-asset-type preset and provider priority order the asset selector
//! consults when scoring candidates and breaking ties.

use mediarch_common::{AssetType, Error, Result};
use rusqlite::{Connection, OptionalExtension, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::AutoSelectionStrategy;

fn row_to_strategy(row: &Row) -> rusqlite::Result<AutoSelectionStrategy> {
    let priority_json: String = row.get("provider_priority")?;
    Ok(AutoSelectionStrategy {
        id: row.get("id")?,
        asset_type: AssetType::from_str(&row.get::<_, String>("asset_type")?).unwrap(),
        preset: row.get("preset")?,
        provider_priority: serde_json::from_str(&priority_json).unwrap_or_default(),
    })
}

/// Create or replace the strategy for an asset type.
pub fn upsert(
    conn: &Connection,
    asset_type: AssetType,
    preset: &str,
    provider_priority: &[String],
) -> Result<AutoSelectionStrategy> {
    let id = Uuid::new_v4().to_string();
    let priority_json =
        serde_json::to_string(provider_priority).map_err(|e| Error::internal(e.to_string()))?;

    conn.execute(
        "INSERT INTO auto_selection_strategy (id, asset_type, preset, provider_priority)
         VALUES (:id, :asset_type, :preset, :priority)
         ON CONFLICT(asset_type) DO UPDATE SET preset = excluded.preset, provider_priority = excluded.provider_priority",
        rusqlite::named_params! {
            ":id": id,
            ":asset_type": asset_type.to_string(),
            ":preset": preset,
            ":priority": priority_json,
        },
    )?;

    get(conn, asset_type)?.ok_or_else(|| Error::internal("upsert did not persist"))
}

/// Get the configured strategy for an asset type, if one has been set.
pub fn get(conn: &Connection, asset_type: AssetType) -> Result<Option<AutoSelectionStrategy>> {
    conn.query_row(
        "SELECT id, asset_type, preset, provider_priority FROM auto_selection_strategy
         WHERE asset_type = :asset_type",
        rusqlite::named_params! { ":asset_type": asset_type.to_string() },
        row_to_strategy,
    )
    .optional()
    .map_err(Error::from)
}

/// List every configured strategy.
pub fn list(conn: &Connection) -> Result<Vec<AutoSelectionStrategy>> {
    let mut stmt =
        conn.prepare("SELECT id, asset_type, preset, provider_priority FROM auto_selection_strategy")?;
    let strategies = stmt
        .query_map([], row_to_strategy)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(strategies)
}
