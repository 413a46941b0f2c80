//! Alternate loader: shortcuts, edges, and dataset info from an embedded
//! analytic database file. Compiled behind the `duckdb` cargo feature.

use std::collections::HashMap;
use std::path::Path;

use duckdb::{AccessMode, Config, Connection};

use crate::error::{EngineError, Result};
use crate::store::edge_meta::{parse_linestring, EdgeMeta, EdgeMetaStore};
use crate::store::shortcut::{ShortcutRow, ShortcutStore};

fn db_err(e: duckdb::Error) -> EngineError {
    EngineError::ParseError(format!("duckdb: {e}"))
}

/// Everything a dataset needs, pulled from one database file.
pub struct DuckDbDataset {
    pub shortcuts: ShortcutStore,
    pub edges: EdgeMetaStore,
    pub info: HashMap<String, String>,
}

/// Load a full dataset from a read-only database file.
///
/// Expects `shortcuts` and `edges` tables matching the columnar schema; an
/// optional `dataset_info` key/value table feeds the info map.
pub fn load_dataset(db_path: &Path) -> Result<DuckDbDataset> {
    tracing::info!("loading dataset from {}", db_path.display());

    let config = Config::default()
        .access_mode(AccessMode::ReadOnly)
        .map_err(db_err)?;
    let conn = Connection::open_with_flags(db_path, config).map_err(db_err)?;

    let shortcuts = load_shortcuts(&conn)?;
    let edges = load_edges(&conn)?;
    let info = load_info(&conn);

    tracing::info!(
        shortcuts = shortcuts.len(),
        edges = edges.len(),
        info_entries = info.len(),
        "database load complete"
    );

    Ok(DuckDbDataset {
        shortcuts,
        edges,
        info,
    })
}

fn load_shortcuts(conn: &Connection) -> Result<ShortcutStore> {
    let mut stmt = conn
        .prepare("SELECT from_edge, to_edge, cost, via_edge, cell, inside FROM shortcuts")
        .map_err(db_err)?;
    let mut db_rows = stmt.query([]).map_err(db_err)?;

    let mut rows: Vec<ShortcutRow> = Vec::new();
    while let Some(row) = db_rows.next().map_err(db_err)? {
        let from: i32 = row.get(0).map_err(db_err)?;
        let to: i32 = row.get(1).map_err(db_err)?;
        let cost: f64 = row.get(2).map_err(db_err)?;
        let via: i32 = row.get(3).map_err(db_err)?;
        let cell: i64 = row.get(4).map_err(db_err)?;
        let inside: i8 = row.get(5).map_err(db_err)?;
        rows.push(ShortcutRow {
            from: from as u32,
            to: to as u32,
            cost: cost as f32,
            via_edge: via as u32,
            cell: cell as u64,
            inside,
        });
    }

    ShortcutStore::from_rows(rows)
}

fn load_edges(conn: &Connection) -> Result<EdgeMetaStore> {
    let mut stmt = conn
        .prepare("SELECT id, from_cell, to_cell, lca_res, length, cost, geometry FROM edges")
        .map_err(db_err)?;
    let mut db_rows = stmt.query([]).map_err(db_err)?;

    let mut store = EdgeMetaStore::new();
    while let Some(row) = db_rows.next().map_err(db_err)? {
        let id: i64 = row.get(0).map_err(db_err)?;
        let from_cell: i64 = row.get(1).map_err(db_err)?;
        let to_cell: i64 = row.get(2).map_err(db_err)?;
        let lca_res: i64 = row.get(3).map_err(db_err)?;
        let length: f64 = row.get(4).map_err(db_err)?;
        let cost: f64 = row.get(5).map_err(db_err)?;
        let wkt: Option<String> = row.get(6).map_err(db_err)?;

        store.insert(
            id as u32,
            EdgeMeta {
                from_cell: from_cell as u64,
                to_cell: to_cell as u64,
                lca_res: lca_res as i32,
                length,
                cost,
                geometry: wkt.as_deref().map(parse_linestring).unwrap_or_default(),
            },
        );
    }

    if store.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    Ok(store)
}

fn load_info(conn: &Connection) -> HashMap<String, String> {
    let mut info = HashMap::new();
    // the table is optional; older datasets never wrote it
    let mut stmt = match conn.prepare("SELECT key, value FROM dataset_info") {
        Ok(s) => s,
        Err(_) => return info,
    };
    let mut rows = match stmt.query([]) {
        Ok(r) => r,
        Err(_) => return info,
    };
    while let Ok(Some(row)) = rows.next() {
        if let (Ok(key), Ok(value)) = (row.get::<_, String>(0), row.get::<_, String>(1)) {
            info.insert(key, value);
        }
    }
    info
}
