//! Bulk ingest: shortcut Parquet files and edge-metadata CSV.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::{Float64Array, Int32Array, Int64Array, Int8Array};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::error::{EngineError, Result};
use crate::store::edge_meta::{parse_linestring, EdgeMeta, EdgeMetaStore};
use crate::store::shortcut::{ShortcutRow, ShortcutStore};

/// Required shortcut columns, bit-exact names from the preprocessor.
const COL_FROM: &str = "from_edge";
const COL_TO: &str = "to_edge";
const COL_COST: &str = "cost";
const COL_VIA: &str = "via_edge";
const COL_CELL: &str = "cell";
const COL_INSIDE: &str = "inside";

/// Load shortcut records from a single Parquet file or a directory of them
/// and build the CSR store.
pub fn load_shortcuts(path: &Path) -> Result<ShortcutStore> {
    let rows = load_shortcut_rows(path)?;
    let store = ShortcutStore::from_rows(rows)?;
    tracing::info!(
        shortcuts = store.len(),
        max_edge = store.max_edge_id(),
        "shortcut store built"
    );
    Ok(store)
}

/// Read raw shortcut rows without building the CSR.
pub fn load_shortcut_rows(path: &Path) -> Result<Vec<ShortcutRow>> {
    let mut rows = Vec::new();
    if path.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e == "parquet").unwrap_or(false))
            .collect();
        // directory iteration order is unspecified; sort for determinism
        files.sort();
        for file in files {
            read_parquet_file(&file, &mut rows)?;
        }
    } else {
        read_parquet_file(path, &mut rows)?;
    }
    if rows.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    rows.shrink_to_fit();
    Ok(rows)
}

fn read_parquet_file(path: &Path, out: &mut Vec<ShortcutRow>) -> Result<()> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| EngineError::ParseError(format!("{}: {e}", path.display())))?
        .build()
        .map_err(|e| EngineError::ParseError(format!("{}: {e}", path.display())))?;

    for batch in reader {
        let batch =
            batch.map_err(|e| EngineError::ParseError(format!("{}: {e}", path.display())))?;
        read_batch(&batch, out)?;
    }
    Ok(())
}

fn read_batch(batch: &RecordBatch, out: &mut Vec<ShortcutRow>) -> Result<()> {
    let from = int32_column(batch, COL_FROM)?;
    let to = int32_column(batch, COL_TO)?;
    let cost = float64_column(batch, COL_COST)?;
    let via = int32_column(batch, COL_VIA)?;
    let cell = int64_column(batch, COL_CELL)?;
    let inside = int8_column(batch, COL_INSIDE)?;

    out.reserve(batch.num_rows());
    for i in 0..batch.num_rows() {
        out.push(ShortcutRow {
            from: from.value(i) as u32,
            to: to.value(i) as u32,
            cost: cost.value(i) as f32,
            via_edge: via.value(i) as u32,
            cell: cell.value(i) as u64,
            inside: inside.value(i),
        });
    }
    Ok(())
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a arrow::array::ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| EngineError::SchemaMismatch(format!("missing column `{name}`")))
}

fn int32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<Int32Array>()
        .ok_or_else(|| EngineError::SchemaMismatch(format!("column `{name}` is not Int32")))
}

fn int64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| EngineError::SchemaMismatch(format!("column `{name}` is not Int64")))
}

fn int8_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int8Array> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<Int8Array>()
        .ok_or_else(|| EngineError::SchemaMismatch(format!("column `{name}` is not Int8")))
}

fn float64_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array> {
    column(batch, name)?
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| EngineError::SchemaMismatch(format!("column `{name}` is not Float64")))
}

/// Column positions discovered from an edge CSV header.
struct EdgeColumns {
    id: usize,
    from_cell: usize,
    to_cell: usize,
    lca_res: usize,
    length: usize,
    cost: usize,
    geometry: Option<usize>,
}

impl EdgeColumns {
    fn discover(headers: &csv::StringRecord) -> Result<Self> {
        let find = |names: &[&str]| -> Option<usize> {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
        };
        let require = |names: &[&str]| -> Result<usize> {
            find(names).ok_or_else(|| {
                EngineError::SchemaMismatch(format!("edge file missing column `{}`", names[0]))
            })
        };

        Ok(EdgeColumns {
            id: require(&["id", "edge_index"])?,
            from_cell: require(&["from_cell", "incoming_cell"])?,
            to_cell: require(&["to_cell", "outgoing_cell"])?,
            lca_res: require(&["lca_res"])?,
            length: require(&["length"])?,
            cost: require(&["cost"])?,
            geometry: find(&["geometry"]),
        })
    }
}

/// Load edge metadata from delimited text.
///
/// Column discovery is header-driven and accepts historical aliases for the
/// cell columns. Malformed rows are counted and skipped; only a zero-row
/// outcome is fatal. Returns the store and the skipped-row count.
pub fn load_edge_metadata(path: &Path) -> Result<(EdgeMetaStore, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| EngineError::ParseError(format!("{}: {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| EngineError::ParseError(e.to_string()))?
        .clone();
    let cols = EdgeColumns::discover(&headers)?;

    let mut store = EdgeMetaStore::new();
    let mut skipped = 0usize;

    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        match parse_edge_record(&record, &cols) {
            Some((id, meta)) => store.insert(id, meta),
            None => skipped += 1,
        }
    }

    if store.is_empty() {
        return Err(EngineError::EmptyDataset);
    }
    tracing::info!(
        edges = store.len(),
        skipped,
        "edge metadata loaded from {}",
        path.display()
    );
    Ok((store, skipped))
}

fn parse_edge_record(record: &csv::StringRecord, cols: &EdgeColumns) -> Option<(u32, EdgeMeta)> {
    let id: u32 = record.get(cols.id)?.trim().parse().ok()?;
    let from_cell: u64 = record.get(cols.from_cell)?.trim().parse().ok()?;
    let to_cell: u64 = record.get(cols.to_cell)?.trim().parse().ok()?;
    let lca_res: i32 = record.get(cols.lca_res)?.trim().parse().ok()?;
    let length: f64 = record.get(cols.length)?.trim().parse().ok()?;
    let cost: f64 = record.get(cols.cost)?.trim().parse().ok()?;

    let geometry = match cols.geometry {
        Some(gi) if record.len() > gi => {
            // An unquoted WKT body arrives split across trailing fields;
            // stitch them back together before decoding.
            let wkt = if record.len() > gi + 1 {
                let parts: Vec<&str> = record.iter().skip(gi).collect();
                parts.join(",")
            } else {
                record.get(gi)?.to_string()
            };
            parse_linestring(wkt.trim_matches('"'))
        }
        _ => Vec::new(),
    };

    Some((
        id,
        EdgeMeta {
            from_cell,
            to_cell,
            lca_res,
            length,
            cost,
            geometry,
        },
    ))
}
