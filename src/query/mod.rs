//! Query algorithms over the shortcut graph.
//!
//! All searches operate on edge IDs: the vertices are edges of the road
//! graph (a line graph), and the shortcut records are its arcs. Sources and
//! targets are edges. Bidirectional variants initialize the backward
//! frontier at `cost(target)` so the reported distance covers the target
//! edge's own traversal; the forward-only variants add it on arrival.

mod bidirectional;
mod dijkstra;
mod pruned;
mod unidirectional;

pub use bidirectional::{query_bidijkstra, query_classic, query_classic_alt, query_multi};
pub use dijkstra::query_dijkstra;
pub use pruned::query_pruned;
pub use unidirectional::query_unidirectional;

use std::cmp::Ordering;

use rustc_hash::FxHashMap;

use crate::error::{EngineError, Result};
use crate::h3;
use crate::store::EdgeMetaStore;

/// Result of a shortest-path query: total cost and the shortcut-level path.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub distance: f64,
    pub path: Vec<u32>,
}

/// Algorithm selector for single-pair queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Classic,
    Pruned,
    Unidirectional,
    BiDijkstra,
    Dijkstra,
}

impl Algorithm {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "classic" => Some(Algorithm::Classic),
            "pruned" => Some(Algorithm::Pruned),
            "unidirectional" => Some(Algorithm::Unidirectional),
            "bidijkstra" => Some(Algorithm::BiDijkstra),
            "dijkstra" => Some(Algorithm::Dijkstra),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Classic => "classic",
            Algorithm::Pruned => "pruned",
            Algorithm::Unidirectional => "unidirectional",
            Algorithm::BiDijkstra => "bidijkstra",
            Algorithm::Dijkstra => "dijkstra",
        }
    }
}

/// The cell bounding a query's useful search zone, with its resolution.
/// `(0, -1)` for degenerate inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighCell {
    pub cell: u64,
    pub res: i32,
}

impl HighCell {
    pub const NONE: HighCell = HighCell { cell: 0, res: -1 };
}

/// Compute the high cell for a source/target pair: each endpoint's
/// `to_cell` reduced to its `lca_res` ancestor, then the LCA of the two
/// reduced cells.
pub fn high_cell(edges: &EdgeMetaStore, source: u32, target: u32) -> HighCell {
    let (Some(src), Some(tgt)) = (edges.get(source), edges.get(target)) else {
        return HighCell::NONE;
    };

    let src_cell = if src.to_cell == 0 || src.lca_res < 0 {
        0
    } else {
        h3::parent(src.to_cell, src.lca_res)
    };
    let tgt_cell = if tgt.to_cell == 0 || tgt.lca_res < 0 {
        0
    } else {
        h3::parent(tgt.to_cell, tgt.lca_res)
    };

    if src_cell == 0 || tgt_cell == 0 {
        return HighCell::NONE;
    }

    let lca = h3::lca(src_cell, tgt_cell);
    if lca == 0 {
        HighCell::NONE
    } else {
        HighCell {
            cell: lca,
            res: h3::resolution(lca),
        }
    }
}

/// Heap entry for plain edge frontiers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HeapEntry {
    pub dist: f64,
    pub edge: u32,
}

/// Heap entry carrying the cell resolution the edge was reached at.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HeapEntryRes {
    pub dist: f64,
    pub edge: u32,
    pub res: i8,
}

/// Heap entry for packed (edge, phase) states.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HeapEntryState {
    pub dist: f64,
    pub state: u64,
}

macro_rules! min_heap_ord {
    ($ty:ty) => {
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                self.dist == other.dist
            }
        }
        impl Eq for $ty {}
        impl PartialOrd for $ty {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }
        impl Ord for $ty {
            fn cmp(&self, other: &Self) -> Ordering {
                // reversed: BinaryHeap is a max-heap, we want the minimum
                other
                    .dist
                    .partial_cmp(&self.dist)
                    .unwrap_or(Ordering::Equal)
            }
        }
    };
}

min_heap_ord!(HeapEntry);
min_heap_ord!(HeapEntryRes);
min_heap_ord!(HeapEntryState);

/// Short-circuit for the shared endpoint rules: `s == t` succeeds with the
/// single-edge path, unknown endpoints fail with `EdgeNotFound`.
pub(crate) fn check_endpoints(
    edges: &EdgeMetaStore,
    source: u32,
    target: u32,
) -> Result<Option<QueryResult>> {
    if source == target {
        return Ok(Some(QueryResult {
            distance: edges.cost(source),
            path: vec![source],
        }));
    }
    if !edges.contains(source) {
        return Err(EngineError::EdgeNotFound(source));
    }
    if !edges.contains(target) {
        return Err(EngineError::EdgeNotFound(target));
    }
    Ok(None)
}

/// Stitch the two parent maps together at the meeting edge. Roots point to
/// themselves.
pub(crate) fn reconstruct_bidirectional(
    parent_fwd: &FxHashMap<u32, u32>,
    parent_bwd: &FxHashMap<u32, u32>,
    meeting: u32,
) -> Vec<u32> {
    let mut path = Vec::new();

    let mut curr = meeting;
    loop {
        path.push(curr);
        match parent_fwd.get(&curr) {
            Some(&prev) if prev != curr => curr = prev,
            _ => break,
        }
    }
    path.reverse();

    curr = meeting;
    loop {
        match parent_bwd.get(&curr) {
            Some(&next) if next != curr => {
                curr = next;
                path.push(curr);
            }
            _ => break,
        }
    }

    path
}
