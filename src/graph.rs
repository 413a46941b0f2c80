//! Dataset-level routing graph: shortcut CSR, edge metadata, and the
//! spatial index behind one query surface.

use std::path::Path;

use crate::error::{EngineError, Result};
use crate::expand;
use crate::query::{self, Algorithm, HighCell, QueryResult};
use crate::spatial::{IndexKind, SpatialIndex};
use crate::store::{loader, EdgeMeta, EdgeMetaStore, ShortcutStore};

pub struct RouteGraph {
    pub shortcuts: ShortcutStore,
    pub edges: EdgeMetaStore,
    spatial: Option<SpatialIndex>,
}

impl RouteGraph {
    /// Load shortcuts (Parquet file or directory) and edge metadata (CSV).
    pub fn load(shortcuts_path: &Path, edges_path: &Path) -> Result<Self> {
        let shortcuts = loader::load_shortcuts(shortcuts_path)?;
        let (edges, _skipped) = loader::load_edge_metadata(edges_path)?;
        Ok(RouteGraph {
            shortcuts,
            edges,
            spatial: None,
        })
    }

    /// Assemble a graph from already-built stores (tests, alternate loaders).
    pub fn from_parts(shortcuts: ShortcutStore, edges: EdgeMetaStore) -> Self {
        RouteGraph {
            shortcuts,
            edges,
            spatial: None,
        }
    }

    /// Build (or rebuild) the nearest-edge index. Swapping modes requires a
    /// fresh build; there is no incremental path.
    pub fn build_spatial_index(&mut self, kind: IndexKind) {
        self.spatial = Some(SpatialIndex::build(kind, &self.edges));
    }

    pub fn has_spatial_index(&self) -> bool {
        self.spatial.is_some()
    }

    pub fn index_kind(&self) -> Option<IndexKind> {
        self.spatial.as_ref().map(|s| s.kind())
    }

    /// K nearest edges within `radius_m`, ascending by distance. Empty when
    /// no index was built.
    pub fn find_nearest_edges(
        &self,
        lat: f64,
        lng: f64,
        k: usize,
        radius_m: f64,
    ) -> Vec<(u32, f64)> {
        match &self.spatial {
            Some(index) => index.find_nearest_edges(&self.edges, lat, lng, k, radius_m),
            None => Vec::new(),
        }
    }

    pub fn query(&self, algorithm: Algorithm, source: u32, target: u32) -> Result<QueryResult> {
        match algorithm {
            Algorithm::Classic => query::query_classic(&self.shortcuts, &self.edges, source, target),
            Algorithm::Pruned => query::query_pruned(&self.shortcuts, &self.edges, source, target),
            Algorithm::Unidirectional => {
                query::query_unidirectional(&self.shortcuts, &self.edges, source, target)
            }
            Algorithm::BiDijkstra => {
                query::query_bidijkstra(&self.shortcuts, &self.edges, source, target)
            }
            Algorithm::Dijkstra => {
                query::query_dijkstra(&self.shortcuts, &self.edges, source, target)
            }
        }
    }

    pub fn query_multi(&self, sources: &[u32], targets: &[u32]) -> Result<QueryResult> {
        query::query_multi(&self.shortcuts, &self.edges, sources, targets)
    }

    pub fn query_classic_alt(
        &self,
        source: u32,
        target: u32,
        penalized: &[u32],
        penalty_factor: f64,
    ) -> Result<QueryResult> {
        query::query_classic_alt(
            &self.shortcuts,
            &self.edges,
            source,
            target,
            penalized,
            penalty_factor,
        )
    }

    /// Rewrite a shortcut-level path into base edges.
    pub fn expand_path(&self, shortcut_path: &[u32]) -> Vec<u32> {
        expand::expand_path(&self.shortcuts, shortcut_path)
    }

    pub fn high_cell(&self, source: u32, target: u32) -> HighCell {
        query::high_cell(&self.edges, source, target)
    }

    pub fn edge_meta(&self, edge: u32) -> Option<&EdgeMeta> {
        self.edges.get(edge)
    }

    pub fn edge_cost(&self, edge: u32) -> f64 {
        self.edges.cost(edge)
    }

    pub fn shortcut_count(&self) -> usize {
        self.shortcuts.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Approximate resident size in bytes across all components.
    pub fn memory_usage(&self) -> usize {
        self.shortcuts.memory_usage()
            + self.edges.memory_usage()
            + self.spatial.as_ref().map(|s| s.memory_usage()).unwrap_or(0)
    }

    /// Validate the CSR layout; used by load-time sanity checks and tests.
    pub fn validate(&self) -> Result<()> {
        let fwd = self.shortcuts.fwd_offsets();
        let bwd = self.shortcuts.bwd_offsets();
        if fwd.len() != bwd.len() {
            return Err(EngineError::InternalError(format!(
                "offset arrays disagree: {} vs {}",
                fwd.len(),
                bwd.len()
            )));
        }
        for u in 0..=self.shortcuts.max_edge_id() {
            for sc in self.shortcuts.outgoing(u) {
                if sc.from != u {
                    return Err(EngineError::InternalError(format!(
                        "forward slice of {u} holds a record from {}",
                        sc.from
                    )));
                }
            }
            for &idx in self.shortcuts.incoming(u) {
                if self.shortcuts.record(idx).to != u {
                    return Err(EngineError::InternalError(format!(
                        "backward slice of {u} points at a record to {}",
                        self.shortcuts.record(idx).to
                    )));
                }
            }
        }
        Ok(())
    }
}
