//! Nearest-edge spatial index.
//!
//! Two interchangeable builds per dataset: an H3 bucket map (constant-time
//! lookups, ring expansion around the query point) or an R-tree of polyline
//! bounding boxes (robust for long edges that cross many cells). Both refine
//! candidates with an exact point-to-polyline distance in meters.

use geo::HaversineDistance;
use geo::Point;
use rstar::{RTree, RTreeObject, AABB};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::h3;
use crate::store::EdgeMetaStore;

/// H3 resolution the bucket index is keyed at.
pub const DEFAULT_INDEX_RES: i32 = 9;

/// Which spatial index to build for a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Hex,
    Rtree,
}

impl IndexKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "h3" | "hex" => Some(IndexKind::Hex),
            "rtree" => Some(IndexKind::Rtree),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IndexKind::Hex => "h3",
            IndexKind::Rtree => "rtree",
        }
    }
}

/// Bounding box of one edge's polyline, for the R-tree build.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeBounds {
    aabb: AABB<[f64; 2]>,
    edge_id: u32,
}

impl RTreeObject for EdgeBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Per-dataset nearest-edge index; selection is fixed at build time.
pub enum SpatialIndex {
    Hex {
        buckets: FxHashMap<u64, Vec<u32>>,
        res: i32,
    },
    Rtree {
        tree: RTree<EdgeBounds>,
    },
}

impl SpatialIndex {
    /// Build the chosen index from edge metadata. Edges without geometry
    /// still land in the H3 buckets (their cells are known) but can never
    /// pass refinement, so they are skipped in query results either way.
    pub fn build(kind: IndexKind, edges: &EdgeMetaStore) -> Self {
        match kind {
            IndexKind::Hex => Self::build_hex(edges, DEFAULT_INDEX_RES),
            IndexKind::Rtree => Self::build_rtree(edges),
        }
    }

    pub fn kind(&self) -> IndexKind {
        match self {
            SpatialIndex::Hex { .. } => IndexKind::Hex,
            SpatialIndex::Rtree { .. } => IndexKind::Rtree,
        }
    }

    fn build_hex(edges: &EdgeMetaStore, res: i32) -> Self {
        let mut buckets: FxHashMap<u64, Vec<u32>> = FxHashMap::default();
        for (edge_id, meta) in edges.iter() {
            if meta.from_cell != 0 {
                let indexed = h3::parent(meta.from_cell, res);
                if indexed != 0 {
                    buckets.entry(indexed).or_default().push(edge_id);
                }
            }
            if meta.to_cell != 0 && meta.to_cell != meta.from_cell {
                let indexed = h3::parent(meta.to_cell, res);
                if indexed != 0 {
                    buckets.entry(indexed).or_default().push(edge_id);
                }
            }
        }
        tracing::info!(cells = buckets.len(), res, "H3 bucket index built");
        SpatialIndex::Hex { buckets, res }
    }

    fn build_rtree(edges: &EdgeMetaStore) -> Self {
        let mut items = Vec::with_capacity(edges.len());
        for (edge_id, meta) in edges.iter() {
            if meta.geometry.is_empty() {
                continue;
            }
            let mut min_lon = 180.0f64;
            let mut max_lon = -180.0f64;
            let mut min_lat = 90.0f64;
            let mut max_lat = -90.0f64;
            for &(lon, lat) in &meta.geometry {
                min_lon = min_lon.min(lon);
                max_lon = max_lon.max(lon);
                min_lat = min_lat.min(lat);
                max_lat = max_lat.max(lat);
            }
            items.push(EdgeBounds {
                aabb: AABB::from_corners([min_lon, min_lat], [max_lon, max_lat]),
                edge_id,
            });
        }
        tracing::info!(edges = items.len(), "R-tree index built");
        SpatialIndex::Rtree {
            tree: RTree::bulk_load(items),
        }
    }

    /// K nearest edges within `radius_m` of the query point, ascending by
    /// refined distance, ties broken by lower edge ID.
    pub fn find_nearest_edges(
        &self,
        edges: &EdgeMetaStore,
        lat: f64,
        lng: f64,
        k: usize,
        radius_m: f64,
    ) -> Vec<(u32, f64)> {
        let mut results: Vec<(u32, f64)> = Vec::new();

        match self {
            SpatialIndex::Rtree { tree } => {
                let deg_radius = radius_m / 111_000.0;
                let query = AABB::from_corners(
                    [lng - deg_radius, lat - deg_radius],
                    [lng + deg_radius, lat + deg_radius],
                );
                for item in tree.locate_in_envelope_intersecting(&query) {
                    if let Some(geometry) = edges.geometry(item.edge_id) {
                        let dist = point_to_polyline_m(lat, lng, geometry);
                        if dist <= radius_m {
                            results.push((item.edge_id, dist));
                        }
                    }
                }
            }
            SpatialIndex::Hex { buckets, res } => {
                let origin = match h3::latlng_to_cell(lat, lng, *res) {
                    Ok(cell) => cell,
                    Err(_) => return results,
                };
                let k_max = 5.min((radius_m / 400.0) as i32 + 1);

                let mut cells = vec![origin];
                for ring in 1..=k_max {
                    cells.extend(h3::grid_ring(origin, ring));
                }

                let mut seen: FxHashSet<u32> = FxHashSet::default();
                for cell in cells {
                    let Some(bucket) = buckets.get(&cell) else {
                        continue;
                    };
                    for &edge_id in bucket {
                        if !seen.insert(edge_id) {
                            continue;
                        }
                        let Some(geometry) = edges.geometry(edge_id) else {
                            continue;
                        };
                        let dist = point_to_polyline_m(lat, lng, geometry);
                        if dist <= radius_m {
                            results.push((edge_id, dist));
                        }
                    }
                }
            }
        }

        results.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        results.truncate(k);
        results
    }

    /// Approximate resident size in bytes.
    pub fn memory_usage(&self) -> usize {
        match self {
            SpatialIndex::Hex { buckets, .. } => {
                buckets.len() * (8 + 24 + 16)
                    + buckets.values().map(|v| v.capacity() * 4).sum::<usize>()
            }
            SpatialIndex::Rtree { tree } => {
                (tree.size() as f64 * std::mem::size_of::<EdgeBounds>() as f64 * 1.2) as usize
            }
        }
    }
}

pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p1 = Point::new(lon1, lat1);
    let p2 = Point::new(lon2, lat2);
    p1.haversine_distance(&p2)
}

/// Exact distance in meters from a point to a polyline of (lon, lat) pairs.
///
/// Projection happens in degree space (good enough at street scale), the
/// final distance is haversine to the projected point.
pub fn point_to_polyline_m(lat: f64, lng: f64, line: &[(f64, f64)]) -> f64 {
    if line.is_empty() {
        return f64::INFINITY;
    }
    if line.len() == 1 {
        return haversine_distance(lat, lng, line[0].1, line[0].0);
    }

    let mut min_dist = f64::INFINITY;
    for seg in line.windows(2) {
        let (x1, y1) = seg[0];
        let (x2, y2) = seg[1];
        let (x0, y0) = (lng, lat);

        let dx = x2 - x1;
        let dy = y2 - y1;
        let len_sq = dx * dx + dy * dy;

        let t = if len_sq > 1e-12 {
            (((x0 - x1) * dx + (y0 - y1) * dy) / len_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let proj_x = x1 + t * dx;
        let proj_y = y1 + t * dy;
        min_dist = min_dist.min(haversine_distance(lat, lng, proj_y, proj_x));
    }
    min_dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EdgeMeta;

    fn meta_with_geometry(points: Vec<(f64, f64)>) -> EdgeMeta {
        let from_cell = points
            .first()
            .and_then(|&(lon, lat)| h3::latlng_to_cell(lat, lon, 12).ok())
            .unwrap_or(0);
        let to_cell = points
            .last()
            .and_then(|&(lon, lat)| h3::latlng_to_cell(lat, lon, 12).ok())
            .unwrap_or(0);
        EdgeMeta {
            from_cell,
            to_cell,
            lca_res: 8,
            length: 100.0,
            cost: 1.0,
            geometry: points,
        }
    }

    fn sample_edges() -> EdgeMetaStore {
        let mut store = EdgeMetaStore::new();
        // short segment right at the query point
        store.insert(
            1,
            meta_with_geometry(vec![(4.3510, 50.8500), (4.3520, 50.8505)]),
        );
        // parallel segment ~100m north
        store.insert(
            2,
            meta_with_geometry(vec![(4.3510, 50.8510), (4.3520, 50.8515)]),
        );
        // far away
        store.insert(
            3,
            meta_with_geometry(vec![(4.4510, 50.9500), (4.4520, 50.9505)]),
        );
        // no geometry, never returned
        store.insert(4, EdgeMeta::default());
        store
    }

    #[test]
    fn test_point_to_polyline() {
        let line = vec![(4.3510, 50.8500), (4.3530, 50.8500)];
        // point on the segment midpoint
        let d = point_to_polyline_m(50.8500, 4.3520, &line);
        assert!(d < 1.0, "distance {d} should be ~0");
        // ~111m north of the segment
        let d = point_to_polyline_m(50.8510, 4.3520, &line);
        assert!((d - 111.0).abs() < 5.0, "distance {d} should be ~111m");
        assert!(point_to_polyline_m(50.0, 4.0, &[]).is_infinite());
    }

    #[test]
    fn test_rtree_ordering_and_radius() {
        let edges = sample_edges();
        let index = SpatialIndex::build(IndexKind::Rtree, &edges);
        let found = index.find_nearest_edges(&edges, 50.8502, 4.3515, 5, 500.0);
        assert_eq!(found.iter().map(|&(id, _)| id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(found[0].1 < found[1].1);

        // tight radius drops the northern edge
        let found = index.find_nearest_edges(&edges, 50.8502, 4.3515, 5, 50.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, 1);
    }

    #[test]
    fn test_hex_matches_rtree_nearby() {
        let edges = sample_edges();
        let hex = SpatialIndex::build(IndexKind::Hex, &edges);
        let rtree = SpatialIndex::build(IndexKind::Rtree, &edges);
        let a = hex.find_nearest_edges(&edges, 50.8502, 4.3515, 5, 500.0);
        let b = rtree.find_nearest_edges(&edges, 50.8502, 4.3515, 5, 500.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_k_truncation() {
        let edges = sample_edges();
        let index = SpatialIndex::build(IndexKind::Rtree, &edges);
        let found = index.find_nearest_edges(&edges, 50.8502, 4.3515, 1, 500.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, 1);
    }

    #[test]
    fn test_tie_broken_by_lower_id() {
        let mut edges = EdgeMetaStore::new();
        let geometry = vec![(4.3510, 50.8500), (4.3520, 50.8505)];
        edges.insert(9, meta_with_geometry(geometry.clone()));
        edges.insert(2, meta_with_geometry(geometry));
        let index = SpatialIndex::build(IndexKind::Rtree, &edges);
        let found = index.find_nearest_edges(&edges, 50.8502, 4.3515, 5, 500.0);
        assert_eq!(found.iter().map(|&(id, _)| id).collect::<Vec<_>>(), vec![2, 9]);
    }
}
