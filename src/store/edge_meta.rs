//! Per-edge metadata: cells, weights, and polyline geometry.

use rustc_hash::FxHashMap;

/// Metadata for one base edge. Cells of 0 and `lca_res` of -1 mean
/// "unknown"; an empty geometry means the edge has no polyline.
#[derive(Debug, Clone)]
pub struct EdgeMeta {
    pub from_cell: u64,
    pub to_cell: u64,
    pub lca_res: i32,
    pub length: f64,
    pub cost: f64,
    /// Ordered (lon, lat) pairs.
    pub geometry: Vec<(f64, f64)>,
}

impl Default for EdgeMeta {
    fn default() -> Self {
        EdgeMeta {
            from_cell: 0,
            to_cell: 0,
            lca_res: -1,
            length: 0.0,
            cost: 0.0,
            geometry: Vec::new(),
        }
    }
}

/// Sparse edge-ID-keyed metadata store.
#[derive(Default)]
pub struct EdgeMetaStore {
    map: FxHashMap<u32, EdgeMeta>,
}

impl EdgeMetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, edge: u32, meta: EdgeMeta) {
        self.map.insert(edge, meta);
    }

    #[inline]
    pub fn get(&self, edge: u32) -> Option<&EdgeMeta> {
        self.map.get(&edge)
    }

    #[inline]
    pub fn contains(&self, edge: u32) -> bool {
        self.map.contains_key(&edge)
    }

    /// Traversal cost of an edge, 0.0 when unknown.
    #[inline]
    pub fn cost(&self, edge: u32) -> f64 {
        self.map.get(&edge).map(|m| m.cost).unwrap_or(0.0)
    }

    /// `to_cell` of an edge, 0 when unknown.
    #[inline]
    pub fn cell(&self, edge: u32) -> u64 {
        self.map.get(&edge).map(|m| m.to_cell).unwrap_or(0)
    }

    #[inline]
    pub fn geometry(&self, edge: u32) -> Option<&[(f64, f64)]> {
        self.map.get(&edge).map(|m| m.geometry.as_slice())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &EdgeMeta)> {
        self.map.iter().map(|(&k, v)| (k, v))
    }

    /// Approximate resident size in bytes.
    pub fn memory_usage(&self) -> usize {
        let mut total = self.map.len() * (4 + std::mem::size_of::<EdgeMeta>() + 16);
        for meta in self.map.values() {
            total += meta.geometry.capacity() * 16;
        }
        total
    }
}

/// Decode a WKT `LINESTRING(lon lat, lon lat, ...)` into (lon, lat) pairs.
///
/// Anything without a parenthesized body yields an empty geometry, and
/// unparseable vertices are dropped.
pub fn parse_linestring(wkt: &str) -> Vec<(f64, f64)> {
    let start = match wkt.find('(') {
        Some(i) => i,
        None => return Vec::new(),
    };
    let end = match wkt.rfind(')') {
        Some(i) if i > start => i,
        _ => return Vec::new(),
    };

    let mut points = Vec::new();
    for pair in wkt[start + 1..end].split(',') {
        let mut it = pair.split_whitespace();
        let lon = it.next().and_then(|s| s.parse::<f64>().ok());
        let lat = it.next().and_then(|s| s.parse::<f64>().ok());
        if let (Some(lon), Some(lat)) = (lon, lat) {
            points.push((lon, lat));
        }
    }
    points.shrink_to_fit();
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_linestring() {
        let pts = parse_linestring("LINESTRING(4.35 50.85, 4.36 50.86, 4.37 50.87)");
        assert_eq!(pts, vec![(4.35, 50.85), (4.36, 50.86), (4.37, 50.87)]);
    }

    #[test]
    fn test_parse_linestring_malformed() {
        assert!(parse_linestring("").is_empty());
        assert!(parse_linestring("LINESTRING").is_empty());
        assert!(parse_linestring("POINT(1 2").is_empty());
        // bad vertex dropped, good ones kept
        let pts = parse_linestring("LINESTRING(4.35 50.85, oops, 4.37 50.87)");
        assert_eq!(pts.len(), 2);
    }

    #[test]
    fn test_store_defaults() {
        let mut store = EdgeMetaStore::new();
        store.insert(
            7,
            EdgeMeta {
                cost: 3.5,
                to_cell: 42,
                ..Default::default()
            },
        );
        assert_eq!(store.cost(7), 3.5);
        assert_eq!(store.cell(7), 42);
        assert_eq!(store.cost(8), 0.0);
        assert_eq!(store.cell(8), 0);
        assert!(store.geometry(8).is_none());
    }
}
