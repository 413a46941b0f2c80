//! Route geometry assembly: stitch edge polylines into a GeoJSON feature
//! and trim the ends to the requested coordinates.

use geojson::{Feature, Geometry, JsonObject, Value};

use crate::graph::RouteGraph;

/// Concatenate the polylines of a base-edge path into one LineString
/// feature. Returns `None` when no edge contributed any geometry.
pub fn build_route_feature(graph: &RouteGraph, path: &[u32]) -> Option<Feature> {
    let mut coords: Vec<Vec<f64>> = Vec::new();
    for &edge_id in path {
        if let Some(geometry) = graph.edges.geometry(edge_id) {
            for &(lon, lat) in geometry {
                coords.push(vec![lon, lat]);
            }
        }
    }

    if coords.is_empty() {
        return None;
    }

    let mut properties = JsonObject::new();
    properties.insert("edge_count".to_string(), serde_json::json!(path.len()));

    Some(Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::LineString(coords))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    })
}

/// Total length in meters of a base-edge path.
pub fn path_length_meters(graph: &RouteGraph, path: &[u32]) -> f64 {
    path.iter()
        .filter_map(|&e| graph.edge_meta(e))
        .map(|m| m.length)
        .sum()
}

/// Segment scan window when trimming; long routes only need their ends
/// adjusted.
const TRIM_SCAN: usize = 100;

/// Trim a stitched LineString so it starts/ends at the projections of the
/// requested coordinates instead of the snapped edges' full extent.
pub fn trim_feature(
    feature: &mut Feature,
    start_lat: f64,
    start_lon: f64,
    end_lat: f64,
    end_lon: f64,
) {
    let Some(geometry) = feature.geometry.as_mut() else {
        return;
    };
    let Value::LineString(coords) = &mut geometry.value else {
        return;
    };
    if coords.len() < 2 {
        return;
    }

    // (lat, lon) points
    let points: Vec<(f64, f64)> = coords.iter().map(|c| (c[1], c[0])).collect();

    let scan_limit = TRIM_SCAN.min(points.len() - 1);
    let (mut start_idx, mut new_start) = (0usize, points[0]);
    let mut min_start = f64::INFINITY;
    for i in 0..scan_limit {
        let p = project_on_segment((start_lat, start_lon), points[i], points[i + 1]);
        let d = dist_sq((start_lat, start_lon), p);
        if d < min_start {
            min_start = d;
            new_start = p;
            start_idx = i;
        }
    }

    let end_scan_start = points.len().saturating_sub(TRIM_SCAN);
    let (mut end_idx, mut new_end) = (points.len() - 1, *points.last().unwrap());
    let mut min_end = f64::INFINITY;
    for i in end_scan_start..points.len() - 1 {
        let p = project_on_segment((end_lat, end_lon), points[i], points[i + 1]);
        let d = dist_sq((end_lat, end_lon), p);
        if d < min_end {
            min_end = d;
            new_end = p;
            end_idx = i;
        }
    }

    let mut trimmed: Vec<Vec<f64>> = Vec::with_capacity(end_idx.saturating_sub(start_idx) + 2);
    trimmed.push(vec![new_start.1, new_start.0]);
    for point in points.iter().take(end_idx + 1).skip(start_idx + 1) {
        trimmed.push(vec![point.1, point.0]);
    }
    trimmed.push(vec![new_end.1, new_end.0]);

    *coords = trimmed;
}

fn dist_sq(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dlat = a.0 - b.0;
    let dlon = a.1 - b.1;
    dlat * dlat + dlon * dlon
}

/// Closest point to `p` on segment `a`-`b`, all in (lat, lon) degrees.
fn project_on_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> (f64, f64) {
    let l2 = dist_sq(a, b);
    if l2 == 0.0 {
        return a;
    }
    let t = (((p.0 - a.0) * (b.0 - a.0) + (p.1 - a.1) * (b.1 - a.1)) / l2).clamp(0.0, 1.0);
    (a.0 + t * (b.0 - a.0), a.1 + t * (b.1 - a.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EdgeMeta, EdgeMetaStore, ShortcutRow, ShortcutStore};

    fn graph_with_geometry() -> RouteGraph {
        let shortcuts = ShortcutStore::from_rows(vec![ShortcutRow {
            from: 1,
            to: 2,
            cost: 1.0,
            via_edge: 0,
            cell: 0,
            inside: 1,
        }])
        .unwrap();
        let mut edges = EdgeMetaStore::new();
        edges.insert(
            1,
            EdgeMeta {
                length: 100.0,
                geometry: vec![(4.35, 50.85), (4.36, 50.85)],
                ..Default::default()
            },
        );
        edges.insert(
            2,
            EdgeMeta {
                length: 50.0,
                geometry: vec![(4.36, 50.85), (4.37, 50.85)],
                ..Default::default()
            },
        );
        RouteGraph::from_parts(shortcuts, edges)
    }

    #[test]
    fn test_feature_stitching() {
        let graph = graph_with_geometry();
        let feature = build_route_feature(&graph, &[1, 2]).unwrap();
        let Some(Geometry {
            value: Value::LineString(coords),
            ..
        }) = feature.geometry
        else {
            panic!("expected a LineString");
        };
        assert_eq!(coords.len(), 4);
        assert_eq!(coords[0], vec![4.35, 50.85]);
        assert_eq!(
            feature.properties.unwrap().get("edge_count").unwrap(),
            &serde_json::json!(2)
        );
    }

    #[test]
    fn test_feature_empty_without_geometry() {
        let graph = graph_with_geometry();
        assert!(build_route_feature(&graph, &[99]).is_none());
    }

    #[test]
    fn test_path_length() {
        let graph = graph_with_geometry();
        assert_eq!(path_length_meters(&graph, &[1, 2]), 150.0);
    }

    #[test]
    fn test_trim_snaps_endpoints() {
        let graph = graph_with_geometry();
        let mut feature = build_route_feature(&graph, &[1, 2]).unwrap();
        // request points sit just inside the line's extent
        trim_feature(&mut feature, 50.85, 4.355, 50.85, 4.365);
        let Some(Geometry {
            value: Value::LineString(coords),
            ..
        }) = feature.geometry
        else {
            panic!("expected a LineString");
        };
        assert!((coords.first().unwrap()[0] - 4.355).abs() < 1e-9);
        assert!((coords.last().unwrap()[0] - 4.365).abs() < 1e-9);
    }
}
