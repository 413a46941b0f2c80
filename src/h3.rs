//! H3 cell primitives over raw 64-bit indices.
//!
//! The engine stores cells as plain `u64` (0 meaning "none") so the search
//! core never depends on the H3 backend directly. Everything that needs the
//! actual hexagon math goes through this module, which wraps `h3o`.

use h3o::{CellIndex, LatLng, Resolution};

use crate::error::{EngineError, Result};

/// Resolution of a cell, or -1 for cell 0 / invalid indices.
pub fn resolution(cell: u64) -> i32 {
    match CellIndex::try_from(cell) {
        Ok(c) => u8::from(c.resolution()) as i32,
        Err(_) => -1,
    }
}

/// Ancestor of `cell` at `target_res`.
///
/// Returns 0 on invalid arguments and `cell` itself when `target_res` is at
/// or below the cell's own resolution.
pub fn parent(cell: u64, target_res: i32) -> u64 {
    if cell == 0 || target_res < 0 {
        return 0;
    }
    let c = match CellIndex::try_from(cell) {
        Ok(c) => c,
        Err(_) => return 0,
    };
    let current = u8::from(c.resolution()) as i32;
    if target_res >= current {
        return cell;
    }
    let res = match Resolution::try_from(target_res as u8) {
        Ok(r) => r,
        Err(_) => return 0,
    };
    c.parent(res).map(u64::from).unwrap_or(0)
}

/// Coarsest common ancestor of two cells, or 0 if none (including when
/// either input is 0).
pub fn lca(cell1: u64, cell2: u64) -> u64 {
    if cell1 == 0 || cell2 == 0 {
        return 0;
    }
    let res1 = resolution(cell1);
    let res2 = resolution(cell2);
    if res1 < 0 || res2 < 0 {
        return 0;
    }
    let mut min_res = res1.min(res2);

    let mut c1 = if res1 > min_res {
        parent(cell1, min_res)
    } else {
        cell1
    };
    let mut c2 = if res2 > min_res {
        parent(cell2, min_res)
    } else {
        cell2
    };

    while c1 != c2 && min_res > 0 {
        min_res -= 1;
        c1 = parent(c1, min_res);
        c2 = parent(c2, min_res);
    }

    if c1 == c2 {
        c1
    } else {
        0
    }
}

/// Whether `high_cell` is the `high_res` ancestor of `node_cell`.
///
/// Vacuously true when the high cell is unset; false when the node has no
/// cell or sits above the high resolution.
pub fn parent_check(node_cell: u64, high_cell: u64, high_res: i32) -> bool {
    if high_cell == 0 || high_res < 0 {
        return true;
    }
    if node_cell == 0 {
        return false;
    }
    if high_res > resolution(node_cell) {
        return false;
    }
    parent(node_cell, high_res) == high_cell
}

/// Cell containing the coordinate at the given resolution.
pub fn latlng_to_cell(lat: f64, lng: f64, res: i32) -> Result<u64> {
    if !(0..=15).contains(&res) {
        return Err(EngineError::InvalidArg(format!(
            "H3 resolution {res} out of range [0, 15]"
        )));
    }
    let ll = LatLng::new(lat, lng)
        .map_err(|e| EngineError::InvalidArg(format!("bad coordinate: {e}")))?;
    // res checked above, conversion cannot fail
    let r = Resolution::try_from(res as u8).map_err(|e| EngineError::InvalidArg(e.to_string()))?;
    Ok(u64::from(ll.to_cell(r)))
}

/// Cells exactly at ring distance `k` from `center`; `k = 0` returns just
/// the center. Empty on invalid input.
pub fn grid_ring(center: u64, k: i32) -> Vec<u64> {
    if center == 0 || k < 0 {
        return Vec::new();
    }
    let c = match CellIndex::try_from(center) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };
    if k == 0 {
        return vec![center];
    }
    // The fast path fails near pentagons; fall back to the safe disk walk
    // and keep only cells at exactly distance k.
    let ring: Option<Vec<CellIndex>> = c.grid_ring_fast(k as u32).collect();
    match ring {
        Some(cells) => cells.into_iter().map(u64::from).collect(),
        None => c
            .grid_disk_distances_safe(k as u32)
            .filter(|&(_, d)| d == k as u32)
            .map(|(cell, _)| u64::from(cell))
            .collect(),
    }
}

/// Boundary polygon of a cell as (lat, lon) degree pairs, closed by
/// repeating the first vertex. Empty for cell 0.
pub fn cell_boundary(cell: u64) -> Vec<(f64, f64)> {
    let c = match CellIndex::try_from(cell) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };
    let mut boundary: Vec<(f64, f64)> = c
        .boundary()
        .iter()
        .map(|v| (v.lat(), v.lng()))
        .collect();
    if let Some(&first) = boundary.first() {
        boundary.push(first);
    }
    boundary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_of_zero() {
        assert_eq!(resolution(0), -1);
    }

    #[test]
    fn test_resolution_roundtrip() {
        let cell = latlng_to_cell(50.8503, 4.3517, 9).unwrap();
        assert_eq!(resolution(cell), 9);
    }

    #[test]
    fn test_latlng_rejects_bad_res() {
        assert!(latlng_to_cell(50.0, 4.0, 16).is_err());
        assert!(latlng_to_cell(50.0, 4.0, -1).is_err());
    }

    #[test]
    fn test_latlng_rejects_nan() {
        assert!(latlng_to_cell(f64::NAN, 4.0, 9).is_err());
    }

    #[test]
    fn test_parent_at_or_above_own_res() {
        let cell = latlng_to_cell(50.8503, 4.3517, 9).unwrap();
        assert_eq!(parent(cell, 9), cell);
        assert_eq!(parent(cell, 12), cell);
    }

    #[test]
    fn test_parent_reduces_resolution() {
        let cell = latlng_to_cell(50.8503, 4.3517, 9).unwrap();
        let p = parent(cell, 6);
        assert_eq!(resolution(p), 6);
        // coarser parent contains the same coordinate
        assert_eq!(p, parent(latlng_to_cell(50.8503, 4.3517, 15).unwrap(), 6));
    }

    #[test]
    fn test_parent_invalid_args() {
        assert_eq!(parent(0, 5), 0);
        let cell = latlng_to_cell(50.8503, 4.3517, 9).unwrap();
        assert_eq!(parent(cell, -1), 0);
    }

    #[test]
    fn test_lca_same_cell() {
        let cell = latlng_to_cell(50.8503, 4.3517, 9).unwrap();
        assert_eq!(lca(cell, cell), cell);
    }

    #[test]
    fn test_lca_nearby_points() {
        // Two points a few hundred meters apart share a coarse ancestor.
        let a = latlng_to_cell(50.8503, 4.3517, 12).unwrap();
        let b = latlng_to_cell(50.8510, 4.3525, 12).unwrap();
        let l = lca(a, b);
        assert_ne!(l, 0);
        let res = resolution(l);
        assert_eq!(parent(a, res), l);
        assert_eq!(parent(b, res), l);
    }

    #[test]
    fn test_lca_degenerate() {
        let cell = latlng_to_cell(50.8503, 4.3517, 9).unwrap();
        assert_eq!(lca(0, cell), 0);
        assert_eq!(lca(cell, 0), 0);
        assert_eq!(lca(0, 0), 0);
    }

    #[test]
    fn test_lca_antipodal_is_zero() {
        // Opposite sides of the planet share no ancestor.
        let a = latlng_to_cell(50.8503, 4.3517, 9).unwrap();
        let b = latlng_to_cell(-50.8503, -175.6483, 9).unwrap();
        assert_eq!(lca(a, b), 0);
    }

    #[test]
    fn test_grid_ring_k0() {
        let cell = latlng_to_cell(50.8503, 4.3517, 9).unwrap();
        assert_eq!(grid_ring(cell, 0), vec![cell]);
    }

    #[test]
    fn test_grid_ring_k1_is_six_hexes() {
        let cell = latlng_to_cell(50.8503, 4.3517, 9).unwrap();
        let ring = grid_ring(cell, 1);
        assert_eq!(ring.len(), 6);
        assert!(!ring.contains(&cell));
    }

    #[test]
    fn test_grid_ring_invalid() {
        assert!(grid_ring(0, 1).is_empty());
    }

    #[test]
    fn test_cell_boundary_closed() {
        let cell = latlng_to_cell(50.8503, 4.3517, 9).unwrap();
        let boundary = cell_boundary(cell);
        // hexagon: 6 vertices plus the repeated first
        assert_eq!(boundary.len(), 7);
        assert_eq!(boundary.first(), boundary.last());
    }

    #[test]
    fn test_parent_check() {
        let cell = latlng_to_cell(50.8503, 4.3517, 9).unwrap();
        let high = parent(cell, 6);
        assert!(parent_check(cell, high, 6));
        assert!(parent_check(cell, 0, 6));
        assert!(!parent_check(0, high, 6));
        // node above the high resolution cannot match
        assert!(!parent_check(parent(cell, 4), high, 6));
    }
}
