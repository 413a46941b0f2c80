//! Resolution-pruned bidirectional search.
//!
//! Heap entries carry the cell resolution the edge was reached at. The
//! forward frontier refuses to expand below the high cell's resolution; the
//! backward frontier classifies each pop against it and admits only the
//! record kinds legal for that side of the hierarchy. Termination tracks
//! per-direction minimum arrivals into the meeting zone, which gives a
//! tighter bound than the frontier tops alone.

use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use crate::error::{EngineError, Result};
use crate::store::{EdgeMetaStore, ShortcutStore, INSIDE_UP};

use super::{check_endpoints, high_cell, reconstruct_bidirectional, HeapEntryRes, QueryResult};

pub fn query_pruned(
    shortcuts: &ShortcutStore,
    edges: &EdgeMetaStore,
    source: u32,
    target: u32,
) -> Result<QueryResult> {
    if let Some(r) = check_endpoints(edges, source, target)? {
        return Ok(r);
    }

    let high = high_cell(edges, source, target);
    let high_res = high.res as i8;

    let mut dist_fwd: FxHashMap<u32, f64> = FxHashMap::default();
    let mut dist_bwd: FxHashMap<u32, f64> = FxHashMap::default();
    let mut parent_fwd: FxHashMap<u32, u32> = FxHashMap::default();
    let mut parent_bwd: FxHashMap<u32, u32> = FxHashMap::default();
    let mut pq_fwd: BinaryHeap<HeapEntryRes> = BinaryHeap::new();
    let mut pq_bwd: BinaryHeap<HeapEntryRes> = BinaryHeap::new();

    let src_res = edges.get(source).map(|m| m.lca_res as i8).unwrap_or(-1);
    let tgt_res = edges.get(target).map(|m| m.lca_res as i8).unwrap_or(-1);

    dist_fwd.insert(source, 0.0);
    parent_fwd.insert(source, source);
    pq_fwd.push(HeapEntryRes {
        dist: 0.0,
        edge: source,
        res: src_res,
    });

    let target_cost = edges.cost(target);
    dist_bwd.insert(target, target_cost);
    parent_bwd.insert(target, target);
    pq_bwd.push(HeapEntryRes {
        dist: target_cost,
        edge: target,
        res: tgt_res,
    });

    let mut best = f64::INFINITY;
    let mut meeting = 0u32;
    let mut found = false;
    let mut min_arrival_fwd = f64::INFINITY;
    let mut min_arrival_bwd = f64::INFINITY;

    'search: while !(pq_fwd.is_empty() && pq_bwd.is_empty()) {
        // Forward step
        if let Some(HeapEntryRes {
            dist: d,
            edge: u,
            res: u_res,
        }) = pq_fwd.pop()
        {
            // meeting bookkeeping happens before staleness: an already
            // settled edge can still tighten the arrival bounds
            if let Some(&bd) = dist_bwd.get(&u) {
                let fd = dist_fwd[&u];
                min_arrival_fwd = min_arrival_fwd.min(fd);
                min_arrival_bwd = min_arrival_bwd.min(bd);
                if d + bd < best {
                    best = d + bd;
                    meeting = u;
                    found = true;
                }
            }

            if dist_fwd.get(&u).map(|&cur| d > cur).unwrap_or(false) {
                continue 'search;
            }
            if d >= best {
                continue 'search;
            }

            if u_res < high_res {
                // dropped below the high cell: record the arrival, stop
                // expanding from here
                min_arrival_fwd = min_arrival_fwd.min(dist_fwd[&u]);
                continue 'search;
            }
            if u_res == high_res {
                min_arrival_fwd = min_arrival_fwd.min(dist_fwd[&u]);
            }

            for sc in shortcuts.outgoing(u) {
                if sc.inside() != INSIDE_UP {
                    continue;
                }
                let nd = d + sc.cost as f64;
                if nd < dist_fwd.get(&sc.to).copied().unwrap_or(f64::INFINITY) {
                    dist_fwd.insert(sc.to, nd);
                    parent_fwd.insert(sc.to, u);
                    pq_fwd.push(HeapEntryRes {
                        dist: nd,
                        edge: sc.to,
                        res: sc.res(),
                    });
                }
            }
        }

        // Backward step
        if let Some(HeapEntryRes {
            dist: d,
            edge: u,
            res: u_res,
        }) = pq_bwd.pop()
        {
            if let Some(&fd) = dist_fwd.get(&u) {
                min_arrival_fwd = min_arrival_fwd.min(fd);
                min_arrival_bwd = min_arrival_bwd.min(dist_bwd[&u]);
                if fd + d < best {
                    best = fd + d;
                    meeting = u;
                    found = true;
                }
            }

            if dist_bwd.get(&u).map(|&cur| d > cur).unwrap_or(false) {
                continue 'search;
            }
            if d >= best {
                continue 'search;
            }

            let check = u_res >= high_res;
            if u_res == high_res || !check {
                min_arrival_bwd = min_arrival_bwd.min(dist_bwd[&u]);
            }

            for &idx in shortcuts.incoming(u) {
                let sc = shortcuts.record(idx);

                let allowed = match sc.inside() {
                    -1 => check,
                    0 => u_res <= high_res,
                    -2 => !check,
                    _ => false,
                };
                if !allowed {
                    continue;
                }

                let nd = d + sc.cost as f64;
                if nd < dist_bwd.get(&sc.from).copied().unwrap_or(f64::INFINITY) {
                    dist_bwd.insert(sc.from, nd);
                    parent_bwd.insert(sc.from, u);
                    pq_bwd.push(HeapEntryRes {
                        dist: nd,
                        edge: sc.from,
                        res: sc.res(),
                    });
                }
            }
        }

        // Tight termination: neither frontier top plus the opposite side's
        // best arrival can beat the current meeting.
        if best < f64::INFINITY {
            let mut bound_fwd = min_arrival_fwd;
            let mut bound_bwd = min_arrival_bwd;
            if let Some(top) = pq_fwd.peek() {
                bound_fwd = bound_fwd.min(top.dist);
            }
            if let Some(top) = pq_bwd.peek() {
                bound_bwd = bound_bwd.min(top.dist);
            }

            let fwd_good = pq_fwd
                .peek()
                .map(|t| t.dist + bound_bwd < best)
                .unwrap_or(false);
            let bwd_good = pq_bwd
                .peek()
                .map(|t| t.dist + bound_fwd < best)
                .unwrap_or(false);
            if !fwd_good && !bwd_good {
                break;
            }
        }
    }

    if !found {
        return Err(EngineError::NoPath);
    }

    Ok(QueryResult {
        distance: best,
        path: reconstruct_bidirectional(&parent_fwd, &parent_bwd, meeting),
    })
}
