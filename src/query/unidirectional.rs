//! Unidirectional phase-machine search.
//!
//! A single forward Dijkstra whose state is `(edge, phase)` packed into one
//! integer. The phase tracks the walk through the hierarchy:
//!
//!   0  at the source, nothing taken yet
//!   1  ascending above the high cell (`inside == +1` while the record's
//!      resolution is above the high resolution)
//!   2  crossed the peak (an up edge at/below the high resolution, or any
//!      non-up record)
//!   3  strictly descending (`inside == -1` only)
//!
//! Any transition not listed is forbidden, which is what enforces the
//! ascend-peak-descend shape of a valid hierarchy walk.

use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use crate::error::{EngineError, Result};
use crate::store::{EdgeMetaStore, ShortcutStore, INSIDE_UP};

use super::{check_endpoints, high_cell, HeapEntryState, QueryResult};

const PHASE_BITS: u32 = 4;
const PHASE_MASK: u64 = 0xF;

#[inline]
fn pack(edge: u32, phase: u8) -> u64 {
    ((edge as u64) << PHASE_BITS) | phase as u64
}

#[inline]
fn unpack(state: u64) -> (u32, u8) {
    ((state >> PHASE_BITS) as u32, (state & PHASE_MASK) as u8)
}

pub fn query_unidirectional(
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

    let mut dist: FxHashMap<u64, f64> = FxHashMap::default();
    let mut parent: FxHashMap<u64, u64> = FxHashMap::default();
    let mut pq: BinaryHeap<HeapEntryState> = BinaryHeap::new();

    let start = pack(source, 0);
    dist.insert(start, 0.0);
    parent.insert(start, start);
    pq.push(HeapEntryState {
        dist: 0.0,
        state: start,
    });

    let mut best_dist = f64::INFINITY;
    let mut best_end_state = 0u64;
    let mut found = false;

    while let Some(HeapEntryState { dist: d, state }) = pq.pop() {
        let (u, phase) = unpack(state);

        if dist.get(&state).map(|&cur| d > cur).unwrap_or(false) {
            continue;
        }
        if d >= best_dist {
            continue;
        }

        if u == target {
            best_dist = d + edges.cost(target);
            best_end_state = state;
            found = true;
            break;
        }

        for sc in shortcuts.outgoing(u) {
            let up = sc.inside() == INSIDE_UP;
            let next_phase = match phase {
                0 | 1 => {
                    if up && sc.res() > high_res {
                        1
                    } else {
                        // up at/below the peak, or any non-up record
                        2
                    }
                }
                2 if !up => 3,
                3 if sc.inside() == -1 => 3,
                _ => continue, // forbidden transition
            };

            let nd = d + sc.cost as f64;
            let next = pack(sc.to, next_phase);
            if nd < dist.get(&next).copied().unwrap_or(f64::INFINITY) {
                dist.insert(next, nd);
                parent.insert(next, state);
                pq.push(HeapEntryState {
                    dist: nd,
                    state: next,
                });
            }
        }
    }

    if !found {
        return Err(EngineError::NoPath);
    }

    let mut path = Vec::new();
    let mut curr = best_end_state;
    loop {
        path.push(unpack(curr).0);
        match parent.get(&curr) {
            Some(&prev) if prev != curr => curr = prev,
            _ => break,
        }
    }
    path.reverse();

    Ok(QueryResult {
        distance: best_dist,
        path,
    })
}
