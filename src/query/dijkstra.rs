//! Plain forward Dijkstra over all shortcut records, no filtering and no
//! pruning. Slow but obviously correct; the reference for cross-checking
//! the hierarchy-aware algorithms.

use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;

use crate::error::{EngineError, Result};
use crate::store::{EdgeMetaStore, ShortcutStore};

use super::{check_endpoints, HeapEntry, QueryResult};

pub fn query_dijkstra(
    shortcuts: &ShortcutStore,
    edges: &EdgeMetaStore,
    source: u32,
    target: u32,
) -> Result<QueryResult> {
    if let Some(r) = check_endpoints(edges, source, target)? {
        return Ok(r);
    }

    let mut dist: FxHashMap<u32, f64> = FxHashMap::default();
    let mut parent: FxHashMap<u32, u32> = FxHashMap::default();
    let mut pq: BinaryHeap<HeapEntry> = BinaryHeap::new();

    dist.insert(source, 0.0);
    parent.insert(source, source);
    pq.push(HeapEntry {
        dist: 0.0,
        edge: source,
    });

    let mut best_dist = f64::INFINITY;
    let mut found = false;

    while let Some(HeapEntry { dist: d, edge: u }) = pq.pop() {
        if dist.get(&u).map(|&cur| d > cur).unwrap_or(false) {
            continue;
        }

        if u == target {
            best_dist = d;
            found = true;
            break;
        }

        for sc in shortcuts.outgoing(u) {
            let nd = d + sc.cost as f64;
            if nd < dist.get(&sc.to).copied().unwrap_or(f64::INFINITY) {
                dist.insert(sc.to, nd);
                parent.insert(sc.to, u);
                pq.push(HeapEntry {
                    dist: nd,
                    edge: sc.to,
                });
            }
        }
    }

    if !found {
        return Err(EngineError::NoPath);
    }

    let mut path = Vec::new();
    let mut curr = target;
    while curr != source {
        path.push(curr);
        match parent.get(&curr) {
            Some(&prev) => curr = prev,
            None => {
                return Err(EngineError::InternalError(
                    "broken parent chain during reconstruction".into(),
                ))
            }
        }
    }
    path.push(source);
    path.reverse();

    Ok(QueryResult {
        distance: best_dist + edges.cost(target),
        path,
    })
}
