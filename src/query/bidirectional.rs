//! Bidirectional searches: classic hierarchy-filtered, penalized classic,
//! unfiltered bi-Dijkstra, and the multi-source/multi-target variant.

use std::collections::BinaryHeap;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{EngineError, Result};
use crate::store::{EdgeMetaStore, ShortcutStore, INSIDE_UP, VIA_SENTINEL};

use super::{check_endpoints, reconstruct_bidirectional, HeapEntry, QueryResult};

/// Classic bidirectional search.
///
/// The forward frontier climbs the hierarchy (`inside == +1` only), the
/// backward frontier descends (`inside` -1 or 0), and the backward start is
/// seeded with the target edge's own cost.
pub fn query_classic(
    shortcuts: &ShortcutStore,
    edges: &EdgeMetaStore,
    source: u32,
    target: u32,
) -> Result<QueryResult> {
    if let Some(r) = check_endpoints(edges, source, target)? {
        return Ok(r);
    }

    let mut dist_fwd: FxHashMap<u32, f64> = FxHashMap::default();
    let mut dist_bwd: FxHashMap<u32, f64> = FxHashMap::default();
    let mut parent_fwd: FxHashMap<u32, u32> = FxHashMap::default();
    let mut parent_bwd: FxHashMap<u32, u32> = FxHashMap::default();
    let mut pq_fwd: BinaryHeap<HeapEntry> = BinaryHeap::new();
    let mut pq_bwd: BinaryHeap<HeapEntry> = BinaryHeap::new();

    dist_fwd.insert(source, 0.0);
    parent_fwd.insert(source, source);
    pq_fwd.push(HeapEntry {
        dist: 0.0,
        edge: source,
    });

    let target_cost = edges.cost(target);
    dist_bwd.insert(target, target_cost);
    parent_bwd.insert(target, target);
    pq_bwd.push(HeapEntry {
        dist: target_cost,
        edge: target,
    });

    let mut best = f64::INFINITY;
    let mut meeting = 0u32;
    let mut found = false;

    'search: while !(pq_fwd.is_empty() && pq_bwd.is_empty()) {
        // Forward step
        if let Some(HeapEntry { dist: d, edge: u }) = pq_fwd.pop() {
            if dist_fwd.get(&u).map(|&cur| d > cur).unwrap_or(false) {
                continue 'search;
            }
            if d >= best {
                continue 'search;
            }

            for sc in shortcuts.outgoing(u) {
                if sc.inside() != INSIDE_UP {
                    continue;
                }
                let nd = d + sc.cost as f64;
                if nd < dist_fwd.get(&sc.to).copied().unwrap_or(f64::INFINITY) {
                    dist_fwd.insert(sc.to, nd);
                    parent_fwd.insert(sc.to, u);
                    pq_fwd.push(HeapEntry {
                        dist: nd,
                        edge: sc.to,
                    });

                    if let Some(&bd) = dist_bwd.get(&sc.to) {
                        let total = nd + bd;
                        if total < best {
                            best = total;
                            meeting = sc.to;
                            found = true;
                        }
                    }
                }
            }
        }

        // Backward step
        if let Some(HeapEntry { dist: d, edge: u }) = pq_bwd.pop() {
            if dist_bwd.get(&u).map(|&cur| d > cur).unwrap_or(false) {
                continue 'search;
            }
            if d >= best {
                continue 'search;
            }

            for &idx in shortcuts.incoming(u) {
                let sc = shortcuts.record(idx);
                if sc.inside() != -1 && sc.inside() != 0 {
                    continue;
                }
                let nd = d + sc.cost as f64;
                if nd < dist_bwd.get(&sc.from).copied().unwrap_or(f64::INFINITY) {
                    dist_bwd.insert(sc.from, nd);
                    parent_bwd.insert(sc.from, u);
                    pq_bwd.push(HeapEntry {
                        dist: nd,
                        edge: sc.from,
                    });

                    if let Some(&fd) = dist_fwd.get(&sc.from) {
                        let total = fd + nd;
                        if total < best {
                            best = total;
                            meeting = sc.from;
                            found = true;
                        }
                    }
                }
            }
        }

        // Early termination: neither frontier top can improve the best.
        match (pq_fwd.peek(), pq_bwd.peek()) {
            (Some(f), Some(b)) if f.dist >= best && b.dist >= best => break,
            (None, None) => break,
            _ => {}
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

/// Classic search with a penalty multiplier on a caller-supplied edge set.
///
/// Relaxations through a penalized edge (`to`/`from`, or the record's
/// `via_edge` when set) cost `penalty_factor` times more; endpoints are
/// never penalized. The reported distance is the true cost of the returned
/// path, recomputed by walking the records plus the target edge cost.
pub fn query_classic_alt(
    shortcuts: &ShortcutStore,
    edges: &EdgeMetaStore,
    source: u32,
    target: u32,
    penalized: &[u32],
    penalty_factor: f64,
) -> Result<QueryResult> {
    if let Some(r) = check_endpoints(edges, source, target)? {
        return Ok(r);
    }

    let mut penalty_set: FxHashSet<u32> = penalized.iter().copied().collect();
    penalty_set.remove(&source);
    penalty_set.remove(&target);

    // Forward relaxations penalize the head (`sc.to`), backward ones the
    // tail (`sc.from`); a penalized via edge taints the record either way.
    let penalized_cost = |sc: &crate::store::Shortcut, endpoint: u32| -> f64 {
        let hit = penalty_set.contains(&endpoint)
            || (sc.via_edge() != VIA_SENTINEL && penalty_set.contains(&sc.via_edge()));
        if hit {
            sc.cost as f64 * penalty_factor
        } else {
            sc.cost as f64
        }
    };

    let mut dist_fwd: FxHashMap<u32, f64> = FxHashMap::default();
    let mut dist_bwd: FxHashMap<u32, f64> = FxHashMap::default();
    let mut parent_fwd: FxHashMap<u32, u32> = FxHashMap::default();
    let mut parent_bwd: FxHashMap<u32, u32> = FxHashMap::default();
    let mut pq_fwd: BinaryHeap<HeapEntry> = BinaryHeap::new();
    let mut pq_bwd: BinaryHeap<HeapEntry> = BinaryHeap::new();

    dist_fwd.insert(source, 0.0);
    parent_fwd.insert(source, source);
    pq_fwd.push(HeapEntry {
        dist: 0.0,
        edge: source,
    });

    let target_cost = edges.cost(target);
    dist_bwd.insert(target, target_cost);
    parent_bwd.insert(target, target);
    pq_bwd.push(HeapEntry {
        dist: target_cost,
        edge: target,
    });

    let mut best = f64::INFINITY;
    let mut meeting = 0u32;
    let mut found = false;

    'search: while !(pq_fwd.is_empty() && pq_bwd.is_empty()) {
        if let Some(HeapEntry { dist: d, edge: u }) = pq_fwd.pop() {
            if dist_fwd.get(&u).map(|&cur| d > cur).unwrap_or(false) {
                continue 'search;
            }
            if d >= best {
                continue 'search;
            }

            for sc in shortcuts.outgoing(u) {
                if sc.inside() != INSIDE_UP {
                    continue;
                }
                let nd = d + penalized_cost(sc, sc.to);
                if nd < dist_fwd.get(&sc.to).copied().unwrap_or(f64::INFINITY) {
                    dist_fwd.insert(sc.to, nd);
                    parent_fwd.insert(sc.to, u);
                    pq_fwd.push(HeapEntry {
                        dist: nd,
                        edge: sc.to,
                    });

                    if let Some(&bd) = dist_bwd.get(&sc.to) {
                        if nd + bd < best {
                            best = nd + bd;
                            meeting = sc.to;
                            found = true;
                        }
                    }
                }
            }
        }

        if let Some(HeapEntry { dist: d, edge: u }) = pq_bwd.pop() {
            if dist_bwd.get(&u).map(|&cur| d > cur).unwrap_or(false) {
                continue 'search;
            }
            if d >= best {
                continue 'search;
            }

            for &idx in shortcuts.incoming(u) {
                let sc = shortcuts.record(idx);
                if sc.inside() != -1 && sc.inside() != 0 {
                    continue;
                }
                let nd = d + penalized_cost(sc, sc.from);
                if nd < dist_bwd.get(&sc.from).copied().unwrap_or(f64::INFINITY) {
                    dist_bwd.insert(sc.from, nd);
                    parent_bwd.insert(sc.from, u);
                    pq_bwd.push(HeapEntry {
                        dist: nd,
                        edge: sc.from,
                    });

                    if let Some(&fd) = dist_fwd.get(&sc.from) {
                        if fd + nd < best {
                            best = fd + nd;
                            meeting = sc.from;
                            found = true;
                        }
                    }
                }
            }
        }

        match (pq_fwd.peek(), pq_bwd.peek()) {
            (Some(f), Some(b)) if f.dist >= best && b.dist >= best => break,
            (None, None) => break,
            _ => {}
        }
    }

    if !found {
        return Err(EngineError::NoPath);
    }

    let path = reconstruct_bidirectional(&parent_fwd, &parent_bwd, meeting);

    // Un-penalized cost of the path actually returned: walk the records and
    // add the target edge's own cost, matching the classic convention.
    let mut true_total = edges.cost(*path.last().unwrap());
    for pair in path.windows(2) {
        match shortcuts.find(pair[0], pair[1]) {
            Some(sc) => true_total += sc.cost as f64,
            None => {
                return Err(EngineError::InternalError(format!(
                    "no record for path segment {} -> {}",
                    pair[0], pair[1]
                )))
            }
        }
    }

    Ok(QueryResult {
        distance: true_total,
        path,
    })
}

/// Plain bidirectional Dijkstra without hierarchy filtering; alternates by
/// the smaller frontier top. Reference algorithm for cross-checking.
pub fn query_bidijkstra(
    shortcuts: &ShortcutStore,
    edges: &EdgeMetaStore,
    source: u32,
    target: u32,
) -> Result<QueryResult> {
    if let Some(r) = check_endpoints(edges, source, target)? {
        return Ok(r);
    }

    let mut dist_fwd: FxHashMap<u32, f64> = FxHashMap::default();
    let mut dist_bwd: FxHashMap<u32, f64> = FxHashMap::default();
    let mut parent_fwd: FxHashMap<u32, u32> = FxHashMap::default();
    let mut parent_bwd: FxHashMap<u32, u32> = FxHashMap::default();
    let mut pq_fwd: BinaryHeap<HeapEntry> = BinaryHeap::new();
    let mut pq_bwd: BinaryHeap<HeapEntry> = BinaryHeap::new();

    dist_fwd.insert(source, 0.0);
    parent_fwd.insert(source, source);
    pq_fwd.push(HeapEntry {
        dist: 0.0,
        edge: source,
    });

    let target_cost = edges.cost(target);
    dist_bwd.insert(target, target_cost);
    parent_bwd.insert(target, target);
    pq_bwd.push(HeapEntry {
        dist: target_cost,
        edge: target,
    });

    let mut best = f64::INFINITY;
    let mut meeting = 0u32;
    let mut found = false;

    while let (Some(top_f), Some(top_b)) = (pq_fwd.peek().copied(), pq_bwd.peek().copied()) {
        if top_f.dist + top_b.dist >= best {
            break;
        }

        if top_f.dist <= top_b.dist {
            let HeapEntry { dist: d, edge: u } = pq_fwd.pop().unwrap();
            if d > dist_fwd.get(&u).copied().unwrap_or(f64::INFINITY) {
                continue;
            }

            for sc in shortcuts.outgoing(u) {
                let nd = d + sc.cost as f64;
                if nd < dist_fwd.get(&sc.to).copied().unwrap_or(f64::INFINITY) {
                    dist_fwd.insert(sc.to, nd);
                    parent_fwd.insert(sc.to, u);
                    pq_fwd.push(HeapEntry {
                        dist: nd,
                        edge: sc.to,
                    });

                    if let Some(&bd) = dist_bwd.get(&sc.to) {
                        if nd + bd < best {
                            best = nd + bd;
                            meeting = sc.to;
                            found = true;
                        }
                    }
                }
            }
        } else {
            let HeapEntry { dist: d, edge: u } = pq_bwd.pop().unwrap();
            if d > dist_bwd.get(&u).copied().unwrap_or(f64::INFINITY) {
                continue;
            }

            for &idx in shortcuts.incoming(u) {
                let sc = shortcuts.record(idx);
                let nd = d + sc.cost as f64;
                if nd < dist_bwd.get(&sc.from).copied().unwrap_or(f64::INFINITY) {
                    dist_bwd.insert(sc.from, nd);
                    parent_bwd.insert(sc.from, u);
                    pq_bwd.push(HeapEntry {
                        dist: nd,
                        edge: sc.from,
                    });

                    if let Some(&fd) = dist_fwd.get(&sc.from) {
                        if fd + nd < best {
                            best = fd + nd;
                            meeting = sc.from;
                            found = true;
                        }
                    }
                }
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

/// Multi-source / multi-target search with classic frontier filtering.
///
/// Every source seeds the forward heap at distance 0, every target seeds
/// the backward heap at its own cost; the single best pair wins. Unknown
/// endpoint IDs are silently dropped; if either side ends up empty the
/// search reports `NoPath`.
pub fn query_multi(
    shortcuts: &ShortcutStore,
    edges: &EdgeMetaStore,
    sources: &[u32],
    targets: &[u32],
) -> Result<QueryResult> {
    let mut dist_fwd: FxHashMap<u32, f64> = FxHashMap::default();
    let mut dist_bwd: FxHashMap<u32, f64> = FxHashMap::default();
    let mut parent_fwd: FxHashMap<u32, u32> = FxHashMap::default();
    let mut parent_bwd: FxHashMap<u32, u32> = FxHashMap::default();
    let mut pq_fwd: BinaryHeap<HeapEntry> = BinaryHeap::new();
    let mut pq_bwd: BinaryHeap<HeapEntry> = BinaryHeap::new();

    for &src in sources {
        if edges.contains(src) {
            dist_fwd.insert(src, 0.0);
            parent_fwd.insert(src, src);
            pq_fwd.push(HeapEntry {
                dist: 0.0,
                edge: src,
            });
        }
    }
    for &tgt in targets {
        if edges.contains(tgt) {
            let target_cost = edges.cost(tgt);
            dist_bwd.insert(tgt, target_cost);
            parent_bwd.insert(tgt, tgt);
            pq_bwd.push(HeapEntry {
                dist: target_cost,
                edge: tgt,
            });
        }
    }

    let mut best = f64::INFINITY;
    let mut meeting = 0u32;
    let mut found = false;

    // a source that is also a target is already a complete route
    for &src in sources {
        if let Some(&bd) = dist_bwd.get(&src) {
            if dist_fwd.contains_key(&src) && bd < best {
                best = bd;
                meeting = src;
                found = true;
            }
        }
    }

    'search: while !(pq_fwd.is_empty() && pq_bwd.is_empty()) {
        if let Some(HeapEntry { dist: d, edge: u }) = pq_fwd.pop() {
            if dist_fwd.get(&u).map(|&cur| d > cur).unwrap_or(false) {
                continue 'search;
            }
            if d >= best {
                continue 'search;
            }

            for sc in shortcuts.outgoing(u) {
                if sc.inside() != INSIDE_UP {
                    continue;
                }
                let nd = d + sc.cost as f64;
                if nd < dist_fwd.get(&sc.to).copied().unwrap_or(f64::INFINITY) {
                    dist_fwd.insert(sc.to, nd);
                    parent_fwd.insert(sc.to, u);
                    pq_fwd.push(HeapEntry {
                        dist: nd,
                        edge: sc.to,
                    });

                    if let Some(&bd) = dist_bwd.get(&sc.to) {
                        if nd + bd < best {
                            best = nd + bd;
                            meeting = sc.to;
                            found = true;
                        }
                    }
                }
            }
        }

        if let Some(HeapEntry { dist: d, edge: u }) = pq_bwd.pop() {
            if dist_bwd.get(&u).map(|&cur| d > cur).unwrap_or(false) {
                continue 'search;
            }
            if d >= best {
                continue 'search;
            }

            for &idx in shortcuts.incoming(u) {
                let sc = shortcuts.record(idx);
                if sc.inside() != -1 && sc.inside() != 0 {
                    continue;
                }
                let nd = d + sc.cost as f64;
                if nd < dist_bwd.get(&sc.from).copied().unwrap_or(f64::INFINITY) {
                    dist_bwd.insert(sc.from, nd);
                    parent_bwd.insert(sc.from, u);
                    pq_bwd.push(HeapEntry {
                        dist: nd,
                        edge: sc.from,
                    });

                    if let Some(&fd) = dist_fwd.get(&sc.from) {
                        if fd + nd < best {
                            best = fd + nd;
                            meeting = sc.from;
                            found = true;
                        }
                    }
                }
            }
        }

        match (pq_fwd.peek(), pq_bwd.peek()) {
            (Some(f), Some(b)) if f.dist >= best && b.dist >= best => break,
            (None, None) => break,
            _ => {}
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
