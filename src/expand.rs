//! Path expansion: rewrite a shortcut-level path into base edges.
//!
//! Each consecutive pair `(u, v)` is looked up in the store's pair index and
//! recursively split at the record's `via_edge` until a base transition is
//! reached. The recursion is expressed as an explicit work stack so deep but
//! legal expansions cannot overflow the thread stack.

use rustc_hash::FxHashSet;

use crate::store::{ShortcutStore, VIA_SENTINEL};

/// Expansions deeper than this are cut off and emitted as-is. Legal inputs
/// run to a few hundred levels at most.
const MAX_DEPTH: u32 = 512;

/// Expand a shortcut-level path into the underlying base-edge sequence.
///
/// Pure and deterministic: the same store and input always produce the same
/// output. A visited-pair set guards against malformed cyclic via chains.
pub fn expand_path(store: &ShortcutStore, shortcut_path: &[u32]) -> Vec<u32> {
    if shortcut_path.len() <= 1 {
        return shortcut_path.to_vec();
    }

    let mut result = Vec::with_capacity(shortcut_path.len() * 2);
    let mut visited: FxHashSet<(u32, u32)> = FxHashSet::default();
    let mut stack: Vec<(u32, u32, u32)> = Vec::new();

    for pair in shortcut_path.windows(2) {
        stack.push((pair[0], pair[1], 0));

        while let Some((u, v, depth)) = stack.pop() {
            if depth > MAX_DEPTH {
                result.push(u);
                continue;
            }
            if !visited.insert((u, v)) {
                result.push(u);
                continue;
            }

            let via = match store.find(u, v) {
                Some(record) => record.via_edge(),
                None => {
                    result.push(u);
                    continue;
                }
            };

            if via == u || via == v || via == VIA_SENTINEL {
                result.push(u);
                continue;
            }

            // LIFO: push the second half first so (u, via) expands next
            stack.push((via, v, depth + 1));
            stack.push((u, via, depth + 1));
        }
    }

    result.push(*shortcut_path.last().unwrap());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ShortcutRow, ShortcutStore};

    fn row(from: u32, to: u32, cost: f32, via: u32, inside: i8) -> ShortcutRow {
        ShortcutRow {
            from,
            to,
            cost,
            via_edge: via,
            cell: 0,
            inside,
        }
    }

    /// Two-level via chain: 10→11 summarizes 10→12→13→11.
    fn nested_store() -> ShortcutStore {
        ShortcutStore::from_rows(vec![
            row(10, 11, 6.0, 12, 1),
            row(12, 11, 5.0, 13, 1),
            row(10, 12, 1.0, VIA_SENTINEL, -2),
            row(12, 13, 2.0, VIA_SENTINEL, -2),
            row(13, 11, 3.0, VIA_SENTINEL, -2),
        ])
        .unwrap()
    }

    #[test]
    fn test_trivial_paths() {
        let store = nested_store();
        assert_eq!(expand_path(&store, &[]), Vec::<u32>::new());
        assert_eq!(expand_path(&store, &[10]), vec![10]);
    }

    #[test]
    fn test_nested_expansion() {
        let store = nested_store();
        assert_eq!(expand_path(&store, &[10, 11]), vec![10, 12, 13, 11]);
    }

    #[test]
    fn test_expansion_cost_soundness() {
        // record costs along expanded consecutive pairs sum to the
        // shortcut-level cost
        let store = nested_store();
        let expanded = expand_path(&store, &[10, 11]);
        let total: f64 = expanded
            .windows(2)
            .map(|w| store.find(w[0], w[1]).unwrap().cost as f64)
            .sum();
        assert!((total - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_pair_is_base_transition() {
        let store = nested_store();
        assert_eq!(expand_path(&store, &[10, 99]), vec![10, 99]);
    }

    #[test]
    fn test_via_equal_to_endpoint_is_base() {
        let store = ShortcutStore::from_rows(vec![
            row(1, 2, 1.0, 1, 1),
            row(2, 3, 1.0, 3, 1),
        ])
        .unwrap();
        assert_eq!(expand_path(&store, &[1, 2, 3]), vec![1, 2, 3]);
    }

    #[test]
    fn test_cycle_protection() {
        // 1→2 via 3, 1→3 via 2: expanding (1,2) revisits (1,3) forever
        // without the visited set
        let store = ShortcutStore::from_rows(vec![
            row(1, 2, 1.0, 3, 1),
            row(1, 3, 1.0, 2, 1),
            row(3, 2, 1.0, VIA_SENTINEL, -2),
            row(2, 3, 1.0, VIA_SENTINEL, -2),
        ])
        .unwrap();
        let expanded = expand_path(&store, &[1, 2]);
        assert_eq!(*expanded.last().unwrap(), 2);
        assert!(expanded.len() < 32, "cycle must terminate quickly");
    }

    #[test]
    fn test_determinism() {
        let store = nested_store();
        let a = expand_path(&store, &[10, 11]);
        let b = expand_path(&store, &[10, 11]);
        assert_eq!(a, b);
    }
}
