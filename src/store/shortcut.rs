//! Packed shortcut records and the CSR adjacency store.
//!
//! Memory layout for the forward adjacency:
//!   `fwd_offsets[u] .. fwd_offsets[u + 1]` is the range of shortcuts from
//!   edge `u` inside the contiguous `shortcuts` array.
//!
//! For the backward adjacency:
//!   `bwd_offsets[v] .. bwd_offsets[v + 1]` is a range of `bwd_indices`
//!   entries, each an index into `shortcuts` for a record ending at `v`.

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::error::{EngineError, Result};

/// `via_edge` value that marks a base transition instead of a real edge ID.
pub const VIA_SENTINEL: u32 = 0;

/// Widest edge ID encodable in the 30-bit `via_edge` field.
pub const MAX_ENCODABLE_EDGE: u32 = (1 << 30) - 1;

pub const INSIDE_UP: i8 = 1;
pub const INSIDE_LATERAL: i8 = 0;
pub const INSIDE_DOWN: i8 = -1;
pub const INSIDE_BASE: i8 = -2;

const VIA_MASK: u32 = MAX_ENCODABLE_EDGE;

/// A single shortcut record.
///
/// The 24-byte layout is load-bearing: datasets carry hundreds of millions
/// of these. `via_edge` (30 bits) and `inside` (2 bits, signed) share the
/// trailing word.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Shortcut {
    pub cell: u64,
    pub cost: f32,
    pub from: u32,
    pub to: u32,
    via_inside: u32,
}

const _: () = assert!(std::mem::size_of::<Shortcut>() == 24);
const _: () = assert!(std::mem::align_of::<Shortcut>() == 8);

impl Shortcut {
    pub fn new(from: u32, to: u32, cost: f32, via_edge: u32, cell: u64, inside: i8) -> Self {
        debug_assert!(via_edge <= VIA_MASK);
        debug_assert!((-2..=1).contains(&inside));
        Shortcut {
            cell,
            cost,
            from,
            to,
            via_inside: (via_edge & VIA_MASK) | (((inside as u32) & 0b11) << 30),
        }
    }

    /// Intermediate edge used by path expansion; [`VIA_SENTINEL`] means the
    /// record is a base transition.
    #[inline]
    pub fn via_edge(&self) -> u32 {
        self.via_inside & VIA_MASK
    }

    /// Hierarchy direction tag: +1 up, 0 lateral, -1 down, -2 base edge.
    #[inline]
    pub fn inside(&self) -> i8 {
        // arithmetic shift sign-extends the 2-bit field
        ((self.via_inside as i32) >> 30) as i8
    }

    /// Resolution of the record's cell, or -1 when the cell is unset.
    #[inline]
    pub fn res(&self) -> i8 {
        if self.cell == 0 {
            -1
        } else {
            ((self.cell >> 52) & 0xF) as i8
        }
    }
}

/// One decoded input row, before CSR construction.
#[derive(Debug, Clone, Copy)]
pub struct ShortcutRow {
    pub from: u32,
    pub to: u32,
    pub cost: f32,
    pub via_edge: u32,
    pub cell: u64,
    pub inside: i8,
}

/// CSR shortcut store, immutable after construction.
#[derive(Debug)]
pub struct ShortcutStore {
    shortcuts: Vec<Shortcut>,
    fwd_offsets: Vec<u32>,
    bwd_offsets: Vec<u32>,
    bwd_indices: Vec<u32>,
    max_edge_id: u32,
    /// `(from, to)` to index of the first record for that pair, used by
    /// path expansion. Duplicates keep the first-seen record.
    pair_index: FxHashMap<(u32, u32), u32>,
}

impl ShortcutStore {
    /// Build the CSR layout from decoded rows.
    ///
    /// Rows are sorted stably by source edge, offsets come from a counting
    /// pass, and the backward index is filled with a per-target cursor.
    pub fn from_rows(mut rows: Vec<ShortcutRow>) -> Result<Self> {
        if rows.is_empty() {
            return Err(EngineError::EmptyDataset);
        }

        let mut max_edge_id: u32 = 0;
        for row in &rows {
            if row.from > MAX_ENCODABLE_EDGE || row.to > MAX_ENCODABLE_EDGE {
                return Err(EngineError::InvalidArg(format!(
                    "edge id {} exceeds the encodable limit {}",
                    row.from.max(row.to),
                    MAX_ENCODABLE_EDGE
                )));
            }
            max_edge_id = max_edge_id.max(row.from).max(row.to);
        }

        rows.par_sort_by_key(|r| r.from);

        let n = max_edge_id as usize + 1;

        // Forward offsets by exclusive prefix sum over out-degrees.
        let mut counts = vec![0u32; n];
        for row in &rows {
            counts[row.from as usize] += 1;
        }
        let mut fwd_offsets = vec![0u32; n + 1];
        let mut offset = 0u32;
        for (i, &c) in counts.iter().enumerate() {
            fwd_offsets[i] = offset;
            offset += c;
        }
        fwd_offsets[n] = offset;

        let shortcuts: Vec<Shortcut> = rows
            .iter()
            .map(|r| Shortcut::new(r.from, r.to, r.cost, r.via_edge, r.cell, r.inside))
            .collect();
        drop(rows);

        // Backward offsets by in-degree, then fill indices with a running
        // cursor per target.
        counts.iter_mut().for_each(|c| *c = 0);
        for sc in &shortcuts {
            counts[sc.to as usize] += 1;
        }
        let mut bwd_offsets = vec![0u32; n + 1];
        offset = 0;
        for (i, &c) in counts.iter().enumerate() {
            bwd_offsets[i] = offset;
            offset += c;
        }
        bwd_offsets[n] = offset;

        let mut cursor: Vec<u32> = bwd_offsets[..n].to_vec();
        let mut bwd_indices = vec![0u32; shortcuts.len()];
        for (i, sc) in shortcuts.iter().enumerate() {
            let t = sc.to as usize;
            bwd_indices[cursor[t] as usize] = i as u32;
            cursor[t] += 1;
        }

        let mut pair_index =
            FxHashMap::with_capacity_and_hasher(shortcuts.len(), Default::default());
        for (i, sc) in shortcuts.iter().enumerate() {
            pair_index.entry((sc.from, sc.to)).or_insert(i as u32);
        }

        Ok(ShortcutStore {
            shortcuts,
            fwd_offsets,
            bwd_offsets,
            bwd_indices,
            max_edge_id,
            pair_index,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shortcuts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shortcuts.is_empty()
    }

    #[inline]
    pub fn max_edge_id(&self) -> u32 {
        self.max_edge_id
    }

    #[inline]
    pub fn records(&self) -> &[Shortcut] {
        &self.shortcuts
    }

    #[inline]
    pub fn record(&self, index: u32) -> &Shortcut {
        &self.shortcuts[index as usize]
    }

    #[inline]
    fn is_valid_edge(&self, edge: u32) -> bool {
        edge <= self.max_edge_id
    }

    /// Outgoing shortcuts of `edge`; empty for out-of-range IDs.
    #[inline]
    pub fn outgoing(&self, edge: u32) -> &[Shortcut] {
        if !self.is_valid_edge(edge) {
            return &[];
        }
        let start = self.fwd_offsets[edge as usize] as usize;
        let end = self.fwd_offsets[edge as usize + 1] as usize;
        &self.shortcuts[start..end]
    }

    /// Indices (into [`records`](Self::records)) of shortcuts ending at
    /// `edge`; empty for out-of-range IDs.
    #[inline]
    pub fn incoming(&self, edge: u32) -> &[u32] {
        if !self.is_valid_edge(edge) {
            return &[];
        }
        let start = self.bwd_offsets[edge as usize] as usize;
        let end = self.bwd_offsets[edge as usize + 1] as usize;
        &self.bwd_indices[start..end]
    }

    /// Representative record for a `(from, to)` pair, if any.
    #[inline]
    pub fn find(&self, from: u32, to: u32) -> Option<&Shortcut> {
        self.pair_index
            .get(&(from, to))
            .map(|&i| &self.shortcuts[i as usize])
    }

    pub fn fwd_offsets(&self) -> &[u32] {
        &self.fwd_offsets
    }

    pub fn bwd_offsets(&self) -> &[u32] {
        &self.bwd_offsets
    }

    /// Approximate resident size in bytes.
    pub fn memory_usage(&self) -> usize {
        self.shortcuts.capacity() * std::mem::size_of::<Shortcut>()
            + self.fwd_offsets.capacity() * 4
            + self.bwd_offsets.capacity() * 4
            + self.bwd_indices.capacity() * 4
            + self.pair_index.len() * (8 + 4 + 8)
    }
}
