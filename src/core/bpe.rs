//! Low-level byte-pair merge algorithm.
//!
//! A piece starts as one segment per byte. Each step merges the adjacent
//! segment pair whose concatenation has the lowest rank in the vocabulary,
//! breaking ties towards the leftmost pair, until no adjacent pair forms a
//! known token. The surviving segments are the output tokens.
//!
//! Segments live in a flat-array doubly-linked list (`prev`/`next` indices)
//! so a merge unlinks its right segment in O(1). Each node caches the rank
//! of merging it with its successor; a merge only invalidates the cached
//! rank of the merged node and its left neighbour. Short pieces find the
//! minimum by walking the list; long pieces use a lazy binary heap, which
//! keeps pathological inputs (thousands of identical bytes) at O(m log n)
//! instead of O(n·m).

use rustc_hash::FxHashMap;

/// Token rank. The id doubles as the merge priority: lower ranks merge first.
pub type Rank = u32;

const NONE: u32 = u32::MAX;

/// Pieces at or below this length use the linear-scan merge loop.
const LINEAR_SCAN_MAX: usize = 32;

/// A live segment `piece[start..end]`, where `end` is the start of the next
/// segment (or the piece length for the tail segment).
struct Seg {
    start: u32,
    /// Rank of merging this segment with its successor; `Rank::MAX` when the
    /// concatenation is not in the vocabulary or there is no successor.
    rank: Rank,
    prev: u32,
    next: u32,
}

#[inline]
fn seg_end(segs: &[Seg], i: usize, piece_len: usize) -> usize {
    let next = segs[i].next;
    if next == NONE {
        piece_len
    } else {
        segs[next as usize].start as usize
    }
}

/// Rank of merging segment `i` with its successor.
#[inline]
fn candidate_rank(piece: &[u8], ranks: &FxHashMap<Vec<u8>, Rank>, segs: &[Seg], i: usize) -> Rank {
    let j = segs[i].next;
    if j == NONE {
        return Rank::MAX;
    }
    let start = segs[i].start as usize;
    let end = seg_end(segs, j as usize, piece.len());
    ranks.get(&piece[start..end]).copied().unwrap_or(Rank::MAX)
}

fn build_segs(piece: &[u8], ranks: &FxHashMap<Vec<u8>, Rank>) -> Vec<Seg> {
    let n = piece.len();
    let mut segs: Vec<Seg> = (0..n)
        .map(|i| Seg {
            start: i as u32,
            rank: Rank::MAX,
            prev: if i > 0 { (i - 1) as u32 } else { NONE },
            next: if i + 1 < n { (i + 1) as u32 } else { NONE },
        })
        .collect();
    for i in 0..n - 1 {
        segs[i].rank = ranks.get(&piece[i..i + 2]).copied().unwrap_or(Rank::MAX);
    }
    segs
}

/// Merge segment `i` with its successor and refresh the two affected caches.
#[inline]
fn merge_at(piece: &[u8], ranks: &FxHashMap<Vec<u8>, Rank>, segs: &mut [Seg], i: usize) {
    let j = segs[i].next as usize;
    let j_next = segs[j].next;
    segs[i].next = j_next;
    if j_next != NONE {
        segs[j_next as usize].prev = i as u32;
    }
    // The unlinked node keeps MAX so stale heap entries are skipped.
    segs[j].rank = Rank::MAX;

    segs[i].rank = candidate_rank(piece, ranks, segs, i);
    let prev = segs[i].prev;
    if prev != NONE {
        segs[prev as usize].rank = candidate_rank(piece, ranks, segs, prev as usize);
    }
}

/// Walk the live list into `(start, end)` byte spans.
fn collect_spans(segs: &[Seg], piece_len: usize) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut cur = 0u32;
    while cur != NONE {
        let i = cur as usize;
        spans.push((segs[i].start as usize, seg_end(segs, i, piece_len)));
        cur = segs[i].next;
    }
    spans
}

fn merge_linear(piece: &[u8], ranks: &FxHashMap<Vec<u8>, Rank>) -> Vec<(usize, usize)> {
    let mut segs = build_segs(piece, ranks);

    let mut min_rank: (Rank, u32) = (Rank::MAX, NONE);
    for (i, seg) in segs.iter().enumerate() {
        if seg.rank < min_rank.0 {
            min_rank = (seg.rank, i as u32);
        }
    }

    while min_rank.0 != Rank::MAX {
        merge_at(piece, ranks, &mut segs, min_rank.1 as usize);

        // Rescan the live list. Strict comparison keeps the leftmost of
        // equal-rank candidates, which is observable in the output.
        min_rank = (Rank::MAX, NONE);
        let mut cur = 0u32;
        while cur != NONE {
            let seg = &segs[cur as usize];
            if seg.rank < min_rank.0 {
                min_rank = (seg.rank, cur);
            }
            cur = seg.next;
        }
    }

    collect_spans(&segs, piece.len())
}

fn merge_heap(piece: &[u8], ranks: &FxHashMap<Vec<u8>, Rank>) -> Vec<(usize, usize)> {
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    let mut segs = build_segs(piece, ranks);

    let mut heap: BinaryHeap<Reverse<(Rank, u32)>> = BinaryHeap::with_capacity(segs.len());
    for (i, seg) in segs.iter().enumerate() {
        if seg.rank != Rank::MAX {
            heap.push(Reverse((seg.rank, i as u32)));
        }
    }

    // Lazy deletion: every cache refresh pushes a fresh entry, so an entry is
    // current iff its rank still matches the node. Node indices never
    // reorder, so popping `(rank, index)` pairs preserves the leftmost
    // tie-break.
    while let Some(Reverse((rank, idx))) = heap.pop() {
        let i = idx as usize;
        if segs[i].rank != rank {
            continue;
        }

        merge_at(piece, ranks, &mut segs, i);

        if segs[i].rank != Rank::MAX {
            heap.push(Reverse((segs[i].rank, idx)));
        }
        let prev = segs[i].prev;
        if prev != NONE && segs[prev as usize].rank != Rank::MAX {
            heap.push(Reverse((segs[prev as usize].rank, prev)));
        }
    }

    collect_spans(&segs, piece.len())
}

fn byte_pair_merge(piece: &[u8], ranks: &FxHashMap<Vec<u8>, Rank>) -> Vec<(usize, usize)> {
    if piece.len() <= LINEAR_SCAN_MAX {
        merge_linear(piece, ranks)
    } else {
        merge_heap(piece, ranks)
    }
}

/// Run byte-pair merging on `piece` and return the ranks of the surviving
/// segments, in order.
///
/// Every surviving segment is a vocabulary key: merging only ever stops at
/// spans that are keys, and the 256 single-byte keys guarantee a floor. A
/// vocabulary missing a single-byte key violates that contract and panics.
pub fn byte_pair_encode(piece: &[u8], ranks: &FxHashMap<Vec<u8>, Rank>) -> Vec<Rank> {
    if piece.is_empty() {
        return Vec::new();
    }
    if piece.len() == 1 {
        return match ranks.get(piece) {
            Some(&rank) => vec![rank],
            None => panic!("unknown single byte in vocabulary: {:?}", piece),
        };
    }
    byte_pair_merge(piece, ranks)
        .into_iter()
        .map(|(start, end)| {
            ranks
                .get(&piece[start..end])
                .copied()
                .unwrap_or_else(|| panic!("merged span missing from vocabulary: {:?}", &piece[start..end]))
        })
        .collect()
}

/// Like [`byte_pair_encode`] but returns the byte spans instead of their
/// ranks. Only used by tests to inspect segmentation.
pub fn byte_pair_split<'a>(piece: &'a [u8], ranks: &FxHashMap<Vec<u8>, Rank>) -> Vec<&'a [u8]> {
    if piece.is_empty() {
        return Vec::new();
    }
    if piece.len() == 1 {
        return vec![piece];
    }
    byte_pair_merge(piece, ranks)
        .into_iter()
        .map(|(start, end)| &piece[start..end])
        .collect()
}
