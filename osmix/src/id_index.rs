//! Block-anchored sorted id index, supporting O(log n) OSM id -> local index
//! lookup.

/// Block size `B`: every `B`th sorted id is held in a separate anchors array
/// so the outer search only scans `ceil(n / B)` anchors before the inner
/// binary search is restricted to a single block.
pub const BLOCK_SIZE: usize = 256;

/// Sorted, binary-searchable index from OSM id to local (insertion) index.
///
/// Built once, at `finish()`, from the id column accumulated during ingest.
/// If ids arrived already sorted the sorted view aliases the original
/// column and no permutation is stored; otherwise a stable sort produces
/// `sorted_ids` plus `sorted_pos_to_index`, the permutation back to
/// insertion order.
#[derive(Debug, Clone)]
pub struct IdIndex {
    sorted_ids: Vec<i64>,
    /// `None` when ids were already sorted on insert (sorted position ==
    /// local index); `Some(perm)` otherwise.
    sorted_pos_to_index: Option<Vec<u32>>,
    anchors: Vec<i64>,
}

impl IdIndex {
    /// Builds the index from `ids` in insertion order. `ids_are_sorted`
    /// should be the flag the caller maintained while appending (true iff
    /// every id was >= the previous one).
    pub fn build(ids: &[i64], ids_are_sorted: bool) -> Self {
        let (sorted_ids, sorted_pos_to_index) = if ids_are_sorted {
            (ids.to_vec(), None)
        } else {
            let mut order: Vec<u32> = (0..ids.len() as u32).collect();
            // stable sort: ties (duplicate ids) keep insertion order, which
            // matters if a caller later wants "first matching index".
            order.sort_by_key(|&i| ids[i as usize]);
            let sorted_ids = order.iter().map(|&i| ids[i as usize]).collect();
            (sorted_ids, Some(order))
        };

        let anchors = sorted_ids
            .iter()
            .step_by(BLOCK_SIZE)
            .copied()
            .collect::<Vec<_>>();

        IdIndex {
            sorted_ids,
            sorted_pos_to_index,
            anchors,
        }
    }

    pub fn len(&self) -> usize {
        self.sorted_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_ids.is_empty()
    }

    /// Returns the local index for `id`, or `None` if absent.
    pub fn index_of(&self, id: i64) -> Option<usize> {
        if self.sorted_ids.is_empty() {
            return None;
        }
        // outer: largest anchor <= id
        let block = match self.anchors.binary_search(&id) {
            Ok(j) => j,
            Err(0) => return None, // id is smaller than every anchor
            Err(j) => j - 1,
        };
        let lo = block * BLOCK_SIZE;
        let hi = std::cmp::min(lo + BLOCK_SIZE, self.sorted_ids.len());
        match self.sorted_ids[lo..hi].binary_search(&id) {
            Ok(rel) => {
                let pos = lo + rel;
                Some(match &self.sorted_pos_to_index {
                    Some(perm) => perm[pos] as usize,
                    None => pos,
                })
            }
            Err(_) => None,
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.index_of(id).is_some()
    }
}
