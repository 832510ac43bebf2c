//! Composition of a reordered subset with the rest of the collection.
//!
//! # Invariants
//! - Output is always a permutation of `live_order`.
//! - Subset ids come first, in their reordered sequence; every other live id
//!   follows in its current relative order.

use crate::model::book::BookId;
use std::collections::HashSet;

/// Builds the full collection order from a reordered subset.
///
/// Subset ids no longer present in `live_order` are dropped. Live ids absent
/// from the subset (hidden by a filter, or added while the drag was active)
/// are appended after it.
pub fn compose_partitioned_order(reordered_subset: &[BookId], live_order: &[BookId]) -> Vec<BookId> {
    let live: HashSet<BookId> = live_order.iter().copied().collect();
    let mut placed = HashSet::with_capacity(reordered_subset.len());
    let mut composed = Vec::with_capacity(live_order.len());

    for id in reordered_subset {
        if live.contains(id) && placed.insert(*id) {
            composed.push(*id);
        }
    }
    composed.extend(live_order.iter().filter(|id| !placed.contains(*id)).copied());
    composed
}

#[cfg(test)]
mod tests {
    use super::compose_partitioned_order;
    use uuid::Uuid;

    fn ids(count: usize) -> Vec<Uuid> {
        (0..count).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn full_subset_is_returned_as_is() {
        let live = ids(3);
        let reordered = vec![live[2], live[0], live[1]];
        assert_eq!(compose_partitioned_order(&reordered, &live), reordered);
    }

    #[test]
    fn filtered_subset_goes_first_then_rest_in_live_order() {
        let live = ids(5);
        let reordered = vec![live[3], live[1]];
        assert_eq!(
            compose_partitioned_order(&reordered, &live),
            vec![live[3], live[1], live[0], live[2], live[4]]
        );
    }

    #[test]
    fn removed_ids_are_dropped_and_new_ids_appended() {
        let live = ids(3);
        let gone = Uuid::new_v4();
        let reordered = vec![live[1], gone, live[0]];
        assert_eq!(
            compose_partitioned_order(&reordered, &live),
            vec![live[1], live[0], live[2]]
        );
    }
}
