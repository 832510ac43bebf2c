//! Drop-index geometry over measured item positions.
//!
//! # Responsibility
//! - Abstract on-screen measurement behind `PositionsProvider`.
//! - Map a pointer position to an insertion index.
//!
//! # Invariants
//! - All coordinates share one vertical axis growing downwards.
//! - Drop-index computation is pure and rendering-free.

use crate::model::book::BookId;

/// Measured vertical extent of one visible item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemBounds {
    pub id: BookId,
    pub top: f64,
    pub bottom: f64,
}

impl ItemBounds {
    pub fn new(id: BookId, top: f64, bottom: f64) -> Self {
        Self { id, top, bottom }
    }

    pub fn midpoint(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }
}

/// Supplies current positions of visible items.
pub trait PositionsProvider {
    /// Returns bounds for the items currently laid out, in any order.
    fn visible_positions(&self) -> Vec<ItemBounds>;
}

/// Returns the index in `siblings` to insert before.
///
/// Picks the first sibling whose midpoint lies below `pointer_y`; when none
/// does, returns `siblings.len()` (end of list). `siblings` must be sorted by
/// `top` and must not contain the dragged item.
pub fn compute_drop_index(siblings: &[ItemBounds], pointer_y: f64) -> usize {
    siblings
        .iter()
        .position(|sibling| sibling.midpoint() > pointer_y)
        .unwrap_or(siblings.len())
}

/// Maps a pointer position to an insertion index into `rest`, the working
/// draft with the dragged id already taken out.
///
/// Bounds for ids outside `rest` are ignored.
pub fn draft_insertion_index(rest: &[BookId], measured: &[ItemBounds], pointer_y: f64) -> usize {
    let mut siblings: Vec<ItemBounds> = measured
        .iter()
        .filter(|bounds| rest.contains(&bounds.id))
        .copied()
        .collect();
    siblings.sort_by(|left, right| left.top.total_cmp(&right.top));

    let index = compute_drop_index(&siblings, pointer_y);
    siblings
        .get(index)
        .and_then(|sibling| rest.iter().position(|id| *id == sibling.id))
        .unwrap_or(rest.len())
}

#[cfg(test)]
mod tests {
    use super::{compute_drop_index, draft_insertion_index, ItemBounds};
    use uuid::Uuid;

    fn stacked(ids: &[Uuid], height: f64) -> Vec<ItemBounds> {
        ids.iter()
            .enumerate()
            .map(|(index, id)| {
                let top = index as f64 * height;
                ItemBounds::new(*id, top, top + height)
            })
            .collect()
    }

    #[test]
    fn pointer_past_second_midpoint_inserts_before_third() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let siblings = stacked(&ids, 40.0);
        assert_eq!(compute_drop_index(&siblings, 85.0), 2);
    }

    #[test]
    fn pointer_above_everything_inserts_first() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        assert_eq!(compute_drop_index(&stacked(&ids, 40.0), -10.0), 0);
    }

    #[test]
    fn pointer_below_every_midpoint_targets_end() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        assert_eq!(compute_drop_index(&stacked(&ids, 40.0), 101.0), 3);
        assert_eq!(compute_drop_index(&[], 10.0), 0);
    }

    #[test]
    fn pointer_exactly_on_midpoint_goes_after_that_sibling() {
        let ids: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
        assert_eq!(compute_drop_index(&stacked(&ids, 40.0), 20.0), 1);
    }

    #[test]
    fn draft_index_ignores_unknown_ids_and_unsorted_input() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let stranger = Uuid::new_v4();
        let mut measured = stacked(&ids, 40.0);
        measured.reverse();
        measured.push(ItemBounds::new(stranger, 0.0, 200.0));

        assert_eq!(draft_insertion_index(&ids, &measured, 45.0), 1);
        assert_eq!(draft_insertion_index(&ids, &measured, 500.0), 3);
    }

    #[test]
    fn draft_index_maps_through_partially_visible_lists() {
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        // Only the last two items are on screen.
        let measured = vec![
            ItemBounds::new(ids[3], 0.0, 40.0),
            ItemBounds::new(ids[4], 40.0, 80.0),
        ];
        assert_eq!(draft_insertion_index(&ids, &measured, 50.0), 4);
    }
}
