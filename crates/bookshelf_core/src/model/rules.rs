//! Derived-field rules applied on every book mutation.
//!
//! # Responsibility
//! - Turn a proposed record into the final record the store keeps.
//! - Keep status transitions and progress aggregates consistent for all callers.
//!
//! # Invariants
//! - Rules are pure: no clock reads, no I/O.
//! - Identity fields (`id`, `created_at`, `custom_order`) always come from the
//!   previous record.

use crate::model::book::{Book, ReadingStatus};

const MIN_RATING: u8 = 1;
const MAX_RATING: u8 = 5;

/// Computes the final record for a proposed change of `old`.
///
/// Timestamps stamped by transitions use `proposed.updated_at`.
pub fn apply_domain_rules(old: &Book, proposed: Book) -> Book {
    let mut next = proposed;
    next.id = old.id;
    next.created_at = old.created_at;
    next.custom_order = old.custom_order;

    if next.status != old.status {
        match next.status {
            ReadingStatus::NotStarted => clear_progress(&mut next),
            ReadingStatus::Reading => {
                if old.status == ReadingStatus::NotStarted && next.started_at.is_none() {
                    next.started_at = Some(next.updated_at);
                }
                if old.status == ReadingStatus::Finished {
                    next.finished_at = None;
                }
            }
            ReadingStatus::Finished => {
                if let Some(total) = next.total_pages {
                    next.current_page = total;
                }
                if next.started_at.is_none() {
                    next.started_at = Some(next.updated_at);
                }
                if next.finished_at.is_none() {
                    next.finished_at = Some(next.updated_at);
                }
            }
            ReadingStatus::Abandoned => {}
        }
    }

    clamp_fields(&mut next);
    next
}

/// Computes the record the store keeps for a brand-new `book`.
///
/// The incoming status is treated as a transition out of `NotStarted`, so a
/// book added as `Finished` gets the same stamps as one finished later. A book
/// added as `NotStarted` carries no progress.
pub fn normalize_new_book(book: Book) -> Book {
    if book.status == ReadingStatus::NotStarted {
        let mut next = book;
        clear_progress(&mut next);
        clamp_fields(&mut next);
        return next;
    }
    let mut baseline = book.clone();
    baseline.status = ReadingStatus::NotStarted;
    apply_domain_rules(&baseline, book)
}

/// Recomputes cumulative progress from the session list.
///
/// Used after a session is deleted: progress becomes the furthest page any
/// remaining session reached.
pub fn recompute_progress(book: &mut Book) {
    book.current_page = book
        .sessions
        .iter()
        .map(|session| session.end_page)
        .max()
        .unwrap_or(0);
    clamp_progress(book);
}

fn clear_progress(book: &mut Book) {
    book.current_page = 0;
    book.sessions.clear();
    book.started_at = None;
    book.finished_at = None;
}

fn clamp_fields(book: &mut Book) {
    clamp_progress(book);
    book.rating = book
        .rating
        .filter(|rating| (MIN_RATING..=MAX_RATING).contains(rating));
}

fn clamp_progress(book: &mut Book) {
    if let Some(total) = book.total_pages {
        book.current_page = book.current_page.min(total);
    }
}
