//! Gesture-driven reorder state machine.
//!
//! # Responsibility
//! - Turn a press/move/release gesture into one committed collection order.
//! - Keep a private working draft so drag feedback never touches the store.
//! - Drive edge autoscroll and re-evaluate the drop index after each step.
//!
//! # Invariants
//! - Phases: `Idle -> Dragging -> (Autoscrolling)* -> Committing -> Idle`.
//! - The store is called at most once per gesture, through `ReorderTarget`.
//! - Leaving the drag (commit, cancel, or drop) cancels the frame request and
//!   releases pointer capture.

use crate::config::AutoscrollConfig;
use crate::model::book::BookId;
use crate::reorder::autoscroll::{
    autoscroll_step, AutoscrollController, FrameScheduler, FrameToken, ScrollContainer,
};
use crate::reorder::geometry::{draft_insertion_index, PositionsProvider};
use crate::reorder::partition::compose_partitioned_order;
use crate::store::record_store::{StoreError, StoreResult};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

const MIN_REORDERABLE_ITEMS: usize = 2;

/// Ordered collection the engine commits into.
pub trait ReorderTarget {
    /// Current full order.
    fn current_order(&self) -> Vec<BookId>;

    /// Replaces the full order. Returns whether anything changed.
    fn reorder(&mut self, ids: Vec<BookId>) -> StoreResult<bool>;
}

/// Pointer capture for the duration of one gesture.
pub trait PointerCapture {
    /// Subscribes to move/release events for the dragged item.
    fn capture_pointer(&mut self, id: BookId);

    /// Drops every gesture subscription taken by `capture_pointer`.
    fn release_pointer(&mut self);
}

/// Everything the engine needs from the presentation layer.
pub trait ReorderHost:
    PositionsProvider + ScrollContainer + FrameScheduler + PointerCapture
{
}

impl<T> ReorderHost for T where
    T: PositionsProvider + ScrollContainer + FrameScheduler + PointerCapture
{
}

/// Which items a drag may reorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderScope {
    /// The whole collection.
    All,
    /// Only the listed ids (an active search or filter). Hidden items keep
    /// their relative order after the reordered subset.
    Filtered(Vec<BookId>),
}

/// Observable engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Dragging,
    Autoscrolling,
    Committing,
}

/// Result of a released gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Item dropped where it started; the store was not called.
    Unchanged,
    /// The store accepted this full order.
    Reordered(Vec<BookId>),
}

/// Gesture rejection or commit failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderError {
    AlreadyDragging,
    NotDragging,
    TooFewItems { count: usize },
    UnknownItem(BookId),
    Store(StoreError),
}

impl Display for ReorderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyDragging => write!(f, "a drag is already in progress"),
            Self::NotDragging => write!(f, "no drag in progress"),
            Self::TooFewItems { count } => {
                write!(f, "reorder needs at least {MIN_REORDERABLE_ITEMS} items, got {count}")
            }
            Self::UnknownItem(id) => write!(f, "item is not reorderable here: {id}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ReorderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ReorderError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

struct DragSession {
    dragged: BookId,
    /// Working draft captured at drag start, dragged id included.
    draft: Vec<BookId>,
    /// Draft without the dragged id; drop indices point into this.
    rest: Vec<BookId>,
    pointer_y: f64,
    drop_index: usize,
}

/// Reorder engine bound to one host view.
///
/// Dropping the engine mid-drag abandons the gesture.
pub struct ReorderEngine<H: ReorderHost> {
    host: H,
    config: AutoscrollConfig,
    autoscroll: AutoscrollController,
    session: Option<DragSession>,
    committing: bool,
}

impl<H: ReorderHost> ReorderEngine<H> {
    pub fn new(host: H, config: AutoscrollConfig) -> Self {
        Self {
            host,
            config,
            autoscroll: AutoscrollController::new(),
            session: None,
            committing: false,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn phase(&self) -> DragPhase {
        if self.committing {
            DragPhase::Committing
        } else if self.session.is_none() {
            DragPhase::Idle
        } else if self.autoscroll.is_running() {
            DragPhase::Autoscrolling
        } else {
            DragPhase::Dragging
        }
    }

    /// Live insertion index into the draft without the dragged item.
    pub fn drop_index(&self) -> Option<usize> {
        self.session.as_ref().map(|session| session.drop_index)
    }

    pub fn dragged(&self) -> Option<BookId> {
        self.session.as_ref().map(|session| session.dragged)
    }

    /// Starts a drag of `id` from a press-and-hold at `pointer_y`.
    pub fn begin(
        &mut self,
        target: &impl ReorderTarget,
        id: BookId,
        pointer_y: f64,
        scope: ReorderScope,
    ) -> Result<(), ReorderError> {
        if self.session.is_some() {
            return Err(ReorderError::AlreadyDragging);
        }

        let live = target.current_order();
        let draft: Vec<BookId> = match scope {
            ReorderScope::All => live,
            ReorderScope::Filtered(visible) => {
                let visible: HashSet<BookId> = visible.into_iter().collect();
                live.into_iter().filter(|id| visible.contains(id)).collect()
            }
        };
        if draft.len() < MIN_REORDERABLE_ITEMS {
            return Err(ReorderError::TooFewItems { count: draft.len() });
        }
        let origin = draft
            .iter()
            .position(|candidate| *candidate == id)
            .ok_or(ReorderError::UnknownItem(id))?;

        let mut rest = draft.clone();
        rest.remove(origin);
        self.host.capture_pointer(id);
        self.session = Some(DragSession {
            dragged: id,
            draft,
            rest,
            pointer_y,
            drop_index: origin,
        });
        info!("event=reorder_begin module=reorder status=ok id={id} origin={origin}");
        Ok(())
    }

    /// Handles one gesture move; returns the updated drop index.
    pub fn on_move(&mut self, pointer_y: f64) -> Result<usize, ReorderError> {
        let session = self.session.as_mut().ok_or(ReorderError::NotDragging)?;
        session.pointer_y = pointer_y;
        let drop_index = self.refresh_drop_index();

        let step = autoscroll_step(pointer_y, self.host.viewport(), &self.config);
        if step == 0.0 {
            self.autoscroll.stop(&mut self.host);
        } else {
            self.autoscroll.start(&mut self.host);
        }
        Ok(drop_index)
    }

    /// Handles a delivered frame callback.
    ///
    /// Scrolls one step, re-evaluates the drop index and schedules the next
    /// frame while the pointer stays in an edge band. Returns the drop index
    /// when a step was taken.
    pub fn on_frame(&mut self, token: FrameToken) -> Option<usize> {
        let pointer_y = self.session.as_ref()?.pointer_y;
        if !self.autoscroll.accept_frame(token) {
            return None;
        }

        let step = autoscroll_step(pointer_y, self.host.viewport(), &self.config);
        if step == 0.0 {
            return None;
        }
        let scrolled = self.host.scroll_by(step);
        let drop_index = self.refresh_drop_index();
        if scrolled != 0.0 {
            self.autoscroll.start(&mut self.host);
        } else {
            debug!("event=reorder_autoscroll module=reorder status=stopped reason=edge");
        }
        Some(drop_index)
    }

    /// Releases the gesture and commits the new order when it changed.
    pub fn end(&mut self, target: &mut impl ReorderTarget) -> Result<CommitOutcome, ReorderError> {
        let session = self.session.take().ok_or(ReorderError::NotDragging)?;
        self.committing = true;
        self.release();
        let outcome = commit(&session, target);
        self.committing = false;

        match &outcome {
            Ok(CommitOutcome::Unchanged) => {
                info!("event=reorder_commit module=reorder status=skipped reason=unchanged")
            }
            Ok(CommitOutcome::Reordered(order)) => info!(
                "event=reorder_commit module=reorder status=ok id={} count={}",
                session.dragged,
                order.len()
            ),
            Err(err) => warn!("event=reorder_commit module=reorder status=error error={err}"),
        }
        outcome
    }

    /// Abandons the active gesture without touching the store.
    ///
    /// Returns `false` when no drag was active.
    pub fn cancel(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        self.release();
        info!(
            "event=reorder_cancel module=reorder status=ok id={}",
            session.dragged
        );
        true
    }

    fn release(&mut self) {
        self.autoscroll.stop(&mut self.host);
        self.host.release_pointer();
    }

    fn refresh_drop_index(&mut self) -> usize {
        let measured = self.host.visible_positions();
        match self.session.as_mut() {
            Some(session) => {
                session.drop_index =
                    draft_insertion_index(&session.rest, &measured, session.pointer_y);
                session.drop_index
            }
            None => 0,
        }
    }
}

impl<H: ReorderHost> Drop for ReorderEngine<H> {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn commit(
    session: &DragSession,
    target: &mut impl ReorderTarget,
) -> Result<CommitOutcome, ReorderError> {
    let mut reordered = session.rest.clone();
    let index = session.drop_index.min(reordered.len());
    reordered.insert(index, session.dragged);
    if reordered == session.draft {
        return Ok(CommitOutcome::Unchanged);
    }

    let live = target.current_order();
    let composed = compose_partitioned_order(&reordered, &live);
    if composed == live {
        return Ok(CommitOutcome::Unchanged);
    }
    target.reorder(composed.clone())?;
    Ok(CommitOutcome::Reordered(composed))
}
