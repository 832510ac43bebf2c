//! In-memory authoritative book collection.
//!
//! # Responsibility
//! - Apply every mutation to memory synchronously and return immediately.
//! - Route each mutation to the write coalescer as a persistence intent.
//! - Apply domain rules so every caller gets the same derived fields.
//!
//! # Invariants
//! - The in-memory sequence is the source of truth for display and order.
//! - Ids are unique within the sequence.
//! - Validation failures leave the sequence untouched.
//! - Removing a record cancels its pending write before scheduling deletion.

use crate::config::CoalescerConfig;
use crate::gateway::{GatewayError, StorageGateway};
use crate::model::book::{
    now_epoch_ms, Book, BookId, BookPatch, ReadingSession, ReadingStatus, SessionId,
};
use crate::model::rules::{apply_domain_rules, normalize_new_book, recompute_progress};
use crate::persist::coalescer::{FlushReport, WriteCoalescer};
use crate::reorder::engine::ReorderTarget;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type StoreResult<T> = Result<T, StoreError>;

/// Synchronous mutation-validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record with this id is in the sequence.
    NotFound(BookId),
    /// The record exists but has no session with this id.
    SessionNotFound {
        book_id: BookId,
        session_id: SessionId,
    },
    /// A record with this id is already in the sequence.
    DuplicateId(BookId),
    /// Proposed order is not a permutation of the current ids.
    InvalidReorder {
        missing: Vec<BookId>,
        unknown: Vec<BookId>,
        duplicated: Vec<BookId>,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "book not found: {id}"),
            Self::SessionNotFound {
                book_id,
                session_id,
            } => write!(f, "session {session_id} not found on book {book_id}"),
            Self::DuplicateId(id) => write!(f, "book already exists: {id}"),
            Self::InvalidReorder {
                missing,
                unknown,
                duplicated,
            } => write!(
                f,
                "reorder does not match collection: missing={} unknown={} duplicated={}",
                missing.len(),
                unknown.len(),
                duplicated.len()
            ),
        }
    }
}

impl Error for StoreError {}

/// Host application visibility signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppLifecycle {
    /// Application moved to background or its window was hidden.
    Hidden,
    /// Application returned to foreground.
    Visible,
    /// Application is about to be torn down.
    Terminating,
}

/// Result of opening a store: the store is always usable, even when the
/// initial load failed.
pub struct OpenedStore {
    pub store: RecordStore,
    /// Set when `load_all` failed; the store then starts empty.
    pub load_error: Option<GatewayError>,
}

/// Local-first record store.
pub struct RecordStore {
    books: Vec<Book>,
    coalescer: WriteCoalescer,
}

impl RecordStore {
    /// Loads the collection and starts the persistence task.
    ///
    /// Gateway order is kept; order hints are refreshed to match it.
    pub async fn open(gateway: Arc<dyn StorageGateway>, config: CoalescerConfig) -> OpenedStore {
        let (mut books, load_error) = match gateway.load_all().await {
            Ok(books) => (books, None),
            Err(err) => {
                warn!("event=store_open module=store status=error error={err}");
                (Vec::new(), Some(err))
            }
        };

        let mut seen = HashSet::new();
        books.retain(|book| {
            let fresh = seen.insert(book.id);
            if !fresh {
                warn!(
                    "event=store_open module=store status=skipped reason=duplicate_id id={}",
                    book.id
                );
            }
            fresh
        });
        refresh_order_hints(&mut books);

        let stored_order = books.iter().map(|book| book.id).collect();
        let coalescer = WriteCoalescer::spawn(gateway, config, stored_order);
        info!(
            "event=store_open module=store status=ok count={} load_failed={}",
            books.len(),
            load_error.is_some()
        );

        OpenedStore {
            store: Self { books, coalescer },
            load_error,
        }
    }

    /// Read-only snapshot of the current sequence.
    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn ids(&self) -> Vec<BookId> {
        self.books.iter().map(|book| book.id).collect()
    }

    pub fn get(&self, id: BookId) -> Option<&Book> {
        self.books.iter().find(|book| book.id == id)
    }

    /// Current index of `id` in the sequence.
    pub fn position(&self, id: BookId) -> Option<usize> {
        self.books.iter().position(|book| book.id == id)
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Appends a record at position `len()` and schedules its write.
    ///
    /// The record passes through the same status and range rules as updates.
    pub fn add(&mut self, mut book: Book) -> StoreResult<BookId> {
        if self.get(book.id).is_some() {
            return Err(StoreError::DuplicateId(book.id));
        }

        book.custom_order = Some(self.next_order_hint());
        book.updated_at = now_epoch_ms();
        let book = normalize_new_book(book);
        let id = book.id;
        self.coalescer.schedule_save(book.clone());
        self.books.push(book);
        debug!(
            "event=store_add module=store status=ok id={id} position={}",
            self.books.len() - 1
        );
        Ok(id)
    }

    /// Merges `patch` into the record, keeping its position.
    ///
    /// An empty patch is accepted without scheduling a write.
    pub fn update(&mut self, id: BookId, patch: &BookPatch) -> StoreResult<&Book> {
        let index = self.index_of(id)?;
        if patch.is_empty() {
            return Ok(&self.books[index]);
        }
        let proposed = patch.merged_onto(&self.books[index]);
        Ok(self.commit_proposed(index, proposed))
    }

    /// Replaces the full record with the same id, keeping its position.
    pub fn replace(&mut self, book: Book) -> StoreResult<&Book> {
        let index = self.index_of(book.id)?;
        Ok(self.commit_proposed(index, book))
    }

    /// Deletes the record, cancels its pending write and schedules deletion.
    pub fn remove(&mut self, id: BookId) -> StoreResult<Book> {
        let index = self.index_of(id)?;
        let removed = self.books.remove(index);
        self.coalescer.schedule_remove(id);
        debug!("event=store_remove module=store status=ok id={id} position={index}");
        Ok(removed)
    }

    /// Replaces the sequence order wholesale.
    ///
    /// Returns `Ok(false)` when `ids` equals the current order; nothing is
    /// scheduled in that case.
    pub fn reorder(&mut self, ids: Vec<BookId>) -> StoreResult<bool> {
        self.validate_permutation(&ids)?;
        if self.books.iter().map(|book| book.id).eq(ids.iter().copied()) {
            return Ok(false);
        }

        let mut by_id: HashMap<BookId, Book> = self
            .books
            .drain(..)
            .map(|book| (book.id, book))
            .collect();
        self.books = ids.iter().filter_map(|id| by_id.remove(id)).collect();
        refresh_order_hints(&mut self.books);
        self.coalescer.schedule_order(ids);
        debug!(
            "event=store_reorder module=store status=ok count={}",
            self.books.len()
        );
        Ok(true)
    }

    /// Appends a reading session and advances progress.
    ///
    /// An unstarted book moves to `Reading`.
    pub fn add_session(&mut self, id: BookId, session: ReadingSession) -> StoreResult<&Book> {
        let index = self.index_of(id)?;
        let mut proposed = self.books[index].clone();
        proposed.current_page = proposed.current_page.max(session.end_page);
        proposed.sessions.push(session);
        if proposed.status == ReadingStatus::NotStarted {
            proposed.status = ReadingStatus::Reading;
        }
        Ok(self.commit_proposed(index, proposed))
    }

    /// Deletes one session and recomputes progress from the remaining ones.
    pub fn remove_session(&mut self, id: BookId, session_id: SessionId) -> StoreResult<&Book> {
        let index = self.index_of(id)?;
        let book = &mut self.books[index];
        let session_index = book
            .sessions
            .iter()
            .position(|session| session.id == session_id)
            .ok_or(StoreError::SessionNotFound {
                book_id: id,
                session_id,
            })?;

        book.sessions.remove(session_index);
        recompute_progress(book);
        book.updated_at = now_epoch_ms();
        self.coalescer.schedule_save(book.clone());
        Ok(&self.books[index])
    }

    /// Drains pending writes immediately.
    pub async fn flush(&self) -> FlushReport {
        self.coalescer.flush().await
    }

    /// Reacts to host visibility changes.
    ///
    /// `Hidden` and `Terminating` force a flush and resolve only after every
    /// pending write has been handed to storage.
    pub async fn handle_lifecycle(&self, event: AppLifecycle) -> Option<FlushReport> {
        match event {
            AppLifecycle::Hidden | AppLifecycle::Terminating => {
                let report = self.coalescer.flush().await;
                info!(
                    "event=store_lifecycle module=store status=ok signal={event:?} saved={} orders={} failed={}",
                    report.saved, report.orders, report.failed
                );
                Some(report)
            }
            AppLifecycle::Visible => None,
        }
    }

    /// Flushes and stops the persistence task.
    pub async fn close(self) -> FlushReport {
        self.coalescer.shutdown().await
    }

    fn index_of(&self, id: BookId) -> StoreResult<usize> {
        self.position(id).ok_or(StoreError::NotFound(id))
    }

    fn commit_proposed(&mut self, index: usize, mut proposed: Book) -> &Book {
        proposed.updated_at = now_epoch_ms();
        let next = apply_domain_rules(&self.books[index], proposed);
        self.coalescer.schedule_save(next.clone());
        self.books[index] = next;
        &self.books[index]
    }

    fn next_order_hint(&self) -> i64 {
        let after_last = self
            .books
            .iter()
            .filter_map(|book| book.custom_order)
            .max()
            .map_or(0, |max| max + 1);
        after_last.max(self.books.len() as i64)
    }

    fn validate_permutation(&self, ids: &[BookId]) -> StoreResult<()> {
        let current: HashSet<BookId> = self.books.iter().map(|book| book.id).collect();
        let mut seen = HashSet::with_capacity(ids.len());
        let mut unknown = Vec::new();
        let mut duplicated = Vec::new();
        for id in ids {
            if !current.contains(id) {
                unknown.push(*id);
            } else if !seen.insert(*id) {
                duplicated.push(*id);
            }
        }
        let missing: Vec<BookId> = self
            .books
            .iter()
            .map(|book| book.id)
            .filter(|id| !seen.contains(id))
            .collect();

        if missing.is_empty() && unknown.is_empty() && duplicated.is_empty() {
            return Ok(());
        }
        warn!(
            "event=store_reorder module=store status=rejected missing={} unknown={} duplicated={}",
            missing.len(),
            unknown.len(),
            duplicated.len()
        );
        Err(StoreError::InvalidReorder {
            missing,
            unknown,
            duplicated,
        })
    }
}

impl ReorderTarget for RecordStore {
    fn current_order(&self) -> Vec<BookId> {
        self.ids()
    }

    fn reorder(&mut self, ids: Vec<BookId>) -> StoreResult<bool> {
        RecordStore::reorder(self, ids)
    }
}

fn refresh_order_hints(books: &mut [Book]) {
    for (index, book) in books.iter_mut().enumerate() {
        book.custom_order = Some(index as i64);
    }
}
