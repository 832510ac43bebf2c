//! In-process storage gateway.
//!
//! # Responsibility
//! - Provide ephemeral storage with the same contract as the SQLite gateway.
//! - Journal every call so callers can observe persistence timing and order.
//! - Allow latency and failure injection.
//!
//! # Invariants
//! - Every call is journaled on entry, including calls that then fail.
//! - Stored order follows the last successful `save_order`, with records the
//!   order did not mention kept after it in their previous relative order.

use crate::gateway::{GatewayError, GatewayResult, StorageGateway};
use crate::model::book::{Book, BookId};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// One observed gateway invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    LoadAll,
    SaveOne(Book),
    RemoveOne(BookId),
    SaveOrder(Vec<BookId>),
}

impl GatewayCall {
    /// Returns the record id this call targets, if it targets one.
    pub fn book_id(&self) -> Option<BookId> {
        match self {
            Self::SaveOne(book) => Some(book.id),
            Self::RemoveOne(id) => Some(*id),
            Self::LoadAll | Self::SaveOrder(_) => None,
        }
    }
}

#[derive(Default)]
struct MemoryState {
    books: Vec<Book>,
    journal: Vec<GatewayCall>,
    latency: Duration,
    fail_all: bool,
    fail_load: bool,
    failing_ids: HashSet<BookId>,
}

/// Ephemeral gateway backed by a vector.
#[derive(Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway pre-populated with stored records, in order.
    pub fn with_books(books: Vec<Book>) -> Self {
        let gateway = Self::default();
        gateway.state().books = books;
        gateway
    }

    /// Delays every call by `latency` before it takes effect.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = latency;
    }

    /// Makes every write call fail while enabled.
    pub fn set_fail_all(&self, fail: bool) {
        self.state().fail_all = fail;
    }

    /// Makes `load_all` fail while enabled.
    pub fn set_fail_load(&self, fail: bool) {
        self.state().fail_load = fail;
    }

    /// Makes saves and removes for one id fail.
    pub fn fail_writes_for(&self, id: BookId) {
        self.state().failing_ids.insert(id);
    }

    /// Returns the call journal.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().journal.clone()
    }

    /// Returns journaled calls that target `id`.
    pub fn calls_for(&self, id: BookId) -> Vec<GatewayCall> {
        self.state()
            .journal
            .iter()
            .filter(|call| call.book_id() == Some(id))
            .cloned()
            .collect()
    }

    /// Returns only the `save_order` payloads, in call order.
    pub fn order_calls(&self) -> Vec<Vec<BookId>> {
        self.state()
            .journal
            .iter()
            .filter_map(|call| match call {
                GatewayCall::SaveOrder(ids) => Some(ids.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().journal.clear();
    }

    /// Returns stored records in stored order.
    pub fn stored_books(&self) -> Vec<Book> {
        self.state().books.clone()
    }

    pub fn stored_ids(&self) -> Vec<BookId> {
        self.state().books.iter().map(|book| book.id).collect()
    }

    pub fn stored(&self, id: BookId) -> Option<Book> {
        self.state().books.iter().find(|book| book.id == id).cloned()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn enter(&self, call: GatewayCall) {
        let latency = {
            let mut state = self.state();
            state.journal.push(call);
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_write(&self, id: Option<BookId>) -> GatewayResult<()> {
        let state = self.state();
        if state.fail_all {
            return Err(GatewayError::Unavailable("writes disabled".to_string()));
        }
        if let Some(id) = id {
            if state.failing_ids.contains(&id) {
                return Err(GatewayError::Unavailable(format!("writes for {id} disabled")));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageGateway for MemoryGateway {
    async fn load_all(&self) -> GatewayResult<Vec<Book>> {
        self.enter(GatewayCall::LoadAll).await;
        let state = self.state();
        if state.fail_load {
            return Err(GatewayError::Unavailable("load disabled".to_string()));
        }
        Ok(state.books.clone())
    }

    async fn save_one(&self, book: &Book) -> GatewayResult<()> {
        self.enter(GatewayCall::SaveOne(book.clone())).await;
        self.check_write(Some(book.id))?;

        let mut state = self.state();
        match state.books.iter_mut().find(|stored| stored.id == book.id) {
            Some(stored) => *stored = book.clone(),
            None => state.books.push(book.clone()),
        }
        Ok(())
    }

    async fn remove_one(&self, id: BookId) -> GatewayResult<()> {
        self.enter(GatewayCall::RemoveOne(id)).await;
        self.check_write(Some(id))?;

        self.state().books.retain(|book| book.id != id);
        Ok(())
    }

    async fn save_order(&self, ids: &[BookId]) -> GatewayResult<()> {
        self.enter(GatewayCall::SaveOrder(ids.to_vec())).await;
        self.check_write(None)?;

        let mut state = self.state();
        let mut remaining = std::mem::take(&mut state.books);
        let mut ordered = Vec::with_capacity(remaining.len());
        for id in ids {
            if let Some(index) = remaining.iter().position(|book| book.id == *id) {
                ordered.push(remaining.remove(index));
            }
        }
        ordered.append(&mut remaining);
        for (index, book) in ordered.iter_mut().enumerate() {
            book.custom_order = Some(index as i64);
        }
        state.books = ordered;
        Ok(())
    }
}
