//! Storage gateway contract and implementations.
//!
//! # Responsibility
//! - Define the four durable operations the write coalescer consumes.
//! - Isolate storage transport details from store orchestration.
//!
//! # Invariants
//! - `save_one`, `remove_one` and `save_order` are idempotent.
//! - `remove_one` on an absent id is not an error.
//! - Gateways never see partial records; every save carries a full snapshot.

use crate::db::DbError;
use crate::model::book::{Book, BookId};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Durable storage failure.
#[derive(Debug)]
pub enum GatewayError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Record payload could not be encoded or decoded.
    Serialization(serde_json::Error),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
    /// Backend refused the call (offline, quota, injected failure).
    Unavailable(String),
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "record payload encoding failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted book data: {message}"),
            Self::Unavailable(message) => write!(f, "storage unavailable: {message}"),
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::InvalidData(_) => None,
            Self::Unavailable(_) => None,
        }
    }
}

impl From<DbError> for GatewayError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for GatewayError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Durable record storage consumed by the write coalescer.
///
/// # Object Safety
/// Used as `Arc<dyn StorageGateway>`; `#[async_trait]` boxes each future so
/// the coalescer task stays `Send`.
#[async_trait]
pub trait StorageGateway: Send + Sync + 'static {
    /// Loads the full collection, ordered by persisted position.
    async fn load_all(&self) -> GatewayResult<Vec<Book>>;

    /// Upserts one full record snapshot.
    async fn save_one(&self, book: &Book) -> GatewayResult<()>;

    /// Deletes one record. Absent ids succeed.
    async fn remove_one(&self, id: BookId) -> GatewayResult<()>;

    /// Persists the full ordering. Ids unknown to storage are ignored.
    async fn save_order(&self, ids: &[BookId]) -> GatewayResult<()>;
}
