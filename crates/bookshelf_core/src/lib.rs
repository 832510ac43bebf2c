//! Core domain logic for Bookshelf, a local-first reading log.
//! This crate is the single source of truth for record invariants,
//! persistence ordering, and list reordering.

pub mod config;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod persist;
pub mod reorder;
pub mod store;
pub mod view_memory;

pub use config::{AutoscrollConfig, CoalescerConfig, ConfigError, CoreConfig};
pub use gateway::memory::{GatewayCall, MemoryGateway};
pub use gateway::sqlite::SqliteGateway;
pub use gateway::{GatewayError, GatewayResult, StorageGateway};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::book::{Book, BookId, BookPatch, ReadingSession, ReadingStatus, SessionId};
pub use model::rules::{apply_domain_rules, normalize_new_book};
pub use persist::coalescer::{FlushReport, WriteCoalescer};
pub use reorder::engine::{
    CommitOutcome, DragPhase, PointerCapture, ReorderEngine, ReorderError, ReorderHost,
    ReorderScope, ReorderTarget,
};
pub use store::record_store::{AppLifecycle, OpenedStore, RecordStore, StoreError, StoreResult};
pub use view_memory::ViewPositionMemory;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
