//! Record store: the caller-facing API over the tracked collection.
//!
//! # See also
//! - `persist::coalescer` for how intents reach storage.

pub mod record_store;
