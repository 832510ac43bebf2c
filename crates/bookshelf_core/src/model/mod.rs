//! Domain model for the tracked collection.
//!
//! # Responsibility
//! - Define canonical data structures used by the store and its gateways.
//! - Keep derived-field rules as pure functions next to the data they govern.
//!
//! # Invariants
//! - Every book is identified by a stable `BookId`.
//! - Reading sessions are owned by exactly one book.

pub mod book;
pub mod rules;
