//! Persistence scheduling between the in-memory store and storage.
//!
//! # Responsibility
//! - Decouple store mutations from storage latency.
//! - Serialize and coalesce outgoing writes.
//!
//! # Invariants
//! - Store callers never await storage except at explicit flush points.

pub mod coalescer;
