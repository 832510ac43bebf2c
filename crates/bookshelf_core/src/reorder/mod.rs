//! Pointer-driven manual reordering.
//!
//! # Responsibility
//! - Convert a continuous drag gesture into one insertion index.
//! - Commit the resulting order through the record store only.
//!
//! # Invariants
//! - Geometry, scrolling, frame scheduling and pointer capture are host
//!   seams; nothing here renders or measures.

pub mod autoscroll;
pub mod engine;
pub mod geometry;
pub mod partition;
