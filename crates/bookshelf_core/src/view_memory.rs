//! Per-view scroll position memory.
//!
//! # Responsibility
//! - Remember scroll offsets per view across navigation.
//!
//! # Invariants
//! - Owned by the caller and passed where needed; there is no process-wide
//!   instance.
//! - Read on view enter, written on view exit.

use std::collections::HashMap;

/// Scroll offsets keyed by view identity (tab name, route, filter key).
#[derive(Debug, Clone, Default)]
pub struct ViewPositionMemory {
    offsets: HashMap<String, f64>,
}

impl ViewPositionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the offset to restore when `view` is entered.
    pub fn enter(&self, view: &str) -> Option<f64> {
        self.offsets.get(view).copied()
    }

    /// Records the offset `view` had when it was left.
    ///
    /// Non-finite offsets are ignored.
    pub fn exit(&mut self, view: &str, offset: f64) {
        if offset.is_finite() {
            self.offsets.insert(view.to_string(), offset.max(0.0));
        }
    }

    pub fn forget(&mut self, view: &str) -> Option<f64> {
        self.offsets.remove(view)
    }

    pub fn clear(&mut self) {
        self.offsets.clear();
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
