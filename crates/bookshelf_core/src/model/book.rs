//! Book domain model.
//!
//! # Responsibility
//! - Define the canonical record tracked by the collection store.
//! - Define the nested reading-session list owned by each book.
//!
//! # Invariants
//! - `id` is stable and never reused for another book.
//! - Sessions are owned exclusively by one book and never shared.
//! - Position is derived from store order; `custom_order` is only a
//!   persisted hint used to restore order after a restart.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier for a tracked book.
pub type BookId = Uuid;

/// Stable identifier for one reading session.
pub type SessionId = Uuid;

/// Reading lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    /// On the shelf, never opened.
    #[default]
    NotStarted,
    /// Currently being read.
    Reading,
    /// Read to the end.
    Finished,
    /// Put down without finishing.
    Abandoned,
}

impl ReadingStatus {
    /// Stable string id used by storage columns and CLI input.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Reading => "reading",
            Self::Finished => "finished",
            Self::Abandoned => "abandoned",
        }
    }

    /// Parses a stable string id. Accepts `-` as separator as well.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "not_started" => Some(Self::NotStarted),
            "reading" | "in_progress" => Some(Self::Reading),
            "finished" => Some(Self::Finished),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

/// One recorded reading sitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingSession {
    pub id: SessionId,
    /// Unix epoch milliseconds.
    pub recorded_at: i64,
    pub start_page: u32,
    pub end_page: u32,
    pub minutes: u32,
}

impl ReadingSession {
    /// Creates a session with a generated id, stamped with the current time.
    pub fn new(start_page: u32, end_page: u32, minutes: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: now_epoch_ms(),
            start_page,
            end_page,
            minutes,
        }
    }

    /// Pages covered by this session; zero for inverted ranges.
    pub fn pages_read(&self) -> u32 {
        self.end_page.saturating_sub(self.start_page)
    }
}

/// Canonical tracked record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Stable global ID.
    pub id: BookId,
    pub title: String,
    pub author: Option<String>,
    pub status: ReadingStatus,
    pub total_pages: Option<u32>,
    /// Cumulative progress. Never greater than `total_pages` when known.
    pub current_page: u32,
    /// 1..=5 when set.
    pub rating: Option<u8>,
    pub notes: String,
    /// Unix epoch milliseconds.
    pub started_at: Option<i64>,
    /// Unix epoch milliseconds.
    pub finished_at: Option<i64>,
    #[serde(default)]
    pub sessions: Vec<ReadingSession>,
    /// Persisted position hint. Store order wins over this value in memory.
    #[serde(default)]
    pub custom_order: Option<i64>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Book {
    /// Creates a new unstarted book with a generated stable ID.
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), title)
    }

    /// Creates a new unstarted book with a caller-provided stable ID.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(id: BookId, title: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id,
            title: title.into(),
            author: None,
            status: ReadingStatus::NotStarted,
            total_pages: None,
            current_page: 0,
            rating: None,
            notes: String::new(),
            started_at: None,
            finished_at: None,
            sessions: Vec::new(),
            custom_order: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style author setter.
    pub fn by(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Builder-style page count setter.
    pub fn with_pages(mut self, total_pages: u32) -> Self {
        self.total_pages = Some(total_pages);
        self
    }

    /// Returns progress in percent when the page count is known.
    pub fn progress_percent(&self) -> Option<u8> {
        let total = self.total_pages.filter(|total| *total > 0)?;
        let percent = u64::from(self.current_page.min(total)) * 100 / u64::from(total);
        Some(percent as u8)
    }

    /// Total minutes across all sessions.
    pub fn minutes_read(&self) -> u32 {
        self.sessions.iter().map(|session| session.minutes).sum()
    }

    pub fn session(&self, session_id: SessionId) -> Option<&ReadingSession> {
        self.sessions.iter().find(|session| session.id == session_id)
    }
}

/// Partial update for one book.
///
/// `None` leaves a field untouched. Nested options (`Some(None)`) clear
/// nullable fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<Option<String>>,
    pub status: Option<ReadingStatus>,
    pub total_pages: Option<Option<u32>>,
    pub current_page: Option<u32>,
    pub rating: Option<Option<u8>>,
    pub notes: Option<String>,
}

impl BookPatch {
    /// Patch that only changes reading status.
    pub fn status(status: ReadingStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch that only changes current page.
    pub fn current_page(page: u32) -> Self {
        Self {
            current_page: Some(page),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Produces the proposed record by overlaying this patch on `base`.
    ///
    /// Domain rules are not applied here; see `model::rules`.
    pub fn merged_onto(&self, base: &Book) -> Book {
        let mut next = base.clone();
        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(author) = &self.author {
            next.author = author.clone();
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(total_pages) = self.total_pages {
            next.total_pages = total_pages;
        }
        if let Some(current_page) = self.current_page {
            next.current_page = current_page;
        }
        if let Some(rating) = self.rating {
            next.rating = rating;
        }
        if let Some(notes) = &self.notes {
            next.notes = notes.clone();
        }
        next
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
