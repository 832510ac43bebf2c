//! SQLite-backed storage gateway.
//!
//! # Responsibility
//! - Persist full book snapshots as JSON payload rows.
//! - Persist collection order in the `sort_order` column.
//!
//! # Invariants
//! - `save_one` never rewrites `sort_order` of an existing row; order changes
//!   only arrive through `save_order`.
//! - New rows without an order hint are appended after the current maximum.
//! - Read paths reject corrupt payloads instead of masking them.

use crate::db::{open_db, open_db_in_memory};
use crate::gateway::{GatewayError, GatewayResult, StorageGateway};
use crate::model::book::{Book, BookId};
use async_trait::async_trait;
use log::debug;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const BOOK_SELECT_SQL: &str = "SELECT id, payload, sort_order FROM books";

/// Durable gateway over one SQLite connection.
///
/// Statements run on the tokio blocking pool so a slow or locked database
/// never stalls the async runtime.
pub struct SqliteGateway {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGateway {
    /// Wraps a connection already bootstrapped by `db::open_db`.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Opens (or creates) a database file.
    pub fn open(path: impl AsRef<Path>) -> GatewayResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> GatewayResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    async fn with_conn<F, T>(&self, operation: F) -> GatewayResult<T>
    where
        F: FnOnce(&mut Connection) -> GatewayResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| {
                GatewayError::Unavailable("sqlite connection lock poisoned".to_string())
            })?;
            operation(&mut conn)
        })
        .await
        .map_err(|err| GatewayError::Unavailable(format!("sqlite task failed: {err}")))?
    }
}

#[async_trait]
impl StorageGateway for SqliteGateway {
    async fn load_all(&self) -> GatewayResult<Vec<Book>> {
        let books = self
            .with_conn(|conn| {
                let mut stmt =
                    conn.prepare(&format!("{BOOK_SELECT_SQL} ORDER BY sort_order ASC, id ASC"))?;
                let mut rows = stmt.query([])?;
                let mut books = Vec::new();
                while let Some(row) = rows.next()? {
                    let id_text: String = row.get("id")?;
                    let payload: String = row.get("payload")?;
                    let sort_order: i64 = row.get("sort_order")?;
                    books.push(parse_book_row(&id_text, &payload, sort_order)?);
                }
                Ok(books)
            })
            .await?;

        debug!(
            "event=gateway_load module=gateway backend=sqlite status=ok count={}",
            books.len()
        );
        Ok(books)
    }

    async fn save_one(&self, book: &Book) -> GatewayResult<()> {
        let payload = serde_json::to_string(book)?;
        let id = book.id.to_string();
        let title = book.title.clone();
        let status = book.status.as_str();
        let order_hint = book.custom_order;
        let updated_at = book.updated_at;

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO books (id, title, status, payload, sort_order, updated_at)
                 VALUES (
                    ?1, ?2, ?3, ?4,
                    COALESCE(?5, (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM books)),
                    ?6
                 )
                 ON CONFLICT(id) DO UPDATE SET
                    title = excluded.title,
                    status = excluded.status,
                    payload = excluded.payload,
                    updated_at = excluded.updated_at;",
                params![id, title, status, payload, order_hint, updated_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove_one(&self, id: BookId) -> GatewayResult<()> {
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM books WHERE id = ?1;", [id.to_string()])?;
            Ok(())
        })
        .await
    }

    async fn save_order(&self, ids: &[BookId]) -> GatewayResult<()> {
        let ids = ids.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare("UPDATE books SET sort_order = ?1 WHERE id = ?2;")?;
                for (index, id) in ids.iter().enumerate() {
                    stmt.execute(params![index as i64, id.to_string()])?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

fn parse_book_row(id_text: &str, payload: &str, sort_order: i64) -> GatewayResult<Book> {
    let id = Uuid::parse_str(id_text).map_err(|_| {
        GatewayError::InvalidData(format!("invalid uuid value `{id_text}` in books.id"))
    })?;
    let mut book: Book = serde_json::from_str(payload).map_err(|err| {
        GatewayError::InvalidData(format!("invalid payload for book {id}: {err}"))
    })?;
    if book.id != id {
        return Err(GatewayError::InvalidData(format!(
            "payload id {} does not match row id {id}",
            book.id
        )));
    }
    book.custom_order = Some(sort_order);
    Ok(book)
}
