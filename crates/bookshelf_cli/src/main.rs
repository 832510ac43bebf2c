//! Command-line front end for a local bookshelf database.
//!
//! # Responsibility
//! - Open a SQLite-backed record store, apply one command, and close it.
//! - Keep output deterministic and line-oriented.
//!
//! # Invariants
//! - Every mutating command closes the store, so pending writes are drained
//!   before the process exits.

use bookshelf_core::{
    core_version, default_log_level, init_logging, ping, Book, BookId, BookPatch, CoreConfig,
    ReadingStatus, RecordStore, SqliteGateway, StorageGateway,
};
use log::error;
use std::process::ExitCode;
use std::sync::Arc;

const USAGE: &str = "usage:
  bookshelf ping
  bookshelf <db> list
  bookshelf <db> add <title> [pages]
  bookshelf <db> status <ref> <not_started|reading|finished|abandoned>
  bookshelf <db> page <ref> <page>
  bookshelf <db> remove <ref>
  bookshelf <db> move <ref> <position>

<ref> is a 1-based list position or a book id.
env: BOOKSHELF_LOG_DIR enables file logging, BOOKSHELF_CONFIG points to a JSON config.";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_command module=cli status=error error={message}");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &[String]) -> Result<(), String> {
    let Some((first, rest)) = args.split_first() else {
        return Err(USAGE.to_string());
    };
    if first == "ping" {
        println!("bookshelf_core ping={}", ping());
        println!("bookshelf_core version={}", core_version());
        return Ok(());
    }

    if let Ok(log_dir) = std::env::var("BOOKSHELF_LOG_DIR") {
        init_logging(default_log_level(), &log_dir)?;
    }
    let config = load_config()?;
    let gateway = SqliteGateway::open(first).map_err(|err| err.to_string())?;
    let gateway: Arc<dyn StorageGateway> = Arc::new(gateway);
    let opened = RecordStore::open(gateway, config.coalescer).await;
    if let Some(err) = opened.load_error {
        return Err(format!("failed to load {first}: {err}"));
    }
    let mut store = opened.store;

    let outcome = apply_command(&mut store, rest);
    let report = store.close().await;
    if report.failed > 0 {
        return Err(format!("{} write(s) failed", report.failed));
    }
    outcome
}

fn load_config() -> Result<CoreConfig, String> {
    match std::env::var("BOOKSHELF_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|err| format!("cannot read config {path}: {err}"))?;
            CoreConfig::from_json_str(&raw).map_err(|err| err.to_string())
        }
        Err(_) => Ok(CoreConfig::default()),
    }
}

fn apply_command(store: &mut RecordStore, args: &[String]) -> Result<(), String> {
    let words: Vec<&str> = args.iter().map(String::as_str).collect();
    match words.as_slice() {
        ["list"] | [] => {
            for (index, book) in store.books().iter().enumerate() {
                println!("{}", describe(index, book));
            }
        }
        ["add", title] => add(store, Book::new(*title))?,
        ["add", title, pages] => {
            let pages = parse_number(pages, "pages")?;
            add(store, Book::new(*title).with_pages(pages))?;
        }
        ["status", reference, status] => {
            let id = resolve(store, reference)?;
            let status = ReadingStatus::parse(status)
                .ok_or_else(|| format!("unknown status `{status}`"))?;
            let book = store
                .update(id, &BookPatch::status(status))
                .map_err(|err| err.to_string())?;
            println!("{}", book.status.as_str());
        }
        ["page", reference, page] => {
            let id = resolve(store, reference)?;
            let page = parse_number(page, "page")?;
            let book = store
                .update(id, &BookPatch::current_page(page))
                .map_err(|err| err.to_string())?;
            println!("page {}", book.current_page);
        }
        ["remove", reference] => {
            let id = resolve(store, reference)?;
            let removed = store.remove(id).map_err(|err| err.to_string())?;
            println!("removed {}", removed.title);
        }
        ["move", reference, position] => {
            let id = resolve(store, reference)?;
            let target = parse_position(position, store.len().saturating_sub(1))?;
            let mut order = store.ids();
            order.retain(|candidate| *candidate != id);
            order.insert(target, id);
            let changed = store.reorder(order).map_err(|err| err.to_string())?;
            println!("{}", if changed { "moved" } else { "unchanged" });
        }
        _ => return Err(USAGE.to_string()),
    }
    Ok(())
}

fn add(store: &mut RecordStore, book: Book) -> Result<(), String> {
    let id = store.add(book).map_err(|err| err.to_string())?;
    println!("added {id}");
    Ok(())
}

fn describe(index: usize, book: &Book) -> String {
    let progress = book
        .progress_percent()
        .map_or_else(|| format!("p{}", book.current_page), |percent| format!("{percent}%"));
    format!(
        "{:>3}. {} [{}] {} {}",
        index + 1,
        book.title,
        book.status.as_str(),
        progress,
        book.id
    )
}

fn resolve(store: &RecordStore, reference: &str) -> Result<BookId, String> {
    if let Ok(id) = reference.parse::<BookId>() {
        return store
            .get(id)
            .map(|book| book.id)
            .ok_or_else(|| format!("no book with id {id}"));
    }
    let index = parse_position(reference, store.len().saturating_sub(1))?;
    store
        .books()
        .get(index)
        .map(|book| book.id)
        .ok_or_else(|| "the shelf is empty".to_string())
}

/// Parses a 1-based position and returns it 0-based, bounded by `max_index`.
fn parse_position(value: &str, max_index: usize) -> Result<usize, String> {
    let position: usize = parse_number(value, "position")?;
    if position == 0 || position - 1 > max_index {
        return Err(format!("position {position} is out of range"));
    }
    Ok(position - 1)
}

fn parse_number<T: std::str::FromStr>(value: &str, what: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("invalid {what} `{value}`"))
}

#[cfg(test)]
mod tests {
    use super::parse_position;

    #[test]
    fn positions_are_one_based_and_bounded() {
        assert_eq!(parse_position("1", 2), Ok(0));
        assert_eq!(parse_position("3", 2), Ok(2));
        assert!(parse_position("0", 2).is_err());
        assert!(parse_position("4", 2).is_err());
        assert!(parse_position("x", 2).is_err());
    }
}
