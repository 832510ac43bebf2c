use bookshelf_core::{
    Book, CoalescerConfig, FlushReport, GatewayCall, MemoryGateway, StorageGateway,
    WriteCoalescer,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn spawn(gateway: &Arc<MemoryGateway>) -> WriteCoalescer {
    let stored_order = gateway.stored_ids();
    let dyn_gateway: Arc<dyn StorageGateway> = gateway.clone();
    WriteCoalescer::spawn(dyn_gateway, CoalescerConfig::default(), stored_order)
}

fn titled(book: &Book, title: &str) -> Book {
    let mut next = book.clone();
    next.title = title.to_string();
    next
}

#[tokio::test(start_paused = true)]
async fn burst_of_edits_writes_once_with_latest_snapshot() {
    let gateway = Arc::new(MemoryGateway::new());
    let coalescer = spawn(&gateway);
    let book = Book::new("draft");

    for revision in 0..5 {
        coalescer.schedule_save(titled(&book, &format!("rev {revision}")));
    }

    sleep(ms(119)).await;
    assert!(gateway.calls().is_empty());

    sleep(ms(2)).await;
    let calls = gateway.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], GatewayCall::SaveOne(titled(&book, "rev 4")));
    assert_eq!(gateway.stored(book.id).unwrap().title, "rev 4");
}

#[tokio::test(start_paused = true)]
async fn edit_window_is_fixed_from_the_first_pending_edit() {
    let gateway = Arc::new(MemoryGateway::new());
    let coalescer = spawn(&gateway);
    let book = Book::new("draft");

    coalescer.schedule_save(titled(&book, "first"));
    sleep(ms(100)).await;
    coalescer.schedule_save(titled(&book, "second"));
    sleep(ms(19)).await;
    assert!(gateway.calls().is_empty());

    sleep(ms(2)).await;
    assert_eq!(gateway.calls(), vec![GatewayCall::SaveOne(titled(&book, "second"))]);
}

#[tokio::test(start_paused = true)]
async fn busy_record_does_not_starve_a_quiet_one() {
    let gateway = Arc::new(MemoryGateway::new());
    let coalescer = spawn(&gateway);
    let busy = Book::new("busy");
    let quiet = Book::new("quiet");

    coalescer.schedule_save(titled(&busy, "busy 0"));
    sleep(ms(10)).await;
    coalescer.schedule_save(quiet.clone());
    for tick in 1..12 {
        sleep(ms(50)).await;
        coalescer.schedule_save(titled(&busy, &format!("busy {tick}")));
        if tick == 3 {
            // 160ms in: the first batch went out at 120ms.
            assert_eq!(gateway.stored(quiet.id), Some(quiet.clone()));
        }
    }
    sleep(ms(100)).await;

    // Edits every 50ms still land once per window.
    let busy_writes = gateway.calls_for(busy.id).len();
    assert!(busy_writes >= 4, "busy record written {busy_writes} times");
    assert_eq!(gateway.calls_for(quiet.id).len(), 1);

    coalescer.flush().await;
    assert_eq!(gateway.stored(busy.id).unwrap().title, "busy 11");
}

#[tokio::test(start_paused = true)]
async fn distinct_records_are_written_in_first_scheduled_order() {
    let gateway = Arc::new(MemoryGateway::new());
    let coalescer = spawn(&gateway);
    let a = Book::new("a");
    let b = Book::new("b");
    let c = Book::new("c");

    coalescer.schedule_save(a.clone());
    coalescer.schedule_save(b.clone());
    coalescer.schedule_save(c.clone());
    coalescer.schedule_save(titled(&a, "a2"));

    sleep(ms(200)).await;
    let written: Vec<_> = gateway
        .calls()
        .iter()
        .filter_map(GatewayCall::book_id)
        .collect();
    assert_eq!(written, vec![a.id, b.id, c.id]);
    assert_eq!(gateway.stored(a.id).unwrap().title, "a2");
}

#[tokio::test(start_paused = true)]
async fn remove_before_first_write_makes_no_gateway_call() {
    let gateway = Arc::new(MemoryGateway::new());
    let coalescer = spawn(&gateway);
    let book = Book::new("short lived");

    coalescer.schedule_save(book.clone());
    sleep(ms(50)).await;
    coalescer.schedule_remove(book.id);

    sleep(ms(500)).await;
    assert!(gateway.calls().is_empty());
    assert_eq!(coalescer.flush().await, FlushReport::default());
}

#[tokio::test(start_paused = true)]
async fn remove_of_stored_record_cancels_pending_save() {
    let stored = Book::new("stored");
    let gateway = Arc::new(MemoryGateway::with_books(vec![stored.clone()]));
    let coalescer = spawn(&gateway);

    coalescer.schedule_save(titled(&stored, "edited"));
    coalescer.schedule_remove(stored.id);

    sleep(ms(500)).await;
    assert_eq!(gateway.calls(), vec![GatewayCall::RemoveOne(stored.id)]);
    assert!(gateway.stored_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn forced_flush_writes_everything_without_waiting() {
    let gateway = Arc::new(MemoryGateway::new());
    let coalescer = spawn(&gateway);
    let books: Vec<Book> = (0..4).map(|index| Book::new(format!("book {index}"))).collect();
    for book in &books {
        coalescer.schedule_save(book.clone());
    }
    coalescer.schedule_order(books.iter().map(|book| book.id).collect());

    let started = tokio::time::Instant::now();
    let report = coalescer.flush().await;
    assert!(started.elapsed() < ms(120));
    assert_eq!(
        report,
        FlushReport {
            saved: 4,
            orders: 1,
            failed: 0
        }
    );

    let calls = gateway.calls();
    assert_eq!(calls.len(), 5);
    assert!(matches!(calls[4], GatewayCall::SaveOrder(_)));

    // Nothing left for the debounce timers.
    sleep(ms(1_000)).await;
    assert_eq!(gateway.calls().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn failed_write_does_not_stop_the_chain() {
    let gateway = Arc::new(MemoryGateway::new());
    let coalescer = spawn(&gateway);
    let a = Book::new("a");
    let b = Book::new("b");
    let c = Book::new("c");
    gateway.fail_writes_for(b.id);

    coalescer.schedule_save(a.clone());
    coalescer.schedule_save(b.clone());
    coalescer.schedule_save(c.clone());
    let report = coalescer.flush().await;

    assert_eq!(report.saved, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(gateway.stored_ids(), vec![a.id, c.id]);

    coalescer.schedule_save(titled(&c, "c2"));
    assert_eq!(coalescer.flush().await.saved, 1);
    assert_eq!(gateway.stored(c.id).unwrap().title, "c2");
}

#[tokio::test(start_paused = true)]
async fn slow_write_is_not_overtaken_by_a_newer_snapshot() {
    let gateway = Arc::new(MemoryGateway::new());
    gateway.set_latency(ms(50));
    let coalescer = spawn(&gateway);
    let book = Book::new("v1");

    coalescer.schedule_save(book.clone());
    // First write starts at 120ms and lands at 170ms.
    sleep(ms(130)).await;
    coalescer.schedule_save(titled(&book, "v2"));

    sleep(ms(20)).await;
    assert_eq!(gateway.calls().len(), 1);
    assert!(gateway.stored(book.id).is_none());

    sleep(ms(500)).await;
    assert_eq!(
        gateway.calls(),
        vec![
            GatewayCall::SaveOne(book.clone()),
            GatewayCall::SaveOne(titled(&book, "v2")),
        ]
    );
    assert_eq!(gateway.stored(book.id).unwrap().title, "v2");
}

#[tokio::test(start_paused = true)]
async fn order_bursts_collapse_to_the_final_order() {
    let books: Vec<Book> = ["a", "b", "c"].into_iter().map(Book::new).collect();
    let ids: Vec<_> = books.iter().map(|book| book.id).collect();
    let gateway = Arc::new(MemoryGateway::with_books(books));
    let coalescer = spawn(&gateway);

    coalescer.schedule_order(vec![ids[1], ids[0], ids[2]]);
    sleep(ms(200)).await;
    coalescer.schedule_order(vec![ids[2], ids[1], ids[0]]);
    sleep(ms(200)).await;
    assert!(gateway.order_calls().is_empty());

    sleep(ms(100)).await;
    assert_eq!(gateway.order_calls(), vec![vec![ids[2], ids[1], ids[0]]]);
    assert_eq!(gateway.stored_ids(), vec![ids[2], ids[1], ids[0]]);
}

#[tokio::test(start_paused = true)]
async fn due_order_waits_for_pending_snapshots() {
    let stored = Book::new("stored");
    let gateway = Arc::new(MemoryGateway::with_books(vec![stored.clone()]));
    let coalescer = spawn(&gateway);
    let fresh = Book::new("fresh");

    // Order window ends at 250ms; the snapshot's edit window ends at 320ms.
    coalescer.schedule_order(vec![fresh.id, stored.id]);
    sleep(ms(200)).await;
    coalescer.schedule_save(fresh.clone());

    sleep(ms(60)).await;
    assert_eq!(
        gateway.calls(),
        vec![
            GatewayCall::SaveOne(fresh.clone()),
            GatewayCall::SaveOrder(vec![fresh.id, stored.id]),
        ]
    );
    assert_eq!(gateway.stored_ids(), vec![fresh.id, stored.id]);

    sleep(ms(500)).await;
    assert_eq!(gateway.calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn order_equal_to_stored_order_is_skipped() {
    let books: Vec<Book> = ["a", "b"].into_iter().map(Book::new).collect();
    let ids: Vec<_> = books.iter().map(|book| book.id).collect();
    let gateway = Arc::new(MemoryGateway::with_books(books));
    let coalescer = spawn(&gateway);

    coalescer.schedule_order(vec![ids[1], ids[0]]);
    coalescer.schedule_order(ids.clone());

    sleep(ms(500)).await;
    assert!(gateway.order_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_drains_pending_writes() {
    let gateway = Arc::new(MemoryGateway::new());
    let coalescer = spawn(&gateway);
    let book = Book::new("left behind");

    coalescer.schedule_save(book.clone());
    drop(coalescer);

    sleep(ms(1)).await;
    assert_eq!(gateway.stored_ids(), vec![book.id]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_reports_the_final_drain() {
    let gateway = Arc::new(MemoryGateway::new());
    let coalescer = spawn(&gateway);
    coalescer.schedule_save(Book::new("a"));
    coalescer.schedule_save(Book::new("b"));

    let report = coalescer.shutdown().await;
    assert_eq!(report.saved, 2);
    assert_eq!(gateway.stored_books().len(), 2);
}
