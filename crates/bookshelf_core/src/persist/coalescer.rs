//! Write coalescer between the record store and a storage gateway.
//!
//! # Responsibility
//! - Accept persistence intents without ever blocking the caller.
//! - Collapse bursts of intents per id into one write carrying the latest
//!   snapshot, and bursts of reorders into one order write.
//! - Execute gateway calls strictly one after another, in scheduling order.
//! - Drain everything immediately on forced flush.
//!
//! # Invariants
//! - At most one pending snapshot per id; the latest one wins.
//! - A remove cancels the pending snapshot for its id before any write.
//! - The edit window is fixed from the first pending snapshot; later edits
//!   join the batch without moving its deadline.
//! - An order write is never dispatched ahead of pending snapshots.
//! - Ids storage never saw produce no gateway call on remove.
//! - A failed gateway call is logged and counted; the chain continues.

use crate::config::CoalescerConfig;
use crate::gateway::StorageGateway;
use crate::model::book::{Book, BookId};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Outcome of one drain of pending writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Record snapshots written.
    pub saved: usize,
    /// Order snapshots written.
    pub orders: usize,
    /// Gateway calls that failed during the drain.
    pub failed: usize,
}

impl FlushReport {
    fn absorb(&mut self, other: FlushReport) {
        self.saved += other.saved;
        self.orders += other.orders;
        self.failed += other.failed;
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

enum Command {
    Save(Box<Book>),
    Remove(BookId),
    SaveOrder(Vec<BookId>),
    Flush(oneshot::Sender<FlushReport>),
    Shutdown(oneshot::Sender<FlushReport>),
}

/// Handle to the serial persistence task.
///
/// Dropping the handle closes the queue; the task drains what is pending and
/// exits.
pub struct WriteCoalescer {
    tx: mpsc::UnboundedSender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl WriteCoalescer {
    /// Spawns the persistence task on the current tokio runtime.
    ///
    /// `stored_order` is the order storage currently holds; its ids are the
    /// ids storage is known to contain.
    pub fn spawn(
        gateway: Arc<dyn StorageGateway>,
        config: CoalescerConfig,
        stored_order: Vec<BookId>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            gateway,
            edit_window: config.edit_window(),
            order_window: config.order_window(),
            pending_saves: Vec::new(),
            save_deadline: None,
            pending_order: None,
            order_deadline: None,
            known_ids: stored_order.iter().copied().collect(),
            last_order: Some(stored_order),
        };
        let handle = tokio::spawn(worker.run(rx));
        Self {
            tx,
            worker: Some(handle),
        }
    }

    /// Schedules a debounced write of `book`.
    pub fn schedule_save(&self, book: Book) {
        self.send(Command::Save(Box::new(book)), "save");
    }

    /// Cancels any pending write for `id` and schedules its deletion.
    pub fn schedule_remove(&self, id: BookId) {
        self.send(Command::Remove(id), "remove");
    }

    /// Schedules a debounced write of the full collection order.
    pub fn schedule_order(&self, ids: Vec<BookId>) {
        self.send(Command::SaveOrder(ids), "order");
    }

    /// Drains every pending write, bypassing debounce windows.
    ///
    /// Resolves once the drain has completed against the gateway.
    pub async fn flush(&self) -> FlushReport {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(ack_tx)).is_err() {
            warn!("event=coalescer_flush module=persist status=skipped reason=closed");
            return FlushReport::default();
        }
        ack_rx.await.unwrap_or_default()
    }

    /// Drains pending writes and stops the persistence task.
    pub async fn shutdown(mut self) -> FlushReport {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Shutdown(ack_tx)).is_err() {
            return FlushReport::default();
        }
        let report = ack_rx.await.unwrap_or_default();
        if let Some(worker) = self.worker.take() {
            if let Err(err) = worker.await {
                error!("event=coalescer_shutdown module=persist status=error error={err}");
            }
        }
        report
    }

    fn send(&self, command: Command, kind: &'static str) {
        if self.tx.send(command).is_err() {
            error!("event=coalescer_enqueue module=persist status=error kind={kind} reason=closed");
        }
    }
}

struct Worker {
    gateway: Arc<dyn StorageGateway>,
    edit_window: Duration,
    order_window: Duration,
    pending_saves: Vec<Book>,
    save_deadline: Option<Instant>,
    pending_order: Option<Vec<BookId>>,
    order_deadline: Option<Instant>,
    known_ids: HashSet<BookId>,
    last_order: Option<Vec<BookId>>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        debug!("event=coalescer_start module=persist status=ok");
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                biased;
                command = rx.recv() => match command {
                    Some(command) => {
                        if !self.handle(command).await {
                            break;
                        }
                    }
                    None => {
                        self.drain().await;
                        break;
                    }
                },
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.flush_due(Instant::now()).await;
                }
            }
        }
        debug!("event=coalescer_stop module=persist status=ok");
    }

    fn next_deadline(&self) -> Option<Instant> {
        match (self.save_deadline, self.order_deadline) {
            (Some(save), Some(order)) => Some(save.min(order)),
            (save, order) => save.or(order),
        }
    }

    /// Applies one command. Returns `false` once the task should stop.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Save(book) => {
                let book = *book;
                match self.pending_saves.iter_mut().find(|pending| pending.id == book.id) {
                    Some(slot) => *slot = book,
                    None => self.pending_saves.push(book),
                }
                if self.save_deadline.is_none() {
                    self.save_deadline = Some(Instant::now() + self.edit_window);
                }
            }
            Command::Remove(id) => self.remove(id).await,
            Command::SaveOrder(ids) => {
                self.pending_order = Some(ids);
                self.order_deadline = Some(Instant::now() + self.order_window);
            }
            Command::Flush(ack) => {
                let report = self.drain().await;
                let _ = ack.send(report);
            }
            Command::Shutdown(ack) => {
                let report = self.drain().await;
                let _ = ack.send(report);
                return false;
            }
        }
        true
    }

    async fn remove(&mut self, id: BookId) {
        let before = self.pending_saves.len();
        self.pending_saves.retain(|pending| pending.id != id);
        if self.pending_saves.len() != before {
            debug!("event=coalescer_cancel module=persist status=ok id={id}");
        }
        if self.pending_saves.is_empty() {
            self.save_deadline = None;
        }
        if let Some(order) = self.pending_order.as_mut() {
            order.retain(|pending| *pending != id);
        }

        if !self.known_ids.remove(&id) {
            debug!("event=gateway_remove module=persist status=skipped reason=never_persisted id={id}");
            return;
        }
        if let Err(err) = self.gateway.remove_one(id).await {
            warn!("event=gateway_remove module=persist status=error id={id} error={err}");
        }
    }

    async fn flush_due(&mut self, now: Instant) {
        let mut report = FlushReport::default();
        let saves_due = self.save_deadline.is_some_and(|deadline| deadline <= now);
        let order_due = self.order_deadline.is_some_and(|deadline| deadline <= now);
        // Ids in the order must exist in storage before their positions do.
        if saves_due || (order_due && !self.pending_saves.is_empty()) {
            report.absorb(self.flush_saves().await);
        }
        if order_due {
            report.absorb(self.flush_order().await);
        }
        if !report.is_empty() {
            info!(
                "event=coalescer_flush module=persist status=ok trigger=debounce saved={} orders={} failed={}",
                report.saved, report.orders, report.failed
            );
        }
    }

    async fn drain(&mut self) -> FlushReport {
        let mut report = self.flush_saves().await;
        report.absorb(self.flush_order().await);
        info!(
            "event=coalescer_flush module=persist status=ok trigger=forced saved={} orders={} failed={}",
            report.saved, report.orders, report.failed
        );
        report
    }

    async fn flush_saves(&mut self) -> FlushReport {
        self.save_deadline = None;
        let batch = std::mem::take(&mut self.pending_saves);
        let mut report = FlushReport::default();
        for book in batch {
            // Counted as known before the call: a failed upsert may still have landed.
            self.known_ids.insert(book.id);
            match self.gateway.save_one(&book).await {
                Ok(()) => report.saved += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(
                        "event=gateway_save module=persist status=error id={} error={err}",
                        book.id
                    );
                }
            }
        }
        report
    }

    async fn flush_order(&mut self) -> FlushReport {
        self.order_deadline = None;
        let mut report = FlushReport::default();
        let Some(order) = self.pending_order.take() else {
            return report;
        };
        if self.last_order.as_ref() == Some(&order) {
            debug!("event=gateway_save_order module=persist status=skipped reason=unchanged");
            return report;
        }
        match self.gateway.save_order(&order).await {
            Ok(()) => {
                report.orders += 1;
                self.last_order = Some(order);
            }
            Err(err) => {
                report.failed += 1;
                self.last_order = None;
                warn!(
                    "event=gateway_save_order module=persist status=error count={} error={err}",
                    order.len()
                );
            }
        }
        report
    }
}
