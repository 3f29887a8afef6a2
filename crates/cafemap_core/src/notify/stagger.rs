//! Deferred emission of notification bursts.
//!
//! Callers enqueue a batch; entry `i` is due `i * step` after enqueue time.
//! One scheduler task owns every pending entry and posts each one to the
//! [`NotificationQueue`] when it falls due, so "what to emit" stays separate
//! from "when".
//!
//! # Invariants
//! - Entries of one batch are posted in batch order.
//! - Entries from different batches are posted by due time, ties by enqueue order.
//! - After `close`, nothing pending is ever posted.

use super::{NotificationKind, NotificationQueue};
use log::debug;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

#[derive(Debug)]
struct Scheduled {
    due: Instant,
    seq: u64,
    message: String,
    kind: NotificationKind,
}

// BinaryHeap is a max-heap; invert so the earliest (due, seq) pops first.
impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

pub struct StaggeredEmitter {
    tx: Mutex<Option<mpsc::UnboundedSender<Scheduled>>>,
    next_seq: Mutex<u64>,
    step: Duration,
}

impl StaggeredEmitter {
    /// Starts the scheduler task feeding `queue`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(queue: NotificationQueue, step: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_scheduler(queue, rx));
        Self {
            tx: Mutex::new(Some(tx)),
            next_seq: Mutex::new(0),
            step,
        }
    }

    /// Enqueues a batch; returns how many entries were accepted.
    ///
    /// Returns 0 after `close`.
    pub fn enqueue_batch<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (String, NotificationKind)>,
    {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else {
            return 0;
        };

        let base = Instant::now();
        let mut seq = self.next_seq.lock().unwrap_or_else(PoisonError::into_inner);
        let mut accepted = 0;
        for (index, (message, kind)) in entries.into_iter().enumerate() {
            let offset = self.step * u32::try_from(index).unwrap_or(u32::MAX);
            let scheduled = Scheduled {
                due: base + offset,
                seq: *seq,
                message,
                kind,
            };
            *seq += 1;
            if tx.send(scheduled).is_err() {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Stops the scheduler and drops everything still pending.
    pub fn close(&self) {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn step(&self) -> Duration {
        self.step
    }
}

async fn run_scheduler(queue: NotificationQueue, mut rx: mpsc::UnboundedReceiver<Scheduled>) {
    let mut pending: BinaryHeap<Scheduled> = BinaryHeap::new();

    loop {
        let next_due = pending.peek().map(|scheduled| scheduled.due);
        tokio::select! {
            received = rx.recv() => match received {
                Some(scheduled) => pending.push(scheduled),
                None => break,
            },
            _ = sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                let now = Instant::now();
                while pending.peek().is_some_and(|scheduled| scheduled.due <= now) {
                    if let Some(scheduled) = pending.pop() {
                        queue.push(scheduled.message, scheduled.kind);
                    }
                }
            }
        }
    }

    debug!(
        "event=stagger_stop module=notify status=ok dropped_pending={}",
        pending.len()
    );
}

#[cfg(test)]
mod tests {
    use super::StaggeredEmitter;
    use crate::notify::{NotificationKind, NotificationQueue};
    use std::time::Duration;

    const STEP: Duration = Duration::from_millis(600);
    const TTL: Duration = Duration::from_millis(4_000);

    fn batch(names: &[&str]) -> Vec<(String, NotificationKind)> {
        names
            .iter()
            .map(|name| (name.to_string(), NotificationKind::NewItem))
            .collect()
    }

    fn messages(queue: &NotificationQueue) -> Vec<String> {
        queue.live().into_iter().map(|n| n.message).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn batch_entries_are_posted_one_step_apart_in_order() {
        let queue = NotificationQueue::new(TTL);
        let emitter = StaggeredEmitter::spawn(queue.clone(), STEP);

        assert_eq!(emitter.enqueue_batch(batch(&["A", "B", "C"])), 3);

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(messages(&queue), vec!["A"]);

        tokio::time::sleep(STEP).await;
        assert_eq!(messages(&queue), vec!["A", "B"]);

        tokio::time::sleep(STEP).await;
        assert_eq!(messages(&queue), vec!["A", "B", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn later_batch_interleaves_by_due_time() {
        let queue = NotificationQueue::new(TTL);
        let emitter = StaggeredEmitter::spawn(queue.clone(), STEP);

        emitter.enqueue_batch(batch(&["A1", "A2", "A3"]));
        tokio::time::sleep(Duration::from_millis(700)).await;
        emitter.enqueue_batch(batch(&["B1", "B2"]));

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        // A1@0 A2@600 B1@700 A3@1200 B2@1300
        assert_eq!(messages(&queue), vec!["A1", "A2", "B1", "A3", "B2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn close_drops_pending_entries() {
        let queue = NotificationQueue::new(TTL);
        let emitter = StaggeredEmitter::spawn(queue.clone(), STEP);

        emitter.enqueue_batch(batch(&["A", "B", "C"]));
        tokio::time::sleep(Duration::from_millis(1)).await;
        emitter.close();
        tokio::time::sleep(STEP * 3).await;

        assert_eq!(messages(&queue), vec!["A"]);
        assert_eq!(emitter.enqueue_batch(batch(&["late"])), 0);
    }
}
