//! Ephemeral UI notifications.
//!
//! # Responsibility
//! - Keep the live set of toast messages in insertion order.
//! - Remove each message automatically once its TTL elapses.
//! - Publish `Posted` / `Expired` events to any number of subscribers.
//!
//! # Invariants
//! - Notification ids are unique for the lifetime of the queue.
//! - `remove` is idempotent; `Expired` is published at most once per id.
//! - Expiry timers never touch a queue whose owner has dropped it.

pub mod stagger;

use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;

pub use stagger::StaggeredEmitter;

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub type NotificationId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Info,
    Error,
    Success,
    NewItem,
}

impl NotificationKind {
    /// Stable label used across the FFI boundary.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Error => "error",
            Self::Success => "success",
            Self::NewItem => "new_item",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub kind: NotificationKind,
    pub created_at: Instant,
}

/// Change feed for rendering layers.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    Posted(Notification),
    Expired(NotificationId),
}

struct QueueShared {
    live: Mutex<Vec<Notification>>,
    next_id: AtomicU64,
    ttl: Duration,
    events: broadcast::Sender<NotificationEvent>,
}

impl QueueShared {
    fn remove(&self, id: NotificationId) -> bool {
        let removed = {
            let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
            let before = live.len();
            live.retain(|notification| notification.id != id);
            live.len() != before
        };
        if removed {
            let _ = self.events.send(NotificationEvent::Expired(id));
        }
        removed
    }
}

/// Time-bounded queue of UI messages. Clones share the same queue.
#[derive(Clone)]
pub struct NotificationQueue {
    shared: Arc<QueueShared>,
}

impl NotificationQueue {
    pub fn new(ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(QueueShared {
                live: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                ttl,
                events,
            }),
        }
    }

    /// Appends a message and schedules its removal after the TTL.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn push(&self, message: impl Into<String>, kind: NotificationKind) -> NotificationId {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let notification = Notification {
            id,
            message: message.into(),
            kind,
            created_at: Instant::now(),
        };

        self.shared
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        let _ = self.shared.events.send(NotificationEvent::Posted(notification));
        debug!(
            "event=notification_push module=notify status=ok id={} kind={}",
            id,
            kind.as_str()
        );

        let weak: Weak<QueueShared> = Arc::downgrade(&self.shared);
        let ttl = self.shared.ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(shared) = weak.upgrade() {
                shared.remove(id);
            }
        });

        id
    }

    /// Removes a message; returns `false` when it was already gone.
    pub fn remove(&self, id: NotificationId) -> bool {
        self.shared.remove(id)
    }

    /// Snapshot of live messages in insertion order.
    pub fn live(&self) -> Vec<Notification> {
        self.shared
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.shared
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.shared.events.subscribe()
    }

    pub fn ttl(&self) -> Duration {
        self.shared.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::{NotificationEvent, NotificationKind, NotificationQueue};
    use std::time::Duration;

    const TTL: Duration = Duration::from_millis(4_000);

    #[tokio::test(start_paused = true)]
    async fn pushed_message_is_live_until_ttl_elapses() {
        let queue = NotificationQueue::new(TTL);
        let id = queue.push("Escaneo completado", NotificationKind::Success);

        assert_eq!(queue.live().len(), 1);
        assert_eq!(queue.live()[0].id, id);

        tokio::time::sleep(Duration::from_millis(3_999)).await;
        assert_eq!(queue.len(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn remove_is_idempotent_and_expiry_after_manual_removal_is_silent() {
        let queue = NotificationQueue::new(TTL);
        let mut events = queue.subscribe();
        let id = queue.push("dismiss me", NotificationKind::Info);

        assert!(queue.remove(id));
        assert!(!queue.remove(id));
        tokio::time::sleep(TTL * 2).await;

        match events.recv().await.expect("posted") {
            NotificationEvent::Posted(notification) => {
                assert_eq!(notification.id, id);
                assert_eq!(notification.message, "dismiss me");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(events.recv().await.expect("expired"), NotificationEvent::Expired(id));
        assert!(events.try_recv().is_err(), "expiry must publish once");
    }

    #[tokio::test(start_paused = true)]
    async fn ids_are_unique_and_order_is_insertion_order() {
        let queue = NotificationQueue::new(TTL);
        let first = queue.push("one", NotificationKind::Info);
        let second = queue.push("two", NotificationKind::Error);
        assert_ne!(first, second);

        let kinds: Vec<_> = queue.live().iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::Info, NotificationKind::Error]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_queue_is_not_touched_by_pending_expiry() {
        let queue = NotificationQueue::new(TTL);
        let mut events = queue.subscribe();
        queue.push("orphan", NotificationKind::Info);
        drop(queue);
        tokio::time::sleep(TTL * 2).await;

        assert!(matches!(events.recv().await, Ok(NotificationEvent::Posted(_))));
        assert!(matches!(
            events.recv().await,
            Err(tokio::sync::broadcast::error::RecvError::Closed)
        ));
    }
}
