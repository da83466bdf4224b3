//! Notification hub: fan-out of task events to subscribed listeners
//!
//! Each listener owns a bounded buffer. `publish` never blocks: a listener whose buffer is
//! full or whose receiver was dropped is removed, and delivery to the others continues.
//! Events for one task reach every listener in publish order.

use crate::types::Event;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Handle identifying one subscription
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ListenerId(pub u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiving side of a subscription
#[derive(Debug)]
pub struct Subscription {
    id: ListenerId,
    receiver: mpsc::Receiver<Event>,
}

impl Subscription {
    /// Listener handle for [`NotificationHub::unsubscribe`]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Next event, or `None` once the listener was removed from the hub
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Next event if one is already buffered
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    /// Convert into a `Stream` of events
    pub fn into_stream(self) -> ReceiverStream<Event> {
        ReceiverStream::new(self.receiver)
    }
}

/// Registry of listeners
#[derive(Debug)]
pub struct NotificationHub {
    listeners: Mutex<HashMap<ListenerId, mpsc::Sender<Event>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl NotificationHub {
    /// Create a hub whose listeners each buffer up to `buffer` events
    pub fn new(buffer: usize) -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Register a new listener
    pub fn subscribe(&self) -> Subscription {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.buffer);
        self.lock().insert(id, tx);
        tracing::debug!(listener_id = id.0, "listener subscribed");
        Subscription { id, receiver: rx }
    }

    /// Remove a listener; returns false if it was already gone
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            tracing::debug!(listener_id = id.0, "listener unsubscribed");
        }
        removed
    }

    /// Deliver `event` to every current listener
    pub fn publish(&self, event: Event) {
        let mut listeners = self.lock();
        listeners.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(listener_id = id.0, "listener buffer full, dropping listener");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(listener_id = id.0, "listener closed, removing");
                false
            }
        });
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    // A poisoned lock only means a publisher panicked mid-iteration; the map is still usable.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ListenerId, mpsc::Sender<Event>>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Progress, Status, TaskId};
    use futures::StreamExt;

    fn status_event(id: i64, status: Status) -> Event {
        Event::Status {
            task_id: TaskId(id),
            status,
            error: None,
        }
    }

    fn progress_event(id: i64, bytes: u64) -> Event {
        Event::Progress {
            task_id: TaskId(id),
            progress: Progress {
                bytes_done: bytes,
                ..Progress::default()
            },
        }
    }

    #[tokio::test]
    async fn every_listener_receives_published_events() {
        let hub = NotificationHub::new(8);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();

        hub.publish(status_event(1, Status::Active));

        assert_eq!(a.recv().await.unwrap(), status_event(1, Status::Active));
        assert_eq!(b.recv().await.unwrap(), status_event(1, Status::Active));
    }

    #[tokio::test]
    async fn per_task_order_matches_publish_order() {
        let hub = NotificationHub::new(16);
        let mut sub = hub.subscribe();

        hub.publish(status_event(1, Status::Active));
        hub.publish(progress_event(1, 10));
        hub.publish(progress_event(2, 5));
        hub.publish(progress_event(1, 20));
        hub.publish(status_event(1, Status::Completed));

        let mut task_one = Vec::new();
        while let Some(event) = sub.try_recv() {
            if event.task_id() == TaskId(1) {
                task_one.push(event);
            }
        }
        assert_eq!(
            task_one,
            vec![
                status_event(1, Status::Active),
                progress_event(1, 10),
                progress_event(1, 20),
                status_event(1, Status::Completed),
            ]
        );
    }

    #[tokio::test]
    async fn full_listener_is_dropped_without_affecting_others() {
        let hub = NotificationHub::new(2);
        let slow = hub.subscribe();
        let mut fast = hub.subscribe();

        for i in 0..2 {
            hub.publish(progress_event(1, i));
            assert!(fast.recv().await.is_some());
        }
        // slow holds 2 buffered events; the third overflows it
        hub.publish(progress_event(1, 2));

        assert_eq!(hub.listener_count(), 1);
        assert_eq!(fast.recv().await.unwrap(), progress_event(1, 2));

        let mut slow_stream = slow.into_stream();
        assert_eq!(slow_stream.next().await.unwrap(), progress_event(1, 0));
        assert_eq!(slow_stream.next().await.unwrap(), progress_event(1, 1));
        assert!(
            slow_stream.next().await.is_none(),
            "dropped listener must see end of stream"
        );
    }

    #[tokio::test]
    async fn closed_listener_is_removed_on_publish() {
        let hub = NotificationHub::new(4);
        let sub = hub.subscribe();
        let _keep = hub.subscribe();
        drop(sub);

        hub.publish(status_event(3, Status::Paused));
        assert_eq!(hub.listener_count(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let hub = NotificationHub::new(4);
        let mut sub = hub.subscribe();

        assert!(hub.unsubscribe(sub.id()));
        assert!(!hub.unsubscribe(sub.id()));

        hub.publish(status_event(1, Status::Active));
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn listener_ids_are_unique() {
        let hub = NotificationHub::default();
        let a = hub.subscribe();
        let b = hub.subscribe();
        assert_ne!(a.id(), b.id());
    }
}
