//! In-process messenger: bounded blocking queues backed by `tokio::sync`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conveyor_core::{Document, Event};
use tokio::sync::{Mutex, Notify, Semaphore};

use crate::error::MessengerError;
use crate::traits::{Destination, Events, Messenger, Source};

struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
    capacity: Option<Arc<Semaphore>>,
}

impl<T> BoundedQueue<T> {
    fn new(capacity: Option<usize>) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            capacity: capacity.map(|c| Arc::new(Semaphore::new(c))),
        }
    }

    async fn push(&self, item: T) {
        if let Some(sem) = &self.capacity {
            // acquire_owned would require Arc<Self>; a permit forgotten here
            // is released explicitly on pop below.
            let permit = sem.clone().acquire_owned().await.expect("semaphore never closed");
            permit.forget();
        }
        self.items.lock().await.push_back(item);
        self.notify.notify_one();
    }

    async fn poll(&self, timeout: Duration) -> Option<T> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut items = self.items.lock().await;
                if let Some(item) = items.pop_front() {
                    drop(items);
                    if let Some(sem) = &self.capacity {
                        sem.add_permits(1);
                    }
                    return Some(item);
                }
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }
    }

    async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }
}

/// All-in-one-process messenger: no durability, no broker dependency. The
/// only backpressure point is the source queue when `queue_capacity` is set.
pub struct InMemoryMessenger {
    source: BoundedQueue<Document>,
    destination: BoundedQueue<Document>,
    events: BoundedQueue<Event>,
}

impl InMemoryMessenger {
    pub fn new(queue_capacity: Option<usize>) -> Self {
        Self {
            source: BoundedQueue::new(queue_capacity),
            destination: BoundedQueue::new(None),
            events: BoundedQueue::new(None),
        }
    }
}

impl Default for InMemoryMessenger {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Source for InMemoryMessenger {
    async fn poll_doc(&self, timeout: Duration) -> Result<Option<Document>, MessengerError> {
        Ok(self.source.poll(timeout).await)
    }

    async fn send_for_processing(&self, doc: Document) -> Result<(), MessengerError> {
        self.source.push(doc).await;
        Ok(())
    }
}

#[async_trait]
impl Destination for InMemoryMessenger {
    async fn send_completed(&self, doc: Document) -> Result<(), MessengerError> {
        self.destination.push(doc).await;
        Ok(())
    }

    async fn poll_completed(&self, timeout: Duration) -> Result<Option<Document>, MessengerError> {
        Ok(self.destination.poll(timeout).await)
    }
}

#[async_trait]
impl Events for InMemoryMessenger {
    async fn send_event(&self, event: Event) -> Result<(), MessengerError> {
        self.events.push(event).await;
        Ok(())
    }

    async fn poll_event(&self, timeout: Duration) -> Result<Option<Event>, MessengerError> {
        Ok(self.events.poll(timeout).await)
    }

    async fn has_events(&self) -> bool {
        !self.events.is_empty().await
    }
}

#[async_trait]
impl Messenger for InMemoryMessenger {
    async fn commit_pending_offsets(&self) -> Result<(), MessengerError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), MessengerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::Document;

    #[tokio::test]
    async fn send_then_poll_roundtrips() {
        let m = InMemoryMessenger::default();
        m.send_for_processing(Document::create("d1")).await.unwrap();
        let doc = m.poll_doc(Duration::from_millis(100)).await.unwrap();
        assert_eq!(doc.unwrap().id(), "d1");
    }

    #[tokio::test]
    async fn poll_times_out_when_empty() {
        let m = InMemoryMessenger::default();
        let doc = m.poll_doc(Duration::from_millis(20)).await.unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn bounded_queue_blocks_until_space() {
        let m = Arc::new(InMemoryMessenger::new(Some(1)));
        m.send_for_processing(Document::create("d1")).await.unwrap();

        let m2 = m.clone();
        let handle = tokio::spawn(async move {
            m2.send_for_processing(Document::create("d2")).await.unwrap();
        });

        // Not yet drained — d2's send should still be pending.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        // Draining d1 frees a permit, letting d2's send complete.
        m.poll_doc(Duration::from_millis(100)).await.unwrap();
        handle.await.unwrap();

        let doc = m.poll_doc(Duration::from_millis(100)).await.unwrap();
        assert_eq!(doc.unwrap().id(), "d2");
    }

    #[tokio::test]
    async fn has_events_reflects_buffer_state() {
        let m = InMemoryMessenger::default();
        assert!(!m.has_events().await);
        m.send_event(Event::finish("d1", "r1")).await.unwrap();
        assert!(m.has_events().await);
        m.poll_event(Duration::from_millis(100)).await.unwrap();
        assert!(!m.has_events().await);
    }
}
