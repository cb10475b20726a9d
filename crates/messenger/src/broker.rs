//! Broker-backed messenger: ZeroMQ PUSH/PULL for the Source and Destination
//! queues, PUB/SUB for the Event stream. Suitable for a distributed run where
//! Worker, Indexer, and Publisher live in separate processes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conveyor_core::{Document, Event};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use zeromq::{PubSocket, PullSocket, PushSocket, Socket, SocketRecv, SocketSend, SubSocket};

use crate::dedup::DedupWindow;
use crate::envelope::{Envelope, PartitionOffset};
use crate::error::MessengerError;
use crate::traits::{Destination, Events, Messenger, Source};
use crate::transport::Transport;

/// Configuration for a broker-backed messenger instance.
#[derive(Debug, Clone)]
pub struct BrokerEndpoints {
    pub source: Transport,
    pub destination: Transport,
    pub events: Transport,
}

impl BrokerEndpoints {
    pub fn local(pipeline_name: &str) -> Self {
        Self {
            source: Transport::ipc(&format!("{pipeline_name}-source")),
            destination: Transport::ipc(&format!("{pipeline_name}-destination")),
            events: Transport::ipc(&format!("{pipeline_name}-events")),
        }
    }
}

struct OffsetLedger {
    /// Offset assigned to each in-flight document id.
    in_flight: Mutex<HashMap<String, PartitionOffset>>,
    /// Offsets whose documents (and all their children) are terminal, awaiting commit.
    ready: Mutex<Vec<PartitionOffset>>,
    next_offset: AtomicU64,
}

impl OffsetLedger {
    fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            ready: Mutex::new(Vec::new()),
            next_offset: AtomicU64::new(0),
        }
    }

    fn next(&self) -> PartitionOffset {
        let offset = self.next_offset.fetch_add(1, Ordering::Relaxed);
        PartitionOffset { partition: 0, offset }
    }

    async fn track(&self, doc_id: &str, offset: PartitionOffset) {
        self.in_flight.lock().await.insert(doc_id.to_string(), offset);
    }

    async fn mark_terminal(&self, doc_id: &str) {
        if let Some(offset) = self.in_flight.lock().await.remove(doc_id) {
            self.ready.lock().await.push(offset);
        }
    }

    async fn drain_ready(&self) -> Vec<PartitionOffset> {
        std::mem::take(&mut *self.ready.lock().await)
    }
}

/// A messenger instance backed by ZeroMQ sockets. The worker binds PULL/SUB
/// ends (stable consumers); producers connect their PUSH/PUB ends to them.
pub struct BrokerMessenger {
    source_push: Mutex<PushSocket>,
    source_pull: Mutex<PullSocket>,
    dest_push: Mutex<PushSocket>,
    dest_pull: Mutex<PullSocket>,
    event_pub: Mutex<PubSocket>,
    event_sub: Mutex<SubSocket>,
    event_buffered: std::sync::atomic::AtomicUsize,
    dedup: Mutex<DedupWindow>,
    /// Documents pulled off the source queue whose dedup window hadn't yet
    /// elapsed at receive time. Re-checked on every `poll_doc` call until
    /// `DedupWindow::should_hold` clears them for delivery.
    held: Mutex<Vec<(PartitionOffset, Document)>>,
    offsets: OffsetLedger,
}

impl BrokerMessenger {
    /// Bind the consumer-side sockets (PULL for source/destination, SUB for
    /// events) and connect the producer-side sockets used by this same
    /// process to feed the next stage.
    pub async fn bind(endpoints: &BrokerEndpoints, dedup_hold: Duration) -> Result<Self, MessengerError> {
        let mut source_pull = PullSocket::new();
        source_pull.bind(&endpoints.source.endpoint()).await?;

        let mut source_push = PushSocket::new();
        source_push.connect(&endpoints.source.endpoint()).await?;

        let mut dest_pull = PullSocket::new();
        dest_pull.bind(&endpoints.destination.endpoint()).await?;

        let mut dest_push = PushSocket::new();
        dest_push.connect(&endpoints.destination.endpoint()).await?;

        let mut event_pub = PubSocket::new();
        event_pub.bind(&endpoints.events.endpoint()).await?;

        let mut event_sub = SubSocket::new();
        event_sub.connect(&endpoints.events.endpoint()).await?;
        event_sub.subscribe("").await?;

        Ok(Self {
            source_push: Mutex::new(source_push),
            source_pull: Mutex::new(source_pull),
            dest_push: Mutex::new(dest_push),
            dest_pull: Mutex::new(dest_pull),
            event_pub: Mutex::new(event_pub),
            event_sub: Mutex::new(event_sub),
            event_buffered: std::sync::atomic::AtomicUsize::new(0),
            dedup: Mutex::new(DedupWindow::new(dedup_hold)),
            held: Mutex::new(Vec::new()),
            offsets: OffsetLedger::new(),
        })
    }

    /// Offsets whose documents are terminal but not yet committed —
    /// observability seam onto the offset ledger's ready-to-commit queue.
    pub async fn pending_offset_commit_count(&self) -> usize {
        self.offsets.ready.lock().await.len()
    }

    /// Offsets still awaiting a terminal state for their document.
    pub async fn in_flight_offset_count(&self) -> usize {
        self.offsets.in_flight.lock().await.len()
    }
}

#[async_trait]
impl Source for BrokerMessenger {
    async fn poll_doc(&self, timeout: Duration) -> Result<Option<Document>, MessengerError> {
        // A document held on an earlier call may have cleared the dedup
        // window by now; release the first one that has before pulling a
        // fresh message off the socket.
        {
            let mut held = self.held.lock().await;
            let mut dedup = self.dedup.lock().await;
            if let Some(pos) = held.iter().position(|(offset, _)| !dedup.should_hold(*offset)) {
                let (offset, doc) = held.remove(pos);
                drop(dedup);
                drop(held);
                self.offsets.track(doc.id(), offset).await;
                return Ok(Some(doc));
            }
        }

        let mut socket = self.source_pull.lock().await;
        let recv = tokio::time::timeout(timeout, socket.recv()).await;
        let raw = match recv {
            Ok(Ok(msg)) => msg,
            Ok(Err(e)) => return Err(MessengerError::Zmq(e)),
            Err(_) => return Ok(None),
        };
        drop(socket);

        let bytes = raw.get(0).ok_or_else(|| MessengerError::Transport("empty frame".into()))?;
        let envelope: Envelope<Document> = Envelope::from_bytes(bytes.as_ref())?;

        let Some(offset) = envelope.offset else {
            return Ok(Some(envelope.payload));
        };

        let should_hold = self.dedup.lock().await.should_hold(offset);
        if should_hold {
            debug!(?offset, "holding redelivered-candidate document in dedup window");
            self.held.lock().await.push((offset, envelope.payload));
            return Ok(None);
        }

        self.offsets.track(envelope.payload.id(), offset).await;
        Ok(Some(envelope.payload))
    }

    async fn send_for_processing(&self, doc: Document) -> Result<(), MessengerError> {
        let offset = self.offsets.next();
        let envelope = Envelope::with_offset(doc, offset);
        let bytes = envelope.to_bytes()?;
        let mut socket = self.source_push.lock().await;
        socket.send(bytes.into()).await?;
        Ok(())
    }

    async fn last_offset(&self, document_id: &str) -> Option<PartitionOffset> {
        self.offsets.in_flight.lock().await.get(document_id).copied()
    }
}

#[async_trait]
impl Destination for BrokerMessenger {
    async fn send_completed(&self, doc: Document) -> Result<(), MessengerError> {
        let envelope = Envelope::new(doc);
        let bytes = envelope.to_bytes()?;
        let mut socket = self.dest_push.lock().await;
        socket.send(bytes.into()).await?;
        Ok(())
    }

    async fn poll_completed(&self, timeout: Duration) -> Result<Option<Document>, MessengerError> {
        let mut socket = self.dest_pull.lock().await;
        let recv = tokio::time::timeout(timeout, socket.recv()).await;
        let raw = match recv {
            Ok(Ok(msg)) => msg,
            Ok(Err(e)) => return Err(MessengerError::Zmq(e)),
            Err(_) => return Ok(None),
        };
        let bytes = raw.get(0).ok_or_else(|| MessengerError::Transport("empty frame".into()))?;
        let envelope: Envelope<Document> = Envelope::from_bytes(bytes.as_ref())?;
        Ok(Some(envelope.payload))
    }
}

#[async_trait]
impl Events for BrokerMessenger {
    async fn send_event(&self, event: Event) -> Result<(), MessengerError> {
        let envelope = Envelope::new(event);
        let bytes = envelope.to_bytes()?;
        let mut socket = self.event_pub.lock().await;
        socket.send(bytes.into()).await?;
        drop(socket);
        self.event_buffered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn poll_event(&self, timeout: Duration) -> Result<Option<Event>, MessengerError> {
        let mut socket = self.event_sub.lock().await;
        let recv = tokio::time::timeout(timeout, socket.recv()).await;
        let raw = match recv {
            Ok(Ok(msg)) => msg,
            Ok(Err(e)) => return Err(MessengerError::Zmq(e)),
            Err(_) => return Ok(None),
        };
        drop(socket);
        self.event_buffered.fetch_sub(1, Ordering::Relaxed);
        let bytes = raw.get(0).ok_or_else(|| MessengerError::Transport("empty frame".into()))?;
        let envelope: Envelope<Event> = Envelope::from_bytes(bytes.as_ref())?;
        Ok(Some(envelope.payload))
    }

    async fn has_events(&self) -> bool {
        self.event_buffered.load(Ordering::Relaxed) > 0
    }
}

#[async_trait]
impl Messenger for BrokerMessenger {
    async fn mark_terminal(&self, root_document_id: &str) {
        self.offsets.mark_terminal(root_document_id).await;
    }

    async fn commit_pending_offsets(&self) -> Result<(), MessengerError> {
        let ready = self.offsets.drain_ready().await;
        if ready.is_empty() {
            return Ok(());
        }
        let mut dedup = self.dedup.lock().await;
        for offset in &ready {
            dedup.forget(*offset);
        }
        debug!(count = ready.len(), "committed offsets");
        Ok(())
    }

    async fn close(&self) -> Result<(), MessengerError> {
        warn!("broker messenger closing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(tag: &str) -> BrokerEndpoints {
        BrokerEndpoints {
            source: Transport::tcp("127.0.0.1", 17100 + port_offset(tag)),
            destination: Transport::tcp("127.0.0.1", 17200 + port_offset(tag)),
            events: Transport::tcp("127.0.0.1", 17300 + port_offset(tag)),
        }
    }

    fn port_offset(tag: &str) -> u16 {
        tag.bytes().fold(0u16, |acc, b| acc.wrapping_add(b as u16))
    }

    /// Poll until a document clears the dedup hold window rather than
    /// asserting it arrives on the very first call.
    async fn poll_doc_past_dedup(messenger: &BrokerMessenger) -> Document {
        loop {
            if let Some(doc) = messenger.poll_doc(Duration::from_secs(2)).await.unwrap() {
                return doc;
            }
        }
    }

    #[tokio::test]
    async fn source_destination_and_event_roundtrip() {
        let messenger = BrokerMessenger::bind(&endpoints("roundtrip"), Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        messenger
            .send_for_processing(Document::create("d1"))
            .await
            .unwrap();
        let doc = poll_doc_past_dedup(&messenger).await;
        assert_eq!(doc.id(), "d1");

        messenger.send_completed(doc).await.unwrap();
        let completed = messenger.poll_completed(Duration::from_secs(2)).await.unwrap().unwrap();
        assert_eq!(completed.id(), "d1");

        messenger.send_event(conveyor_core::Event::finish("d1", "r1")).await.unwrap();
        assert!(messenger.has_events().await);
        let event = messenger.poll_event(Duration::from_secs(2)).await.unwrap().unwrap();
        assert_eq!(event.document_id, "d1");
        assert!(!messenger.has_events().await);
    }

    #[tokio::test]
    async fn offset_commits_only_after_mark_terminal() {
        let messenger = BrokerMessenger::bind(&endpoints("offsets"), Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        messenger
            .send_for_processing(Document::create("parent"))
            .await
            .unwrap();
        poll_doc_past_dedup(&messenger).await;
        assert_eq!(messenger.in_flight_offset_count().await, 1);

        messenger.commit_pending_offsets().await.unwrap();
        assert_eq!(
            messenger.in_flight_offset_count().await,
            1,
            "offset must not commit before its document is marked terminal"
        );

        messenger.mark_terminal("parent").await;
        assert_eq!(messenger.in_flight_offset_count().await, 0);
        assert_eq!(messenger.pending_offset_commit_count().await, 1);

        messenger.commit_pending_offsets().await.unwrap();
        assert_eq!(messenger.pending_offset_commit_count().await, 0);
    }

    #[tokio::test]
    async fn last_offset_is_available_while_in_flight_and_gone_after_terminal() {
        let messenger = BrokerMessenger::bind(&endpoints("last-offset"), Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        messenger.send_for_processing(Document::create("d1")).await.unwrap();
        poll_doc_past_dedup(&messenger).await;

        assert!(messenger.last_offset("d1").await.is_some());
        assert!(messenger.last_offset("unknown").await.is_none());

        messenger.mark_terminal("d1").await;
        assert!(messenger.last_offset("d1").await.is_none());
    }
}
