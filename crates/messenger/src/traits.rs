use async_trait::async_trait;
use conveyor_core::{Document, Event};
use std::time::Duration;

use crate::envelope::PartitionOffset;
use crate::error::MessengerError;

/// Source queue: documents awaiting processing by a Worker.
#[async_trait]
pub trait Source: Send + Sync {
    /// Poll the next document, or `None` on timeout.
    async fn poll_doc(&self, timeout: Duration) -> Result<Option<Document>, MessengerError>;

    /// Publisher-side: enqueue a document for processing. Blocks (backpressure)
    /// when the source queue is bounded and full.
    async fn send_for_processing(&self, doc: Document) -> Result<(), MessengerError>;

    /// Side channel onto the offset a still-in-flight document was read at.
    /// `None` outside broker mode, or once the document has gone terminal.
    /// Lets downstream stages (the Indexer) recover the source offset for
    /// version stamping without the offset traveling in the document payload.
    async fn last_offset(&self, _document_id: &str) -> Option<PartitionOffset> {
        None
    }
}

/// Destination queue: processed documents awaiting indexing.
#[async_trait]
pub trait Destination: Send + Sync {
    async fn send_completed(&self, doc: Document) -> Result<(), MessengerError>;

    async fn poll_completed(&self, timeout: Duration) -> Result<Option<Document>, MessengerError>;
}

/// Event stream: CREATE/FINISH/FAIL signals between Worker/Indexer and Publisher.
#[async_trait]
pub trait Events: Send + Sync {
    async fn send_event(&self, event: Event) -> Result<(), MessengerError>;

    async fn poll_event(&self, timeout: Duration) -> Result<Option<Event>, MessengerError>;

    /// Whether any events are currently buffered (used by the Publisher's
    /// completion check).
    async fn has_events(&self) -> bool;
}

/// Full messenger substrate: the three channels plus lifecycle operations.
#[async_trait]
pub trait Messenger: Source + Destination + Events {
    /// Commit any source offsets associated with now-terminal documents.
    /// No-op for the in-memory messenger.
    async fn commit_pending_offsets(&self) -> Result<(), MessengerError>;

    /// Called by the Publisher once a root document and every descendant it
    /// fanned out to have reached a terminal state, so the source offset the
    /// root was read at becomes eligible for commit. No-op outside broker mode.
    async fn mark_terminal(&self, _root_document_id: &str) {}

    async fn close(&self) -> Result<(), MessengerError>;
}
