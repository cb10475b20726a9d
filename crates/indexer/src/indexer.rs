//! Indexer: drains the destination queue into micro-batches, classifies each
//! batch, sends operations to an [`IndexBackend`] in O2 order, and emits
//! FINISH/FAIL events per document.

use std::sync::Arc;
use std::time::Duration;

use conveyor_core::{Event, IndexerConfig};
use conveyor_messenger::{Destination, Events, Messenger, PartitionOffset, Source};

use crate::backend::{IndexBackend, ItemOutcome};
use crate::batcher::MicroBatcher;
use crate::classify::{classify_batch, Operation};
use crate::error::IndexerError;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct Indexer<M: Messenger, B: IndexBackend> {
    run_id: String,
    messenger: Arc<M>,
    backend: Arc<B>,
    config: IndexerConfig,
}

impl<M: Messenger, B: IndexBackend> Indexer<M, B> {
    pub fn new(run_id: impl Into<String>, messenger: Arc<M>, backend: Arc<B>, config: IndexerConfig) -> Self {
        Self {
            run_id: run_id.into(),
            messenger,
            backend,
            config,
        }
    }

    /// Drain the destination queue, flushing and indexing batches, until
    /// `running` is cleared. Any outstanding partial batch is flushed before
    /// returning.
    pub async fn run(&self, running: Arc<std::sync::atomic::AtomicBool>) -> Result<(), IndexerError> {
        let mut batcher = MicroBatcher::new(self.config.batch_size, self.config.batch_timeout);

        while running.load(std::sync::atomic::Ordering::Relaxed) {
            match self.messenger.poll_completed(POLL_INTERVAL).await? {
                Some(doc) => {
                    let offset = self.messenger.last_offset(doc.id()).await;
                    batcher.push((doc, offset));
                }
                None => {}
            }

            if let Some(batch) = batcher.try_flush() {
                self.index_batch(batch).await?;
            }
        }

        if !batcher.is_empty() {
            let batch = batcher.flush();
            self.index_batch(batch).await?;
        }

        Ok(())
    }

    async fn index_batch(&self, batch: Vec<(conveyor_core::Document, Option<PartitionOffset>)>) -> Result<(), IndexerError> {
        if batch.is_empty() {
            return Ok(());
        }
        let ops = classify_batch(batch, &self.config);

        let mut upserts = Vec::new();
        let mut delete_ids = Vec::new();
        let mut delete_queries = Vec::new();
        for op in ops {
            match op {
                Operation::Upsert(r) => upserts.push(r),
                Operation::DeleteById(r) => delete_ids.push(r),
                Operation::DeleteByQuery(r) => delete_queries.push(r),
            }
        }

        let mut outcomes: Vec<ItemOutcome> = Vec::new();
        if !upserts.is_empty() {
            outcomes.extend(self.backend.upsert(upserts).await?);
        }
        if !delete_ids.is_empty() {
            outcomes.extend(self.backend.delete_by_id(delete_ids).await?);
        }
        if !delete_queries.is_empty() {
            outcomes.extend(self.backend.delete_by_query(delete_queries).await?);
        }

        for outcome in outcomes {
            let event = match outcome.result {
                Ok(()) => Event::finish(outcome.id, self.run_id.clone()),
                Err(message) => {
                    tracing::error!(document_id = %outcome.id, %message, "backend rejected document");
                    Event::fail(outcome.id, self.run_id.clone(), message)
                }
            };
            self.messenger.send_event(event).await?;
        }

        self.messenger.commit_pending_offsets().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::Document;
    use conveyor_messenger::InMemoryMessenger;
    use std::sync::atomic::AtomicBool;

    use crate::backend::NullBackend;

    fn test_config() -> IndexerConfig {
        IndexerConfig {
            batch_size: 10,
            batch_timeout: Duration::from_millis(50),
            id_override_field: None,
            routing_field: None,
            version_type: conveyor_core::VersionType::Internal,
            deletion_marker_field: None,
            deletion_marker_field_value: None,
            delete_by_field_field: None,
            delete_by_field_value: None,
            ignore_fields: Vec::new(),
            drop_id_from_payload: false,
        }
    }

    #[tokio::test]
    async fn indexes_batch_and_emits_finish_events() {
        let messenger = Arc::new(InMemoryMessenger::default());
        let backend = Arc::new(NullBackend::new());
        let indexer = Indexer::new("r1", messenger.clone(), backend.clone(), test_config());

        let mut doc = Document::with_run_id("d1", "r1");
        doc.set("title", "hello");
        messenger.send_completed(doc).await.unwrap();

        let running = Arc::new(AtomicBool::new(true));
        let running2 = running.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            running2.store(false, std::sync::atomic::Ordering::Relaxed);
        });
        indexer.run(running).await.unwrap();

        assert_eq!(backend.recorded_upserts(), vec!["d1"]);
        let event = messenger.poll_event(Duration::from_millis(100)).await.unwrap().unwrap();
        assert_eq!(event.document_id, "d1");
        assert_eq!(event.event_type, conveyor_core::EventType::Finish);
    }

    #[tokio::test]
    async fn flushes_remaining_partial_batch_on_stop() {
        let messenger = Arc::new(InMemoryMessenger::default());
        let backend = Arc::new(NullBackend::new());
        let mut config = test_config();
        config.batch_timeout = Duration::from_secs(60);
        let indexer = Indexer::new("r1", messenger.clone(), backend.clone(), config);

        messenger.send_completed(Document::with_run_id("d1", "r1")).await.unwrap();

        let running = Arc::new(AtomicBool::new(true));
        let running2 = running.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            running2.store(false, std::sync::atomic::Ordering::Relaxed);
        });
        indexer.run(running).await.unwrap();

        assert_eq!(backend.recorded_upserts(), vec!["d1"]);
    }
}
