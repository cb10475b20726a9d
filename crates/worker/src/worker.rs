//! Worker: polls the Source queue, runs the pipeline, and routes results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use conveyor_core::Event;
use conveyor_messenger::Messenger;
use conveyor_pipeline::Pipeline;
use tracing::{debug, info, instrument, warn};

use crate::error::WorkerError;

/// How long a single `poll_doc` call waits before the worker loop rechecks
/// its shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct Worker<M: Messenger> {
    name: String,
    run_id: String,
    messenger: Arc<M>,
    pipeline: Arc<Pipeline>,
    running: Arc<AtomicBool>,
}

impl<M: Messenger + 'static> Worker<M> {
    pub fn new(name: impl Into<String>, run_id: impl Into<String>, messenger: Arc<M>, pipeline: Arc<Pipeline>) -> Self {
        Self {
            name: name.into(),
            run_id: run_id.into(),
            messenger,
            pipeline,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A clone of the cooperative shutdown flag. Setting it false causes the
    /// loop to finish its current document and exit.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Run the poll/process/route loop until `shutdown_flag` is cleared.
    #[instrument(skip_all, fields(worker = %self.name, run_id = %self.run_id))]
    pub async fn run(&self) -> Result<(), WorkerError> {
        info!("worker starting");
        while self.running.load(Ordering::Relaxed) {
            let doc = match self.messenger.poll_doc(POLL_INTERVAL).await {
                Ok(Some(doc)) => doc,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, "messenger poll failed, terminating worker");
                    return Err(e.into());
                }
            };

            let doc_id = doc.id().to_string();
            match self.pipeline.process(doc).await {
                Ok(results) => {
                    for result in results {
                        if result.id() != doc_id {
                            // Child document: the CREATE event must be visible to the
                            // Publisher no later than any terminal event for this id,
                            // so it is sent before the document itself.
                            let create = Event::create_child(result.id().to_string(), self.run_id.clone(), doc_id.clone());
                            if let Err(e) = self.messenger.send_event(create).await {
                                warn!(error = %e, document_id = %result.id(), "failed to emit CREATE event");
                            }
                        }
                        if let Err(e) = self.messenger.send_completed(result).await {
                            warn!(error = %e, "failed to forward document to destination");
                        }
                    }
                }
                Err(e) => {
                    debug!(error = %e, document_id = %doc_id, "pipeline stage failed");
                    let fail = Event::fail(doc_id, self.run_id.clone(), e.message().to_string());
                    if let Err(send_err) = self.messenger.send_event(fail).await {
                        warn!(error = %send_err, "failed to emit FAIL event");
                    }
                }
            }
        }
        info!("worker stopped");
        Ok(())
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conveyor_core::Document;
    use conveyor_messenger::InMemoryMessenger;
    use conveyor_pipeline::{Stage, StageError};

    struct FanOut;

    #[async_trait]
    impl Stage for FanOut {
        fn name(&self) -> &str {
            "fan-out"
        }

        async fn process_document(&self, doc: &mut Document) -> Result<Option<Vec<Document>>, StageError> {
            Ok(Some(vec![Document::create(format!("{}-child", doc.id()))]))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl Stage for AlwaysFails {
        fn name(&self) -> &str {
            "always-fails"
        }

        async fn process_document(&self, doc: &mut Document) -> Result<Option<Vec<Document>>, StageError> {
            Err(StageError::Processing {
                stage: self.name().to_string(),
                document_id: doc.id().to_string(),
                message: "deliberate failure".into(),
            })
        }
    }

    #[tokio::test]
    async fn fan_out_emits_create_before_destination_send() {
        let messenger = Arc::new(InMemoryMessenger::default());
        let pipeline = Arc::new(Pipeline::new("fanout", vec![Box::new(FanOut)]));
        let worker = Worker::new("w0", "r1", messenger.clone(), pipeline);

        messenger
            .send_for_processing(Document::create("parent"))
            .await
            .unwrap();

        let handle = worker.shutdown_flag();
        let run_handle = {
            let worker = Arc::new(worker);
            let w = worker.clone();
            tokio::spawn(async move { w.run().await })
        };

        // Give the loop a moment to process the single queued document.
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.store(false, Ordering::Relaxed);
        let _ = tokio::time::timeout(Duration::from_secs(1), run_handle).await;

        let create = messenger.poll_event(Duration::from_millis(10)).await.unwrap();
        assert!(matches!(create.unwrap().event_type, conveyor_core::EventType::Create));

        let parent = messenger.poll_completed(Duration::from_millis(10)).await.unwrap();
        assert_eq!(parent.unwrap().id(), "parent");
        let child = messenger.poll_completed(Duration::from_millis(10)).await.unwrap();
        assert_eq!(child.unwrap().id(), "parent-child");
    }

    #[tokio::test]
    async fn stage_failure_emits_fail_event_not_destination_send() {
        let messenger = Arc::new(InMemoryMessenger::default());
        let pipeline = Arc::new(Pipeline::new("fails", vec![Box::new(AlwaysFails)]));
        let worker = Arc::new(Worker::new("w0", "r1", messenger.clone(), pipeline));

        messenger.send_for_processing(Document::create("bad")).await.unwrap();

        let handle = worker.shutdown_flag();
        let w = worker.clone();
        let run_handle = tokio::spawn(async move { w.run().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.store(false, Ordering::Relaxed);
        let _ = tokio::time::timeout(Duration::from_secs(1), run_handle).await;

        let event = messenger.poll_event(Duration::from_millis(10)).await.unwrap().unwrap();
        assert!(matches!(event.event_type, conveyor_core::EventType::Fail));
        assert_eq!(event.message.as_deref(), Some("deliberate failure"));

        let completed = messenger.poll_completed(Duration::from_millis(10)).await.unwrap();
        assert!(completed.is_none());
    }
}
