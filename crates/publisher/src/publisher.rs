//! Publisher: originates documents into a run, tracks outstanding work via
//! the event stream, and decides when a run has fully drained.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use conveyor_core::{Document, EventType};
use conveyor_messenger::{Events, Messenger, Source};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::PublisherError;
use crate::ledger::OutstandingLedger;

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(200);
const LEDGER_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct Publisher<M: Messenger> {
    run_id: String,
    messenger: Arc<M>,
    ledger: Arc<Mutex<OutstandingLedger>>,
    draining: Arc<AtomicBool>,
    drain_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<M: Messenger + 'static> Publisher<M> {
    /// Construct a publisher for `run_id` and start draining its event
    /// stream into the outstanding-document ledger on a background task.
    pub fn new(run_id: impl Into<String>, messenger: Arc<M>) -> Self {
        let run_id = run_id.into();
        let ledger = Arc::new(Mutex::new(OutstandingLedger::new()));
        let draining = Arc::new(AtomicBool::new(true));

        let handle = spawn_drain_loop(messenger.clone(), ledger.clone(), draining.clone());

        Self {
            run_id,
            messenger,
            ledger,
            draining,
            drain_handle: Mutex::new(Some(handle)),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Attach the run-id, record the id in the outstanding ledger, and
    /// enqueue the document for processing.
    pub async fn publish(&self, mut doc: Document) -> Result<(), PublisherError> {
        doc.set_run_id(self.run_id.clone());
        self.ledger.lock().await.track(doc.id().to_string());
        self.messenger.send_for_processing(doc).await?;
        Ok(())
    }

    /// Block until the connector task has finished, the ledger has emptied,
    /// and no events remain buffered — or until `timeout` elapses.
    pub async fn wait_for_completion<E: std::fmt::Display>(
        &self,
        connector: JoinHandle<Result<(), E>>,
        timeout: Duration,
    ) -> Result<(), PublisherError> {
        let outcome = tokio::time::timeout(timeout, async {
            let connector_result = connector
                .await
                .map_err(|e| PublisherError::ConnectorFailed(e.to_string()))?;
            connector_result.map_err(|e| PublisherError::ConnectorFailed(e.to_string()))?;

            loop {
                let ledger_empty = self.ledger.lock().await.is_empty();
                if ledger_empty && !self.messenger.has_events().await {
                    return Ok(());
                }
                tokio::time::sleep(LEDGER_POLL_INTERVAL).await;
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(PublisherError::Timeout(timeout)),
        }
    }

    /// Idempotent: stops the event-drain task and closes the messenger.
    pub async fn close(&self) -> Result<(), PublisherError> {
        self.draining.store(false, Ordering::Relaxed);
        let mut guard = self.drain_handle.lock().await;
        if let Some(handle) = guard.take() {
            let _ = handle.await;
        }
        self.messenger.close().await?;
        Ok(())
    }
}

fn spawn_drain_loop<M: Messenger + 'static>(
    messenger: Arc<M>,
    ledger: Arc<Mutex<OutstandingLedger>>,
    draining: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while draining.load(Ordering::Relaxed) {
            match messenger.poll_event(EVENT_POLL_INTERVAL).await {
                Ok(Some(event)) => {
                    let mut guard = ledger.lock().await;
                    match event.event_type {
                        EventType::Create => guard.on_create(&event.document_id, event.caused_by.as_deref()),
                        EventType::Finish | EventType::Fail => match guard.on_terminal(&event.document_id) {
                            None => {
                                tracing::warn!(
                                    document_id = %event.document_id,
                                    "event for untracked document; dropping"
                                );
                            }
                            Some(Some(root)) => {
                                drop(guard);
                                messenger.mark_terminal(&root).await;
                            }
                            Some(None) => {}
                        },
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::error!(%error, "event stream poll failed; stopping drain loop");
                    break;
                }
            }
        }
    })
}
