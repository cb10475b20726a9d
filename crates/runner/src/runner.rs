//! Runner: orchestrates one run across a declared sequence of connectors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use conveyor_connector::Connector;
use conveyor_core::RunnerConfig;
use conveyor_indexer::{IndexBackend, Indexer};
use conveyor_messenger::Messenger;
use conveyor_pipeline::Pipeline;
use conveyor_publisher::Publisher;
use conveyor_worker::WorkerPool;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::RunError;

/// Everything one connector run needs: its own messenger substrate, pipeline,
/// and index backend (they may be shared across jobs by the caller, or each
/// job may get its own — the Runner does not care).
pub struct ConnectorJob<M: Messenger + 'static, B: IndexBackend + 'static> {
    pub connector: Arc<dyn Connector<M>>,
    pub messenger: Arc<M>,
    pub pipeline: Arc<Pipeline>,
    pub backend: Arc<B>,
}

pub struct Runner {
    config: RunnerConfig,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Generate a fresh run-id and execute every job in declared order. A
    /// connector failure or timeout aborts the run; subsequent connectors
    /// are skipped.
    pub async fn run<M: Messenger + 'static, B: IndexBackend + 'static>(
        &self,
        jobs: Vec<ConnectorJob<M, B>>,
    ) -> Result<(), RunError> {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        tracing::info!(run_id = %run_id, connectors = jobs.len(), "run starting");

        for job in jobs {
            let connector_name = job.connector.name().to_string();
            if let Err(source) = self.run_connector(&run_id, job).await {
                tracing::error!(
                    run_id = %run_id,
                    connector = %connector_name,
                    error = %source,
                    "run aborted"
                );
                return Err(RunError::ConnectorAborted {
                    connector: connector_name,
                    source: Box::new(source),
                });
            }
        }

        tracing::info!(
            run_id = %run_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run complete"
        );
        Ok(())
    }

    async fn run_connector<M: Messenger + 'static, B: IndexBackend + 'static>(
        &self,
        run_id: &str,
        job: ConnectorJob<M, B>,
    ) -> Result<(), RunError> {
        let mut pool = WorkerPool::new(run_id, self.config.worker.threads, job.messenger.clone(), job.pipeline.clone());
        pool.start();

        let indexer_running = Arc::new(AtomicBool::new(true));
        let indexer = Arc::new(Indexer::new(
            run_id.to_string(),
            job.messenger.clone(),
            job.backend.clone(),
            self.config.indexer.clone(),
        ));
        let indexer_flag = indexer_running.clone();
        let indexer_for_task = indexer.clone();
        let indexer_handle = tokio::spawn(async move { indexer_for_task.run(indexer_flag).await });

        let publisher = Arc::new(Publisher::new(run_id.to_string(), job.messenger.clone()));

        // Every fallible step below is captured rather than `?`-propagated
        // immediately, so a failure partway through still reaches the
        // teardown section: the pool and indexer must always be stopped and
        // the publisher/connector always closed, on every exit path.
        let pre_result = job.connector.pre_execute(run_id).await;

        let wait_result = if pre_result.is_ok() {
            let connector_for_task = job.connector.clone();
            let publisher_for_task = publisher.clone();
            let connector_handle: JoinHandle<Result<(), conveyor_connector::ConnectorError>> =
                tokio::spawn(async move { connector_for_task.execute(&publisher_for_task).await });

            publisher
                .wait_for_completion(connector_handle, self.config.connector_timeout)
                .await
        } else {
            Ok(())
        };

        let post_result = job.connector.post_execute(run_id).await;

        pool.stop().await;
        indexer_running.store(false, Ordering::Relaxed);
        if let Err(e) = indexer_handle.await {
            tracing::warn!(error = %e, "indexer task panicked");
        }

        let close_result = publisher.close().await;
        let connector_close_result = job.connector.close().await;

        pre_result?;
        wait_result?;
        post_result?;
        close_result?;
        connector_close_result?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_connector::VecConnector;
    use conveyor_core::Document;
    use conveyor_indexer::NullBackend;
    use conveyor_messenger::InMemoryMessenger;

    #[tokio::test]
    async fn single_connector_run_indexes_its_documents() {
        let mut config = RunnerConfig::default();
        config.connector_timeout = std::time::Duration::from_secs(5);
        let runner = Runner::new(config);

        let messenger = Arc::new(InMemoryMessenger::default());
        let pipeline = Arc::new(Pipeline::new("passthrough", vec![]));
        let backend = Arc::new(NullBackend::new());
        let connector = Arc::new(VecConnector::new(
            "fixture",
            vec![Document::create("d1"), Document::create("d2")],
        ));

        let job = ConnectorJob {
            connector,
            messenger,
            pipeline,
            backend: backend.clone(),
        };

        runner.run(vec![job]).await.unwrap();

        let mut upserted = backend.recorded_upserts();
        upserted.sort();
        assert_eq!(upserted, vec!["d1", "d2"]);
    }
}
