//! WorkerPool: a fixed set of workers sharing one messenger and pipeline.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use conveyor_messenger::Messenger;
use conveyor_pipeline::Pipeline;
use tokio::task::JoinHandle;
use tracing::info;

use crate::error::WorkerError;
use crate::worker::Worker;

pub struct WorkerPool<M: Messenger + 'static> {
    workers: Vec<Arc<Worker<M>>>,
    handles: Vec<JoinHandle<Result<(), WorkerError>>>,
}

impl<M: Messenger + 'static> WorkerPool<M> {
    /// Build a pool of `size` workers, all sharing `messenger` and `pipeline`.
    pub fn new(run_id: &str, size: usize, messenger: Arc<M>, pipeline: Arc<Pipeline>) -> Self {
        let workers = (0..size.max(1))
            .map(|i| {
                Arc::new(Worker::new(
                    format!("{}-worker-{i}", pipeline.name()),
                    run_id.to_string(),
                    messenger.clone(),
                    pipeline.clone(),
                ))
            })
            .collect();
        Self {
            workers,
            handles: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Spawn every worker's loop on its own task.
    pub fn start(&mut self) {
        info!(count = self.workers.len(), "starting worker pool");
        for worker in &self.workers {
            let worker = worker.clone();
            self.handles.push(tokio::spawn(async move { worker.run().await }));
        }
    }

    /// Signal cooperative shutdown to every worker and drain in-flight tasks.
    pub async fn stop(self) {
        for worker in &self.workers {
            worker.stop();
        }
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "worker task panicked");
            }
        }
    }

    pub fn running(&self) -> bool {
        self.workers
            .first()
            .map(|w| w.shutdown_flag().load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}
