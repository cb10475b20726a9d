use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Connector(#[from] conveyor_connector::ConnectorError),

    #[error(transparent)]
    Publisher(#[from] conveyor_publisher::PublisherError),

    #[error(transparent)]
    Worker(#[from] conveyor_worker::WorkerError),

    #[error(transparent)]
    Indexer(#[from] conveyor_indexer::IndexerError),

    #[error("run aborted: connector '{connector}' failed: {source}")]
    ConnectorAborted {
        connector: String,
        #[source]
        source: Box<RunError>,
    },
}

impl RunError {
    /// Exit code per the runner's contract: 0 success, 1 config/argument
    /// error (handled by the binary before `Runner::run` is called), 2 run
    /// aborted (connector failed or timed out waiting for completion).
    pub fn exit_code(&self) -> i32 {
        2
    }
}
