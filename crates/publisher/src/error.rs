use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error(transparent)]
    Messenger(#[from] conveyor_messenger::MessengerError),

    #[error("connector task failed: {0}")]
    ConnectorFailed(String),

    #[error("waitForCompletion timed out after {0:?}")]
    Timeout(std::time::Duration),
}
