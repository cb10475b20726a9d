use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend rejected document '{id}': {message}")]
    Item { id: String, message: String },

    #[error("backend transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error(transparent)]
    Messenger(#[from] conveyor_messenger::MessengerError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
