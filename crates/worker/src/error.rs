use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Messenger(#[from] conveyor_messenger::MessengerError),
}
