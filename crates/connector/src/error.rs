use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("connector config invalid: {0}")]
    Config(String),

    #[error("connector source failed: {0}")]
    Source(String),

    #[error(transparent)]
    Publisher(#[from] conveyor_publisher::PublisherError),
}
