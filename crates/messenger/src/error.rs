use thiserror::Error;

/// Errors raised by the messenger substrate — transport and serialization
/// failures per the error taxonomy.
#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("zeromq error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("poll timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("messenger is closed")]
    Closed,
}
