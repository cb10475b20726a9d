use thiserror::Error;

/// Errors a [`crate::document::Document`] setter can return.
///
/// Reserved-field misuse and double `run_id` initialization are programming
/// bugs, not recoverable conditions — those paths panic instead of returning
/// one of these variants. This enum covers the error kinds that can actually
/// surface from well-formed calling code (e.g. a stage rejecting a value it
/// cannot coerce).
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("field '{0}' does not hold a value of the requested type")]
    TypeMismatch(String),

    #[error("field '{0}' not found")]
    FieldNotFound(String),
}

/// Top-level error kinds raised by the core data model and config layer.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),
}
