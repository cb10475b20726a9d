use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("stage '{stage}' failed to start: {message}")]
    Config { stage: String, message: String },

    #[error("stage '{stage}' failed on document '{document_id}': {message}")]
    Processing {
        stage: String,
        document_id: String,
        message: String,
    },
}

impl StageError {
    pub fn message(&self) -> &str {
        match self {
            StageError::Config { message, .. } => message,
            StageError::Processing { message, .. } => message,
        }
    }
}
