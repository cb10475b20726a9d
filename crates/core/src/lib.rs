pub mod config;
pub mod document;
pub mod error;
pub mod event;

pub use config::{load_dotenv, IndexerConfig, RunnerConfig, VersionType, WorkerConfig};
pub use document::{Document, DocId, Field, FieldValue, UpdateMode, RESERVED_FIELDS};
pub use error::{CoreError, DocumentError};
pub use event::{Event, EventStatus, EventType};
