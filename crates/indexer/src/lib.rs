pub mod backend;
pub mod batcher;
pub mod classify;
pub mod error;
pub mod indexer;

pub use backend::{DeleteByIdRequest, DeleteByQueryRequest, IndexBackend, ItemOutcome, NullBackend, UpsertRequest};
pub use batcher::MicroBatcher;
pub use classify::{classify_batch, Operation};
pub use error::{BackendError, IndexerError};
pub use indexer::Indexer;
