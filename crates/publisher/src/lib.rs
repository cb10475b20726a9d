pub mod error;
pub mod ledger;
pub mod publisher;

pub use error::PublisherError;
pub use ledger::OutstandingLedger;
pub use publisher::Publisher;
