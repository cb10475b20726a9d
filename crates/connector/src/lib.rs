pub mod connector;
pub mod error;

pub use connector::{Connector, VecConnector};
pub use error::ConnectorError;
