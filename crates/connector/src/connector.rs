//! Connector: reads an external source and hands documents to a Publisher.
//! Concrete sources (JDBC, CSV/XML, cloud storage, Solr, Kafka) are out of
//! scope here; this crate defines only the trait and one in-memory
//! reference implementation.

use async_trait::async_trait;
use conveyor_core::Document;
use conveyor_messenger::Messenger;
use conveyor_publisher::Publisher;

use crate::error::ConnectorError;

#[async_trait]
pub trait Connector<M: Messenger + 'static>: Send + Sync {
    fn name(&self) -> &str;

    /// Target-system priming actions, if any. Default no-op.
    async fn pre_execute(&self, run_id: &str) -> Result<(), ConnectorError> {
        let _ = run_id;
        Ok(())
    }

    /// Publish every record this connector owns. Expected to block until
    /// all records are published or a fatal error is raised.
    async fn execute(&self, publisher: &Publisher<M>) -> Result<(), ConnectorError>;

    /// Cleanup/commit against the target system. Default no-op.
    async fn post_execute(&self, run_id: &str) -> Result<(), ConnectorError> {
        let _ = run_id;
        Ok(())
    }

    async fn close(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
}

/// Publishes a fixed, pre-built set of documents. Sufficient to drive the
/// end-to-end run scenarios and smoke-test a Runner wiring; not a
/// production source connector.
pub struct VecConnector {
    name: String,
    documents: Vec<Document>,
}

impl VecConnector {
    pub fn new(name: impl Into<String>, documents: Vec<Document>) -> Self {
        Self {
            name: name.into(),
            documents,
        }
    }
}

#[async_trait]
impl<M: Messenger + 'static> Connector<M> for VecConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, publisher: &Publisher<M>) -> Result<(), ConnectorError> {
        for doc in self.documents.clone() {
            publisher.publish(doc).await?;
        }
        tracing::info!(connector = %self.name, count = self.documents.len(), "published fixed document set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_messenger::{InMemoryMessenger, Source};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn vec_connector_publishes_every_document() {
        let messenger = Arc::new(InMemoryMessenger::default());
        let publisher = Publisher::new("r1", messenger.clone());
        let connector = VecConnector::new("fixture", vec![Document::create("a"), Document::create("b")]);

        Connector::execute(&connector, &publisher).await.unwrap();

        let first = messenger.poll_doc(Duration::from_millis(100)).await.unwrap().unwrap();
        let second = messenger.poll_doc(Duration::from_millis(100)).await.unwrap().unwrap();
        assert_eq!(first.id(), "a");
        assert_eq!(second.id(), "b");

        publisher.close().await.unwrap();
    }
}
