//! IndexBackend: the seam between this crate's batching/classification logic
//! and a concrete search/index client (OpenSearch, Solr, Pinecone, Weaviate —
//! all out of scope here).

use std::sync::Mutex;

use async_trait::async_trait;
use conveyor_core::VersionType;

use crate::error::BackendError;

#[derive(Debug, Clone)]
pub struct UpsertRequest {
    pub id: String,
    pub routing: Option<String>,
    pub version: Option<i64>,
    pub version_type: VersionType,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct DeleteByIdRequest {
    pub id: String,
    pub routing: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeleteByQueryRequest {
    /// The document whose arrival triggered this delete-by-query call —
    /// used only for event accounting, not part of the query itself.
    pub triggering_document_id: String,
    pub field: String,
    pub value: String,
}

/// Per-id outcome of a backend call.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub id: String,
    pub result: Result<(), String>,
}

/// Seam the Indexer depends on instead of any concrete backend's wire protocol.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    async fn upsert(&self, requests: Vec<UpsertRequest>) -> Result<Vec<ItemOutcome>, BackendError>;
    async fn delete_by_id(&self, requests: Vec<DeleteByIdRequest>) -> Result<Vec<ItemOutcome>, BackendError>;
    async fn delete_by_query(&self, requests: Vec<DeleteByQueryRequest>) -> Result<Vec<ItemOutcome>, BackendError>;
}

/// In-memory backend that records every call it receives. Ships for tests
/// and local smoke runs — not a production backend.
#[derive(Default)]
pub struct NullBackend {
    upserts: Mutex<Vec<UpsertRequest>>,
    deletes_by_id: Mutex<Vec<DeleteByIdRequest>>,
    deletes_by_query: Mutex<Vec<DeleteByQueryRequest>>,
}

impl NullBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded_upserts(&self) -> Vec<String> {
        self.upserts.lock().unwrap().iter().map(|r| r.id.clone()).collect()
    }

    pub fn recorded_deletes_by_id(&self) -> Vec<String> {
        self.deletes_by_id.lock().unwrap().iter().map(|r| r.id.clone()).collect()
    }

    pub fn recorded_deletes_by_query(&self) -> Vec<(String, String)> {
        self.deletes_by_query
            .lock()
            .unwrap()
            .iter()
            .map(|r| (r.field.clone(), r.value.clone()))
            .collect()
    }

    pub fn call_order(&self) -> Vec<String> {
        // Exposed for tests asserting O2 (upserts, then delete-by-id, then delete-by-query).
        let mut order = Vec::new();
        order.extend(self.recorded_upserts().into_iter().map(|id| format!("upsert:{id}")));
        order.extend(self.recorded_deletes_by_id().into_iter().map(|id| format!("delete_id:{id}")));
        order.extend(
            self.recorded_deletes_by_query()
                .into_iter()
                .map(|(f, v)| format!("delete_query:{f}={v}")),
        );
        order
    }
}

#[async_trait]
impl IndexBackend for NullBackend {
    async fn upsert(&self, requests: Vec<UpsertRequest>) -> Result<Vec<ItemOutcome>, BackendError> {
        let outcomes = requests.iter().map(|r| ItemOutcome { id: r.id.clone(), result: Ok(()) }).collect();
        self.upserts.lock().unwrap().extend(requests);
        Ok(outcomes)
    }

    async fn delete_by_id(&self, requests: Vec<DeleteByIdRequest>) -> Result<Vec<ItemOutcome>, BackendError> {
        let outcomes = requests.iter().map(|r| ItemOutcome { id: r.id.clone(), result: Ok(()) }).collect();
        self.deletes_by_id.lock().unwrap().extend(requests);
        Ok(outcomes)
    }

    async fn delete_by_query(&self, requests: Vec<DeleteByQueryRequest>) -> Result<Vec<ItemOutcome>, BackendError> {
        let outcomes = requests
            .iter()
            .map(|r| ItemOutcome { id: r.triggering_document_id.clone(), result: Ok(()) })
            .collect();
        self.deletes_by_query.lock().unwrap().extend(requests);
        Ok(outcomes)
    }
}
