//! Per-batch classification: each document id maps to exactly one operation,
//! latest-event-wins, then grouped upserts-first / delete-by-id / delete-by-query.

use indexmap::IndexMap;

use conveyor_core::{Document, IndexerConfig, VersionType};
use conveyor_messenger::PartitionOffset;

use crate::backend::{DeleteByIdRequest, DeleteByQueryRequest, UpsertRequest};

pub enum Operation {
    Upsert(UpsertRequest),
    DeleteById(DeleteByIdRequest),
    DeleteByQuery(DeleteByQueryRequest),
}

impl Operation {
    pub fn document_id(&self) -> &str {
        match self {
            Operation::Upsert(r) => &r.id,
            Operation::DeleteById(r) => &r.id,
            Operation::DeleteByQuery(r) => &r.triggering_document_id,
        }
    }
}

fn is_marked_for_deletion(doc: &Document, config: &IndexerConfig) -> bool {
    let (Some(field), Some(expected)) = (&config.deletion_marker_field, &config.deletion_marker_field_value) else {
        return false;
    };
    doc.get_strings(field).iter().any(|v| v == expected)
}

fn delete_by_field_pair(doc: &Document, config: &IndexerConfig) -> Option<(String, String)> {
    let field = config.delete_by_field_field.as_ref()?;
    let value = config
        .delete_by_field_value
        .clone()
        .or_else(|| doc.get_string(field).map(str::to_string))?;
    Some((field.clone(), value))
}

/// Build the JSON payload sent to the backend for one document, flattening
/// its (at most one level deep) children in under a `children` array so a
/// child never needs its own separate index operation.
fn document_payload(doc: &Document, config: &IndexerConfig) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for name in doc.field_names() {
        if config.ignore_fields.iter().any(|f| f == name) {
            continue;
        }
        if config.drop_id_from_payload && name == "id" {
            continue;
        }
        if let Some(field) = doc.get(name) {
            let values: Vec<serde_json::Value> = field
                .values()
                .into_iter()
                .map(|v| serde_json::to_value(v).unwrap_or(serde_json::Value::Null))
                .collect();
            let value = if values.len() == 1 {
                values.into_iter().next().unwrap()
            } else {
                serde_json::Value::Array(values)
            };
            map.insert(name.to_string(), value);
        }
    }
    if !doc.children().is_empty() {
        let children = doc.children().iter().map(|child| document_payload(child, config)).collect();
        map.insert("children".to_string(), serde_json::Value::Array(children));
    }
    serde_json::Value::Object(map)
}

/// Version to stamp an upsert with, drawn from the source message offset for
/// any non-internal version type. `Internal` leaves versioning to the backend.
fn version_for(offset: Option<PartitionOffset>, config: &IndexerConfig) -> Option<i64> {
    if config.version_type == VersionType::Internal {
        return None;
    }
    offset.map(|o| o.offset as i64)
}

fn classify_one(doc: &Document, offset: Option<PartitionOffset>, config: &IndexerConfig) -> Operation {
    if is_marked_for_deletion(doc, config) {
        if let Some((field, value)) = delete_by_field_pair(doc, config) {
            return Operation::DeleteByQuery(DeleteByQueryRequest {
                triggering_document_id: doc.id().to_string(),
                field,
                value,
            });
        }
        let effective_id = config
            .id_override_field
            .as_ref()
            .and_then(|f| doc.get_string(f))
            .unwrap_or_else(|| doc.id())
            .to_string();
        let routing = config.routing_field.as_ref().and_then(|f| doc.get_string(f)).map(str::to_string);
        return Operation::DeleteById(DeleteByIdRequest { id: effective_id, routing });
    }

    let effective_id = config
        .id_override_field
        .as_ref()
        .and_then(|f| doc.get_string(f))
        .unwrap_or_else(|| doc.id())
        .to_string();
    let routing = config.routing_field.as_ref().and_then(|f| doc.get_string(f)).map(str::to_string);
    Operation::Upsert(UpsertRequest {
        id: effective_id,
        routing,
        version: version_for(offset, config),
        version_type: config.version_type,
        payload: document_payload(doc, config),
    })
}

/// Classify a batch, keeping only the latest operation per document id
/// (batch-order, not sorted) and grouping upserts before delete-by-id before
/// delete-by-query. Each document carries the source offset it was read at,
/// if any, for version stamping.
pub fn classify_batch(batch: Vec<(Document, Option<PartitionOffset>)>, config: &IndexerConfig) -> Vec<Operation> {
    let mut latest: IndexMap<String, Operation> = IndexMap::new();
    for (doc, offset) in &batch {
        let op = classify_one(doc, *offset, config);
        latest.insert(doc.id().to_string(), op);
    }

    let mut upserts = Vec::new();
    let mut delete_ids = Vec::new();
    let mut delete_queries = Vec::new();
    for (_, op) in latest {
        match op {
            Operation::Upsert(_) => upserts.push(op),
            Operation::DeleteById(_) => delete_ids.push(op),
            Operation::DeleteByQuery(_) => delete_queries.push(op),
        }
    }

    upserts.into_iter().chain(delete_ids).chain(delete_queries).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(docs: Vec<Document>) -> Vec<(Document, Option<PartitionOffset>)> {
        docs.into_iter().map(|d| (d, None)).collect()
    }

    fn config_with_deletion_marker() -> IndexerConfig {
        let mut cfg = IndexerConfig {
            batch_size: 10,
            batch_timeout: std::time::Duration::from_secs(1),
            id_override_field: None,
            routing_field: None,
            version_type: conveyor_core::VersionType::Internal,
            deletion_marker_field: Some("_deleted".into()),
            deletion_marker_field_value: Some("true".into()),
            delete_by_field_field: None,
            delete_by_field_value: None,
            ignore_fields: Vec::new(),
            drop_id_from_payload: false,
        };
        cfg.id_override_field = None;
        cfg
    }

    #[test]
    fn upsert_then_delete_same_batch_deletes_win() {
        let config = config_with_deletion_marker();
        let mut upsert_doc = Document::create("x");
        upsert_doc.set("title", "v1");
        let mut delete_doc = Document::create("x");
        delete_doc.set("_deleted", "true");

        let ops = classify_batch(batch(vec![upsert_doc, delete_doc]), &config);
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0], Operation::DeleteById(_)));
    }

    #[test]
    fn delete_then_upsert_same_batch_upsert_wins() {
        let config = config_with_deletion_marker();
        let mut delete_doc = Document::create("x");
        delete_doc.set("_deleted", "true");
        let mut upsert_doc = Document::create("x");
        upsert_doc.set("title", "v2");

        let ops = classify_batch(batch(vec![delete_doc, upsert_doc]), &config);
        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0], Operation::Upsert(_)));
    }

    #[test]
    fn ordering_is_upsert_then_delete_id_then_delete_query() {
        let mut config = config_with_deletion_marker();
        config.delete_by_field_field = Some("category".into());

        let mut upsert_doc = Document::create("a");
        upsert_doc.set("title", "v1");

        let mut delete_id_doc = Document::create("b");
        delete_id_doc.set("_deleted", "true");

        let mut delete_query_doc = Document::create("c");
        delete_query_doc.set("_deleted", "true");
        delete_query_doc.set("category", "stale");

        let ops = classify_batch(batch(vec![delete_query_doc, delete_id_doc, upsert_doc]), &config);
        assert!(matches!(ops[0], Operation::Upsert(_)));
        assert!(matches!(ops[1], Operation::DeleteById(_)));
        assert!(matches!(ops[2], Operation::DeleteByQuery(_)));
    }

    #[test]
    fn no_deletion_marker_is_always_upsert() {
        let config = no_deletion_marker_config();
        let doc = Document::create("a");
        let ops = classify_batch(batch(vec![doc]), &config);
        assert!(matches!(ops[0], Operation::Upsert(_)));
    }

    #[test]
    fn external_version_type_draws_version_from_offset() {
        let mut config = no_deletion_marker_config();
        config.version_type = conveyor_core::VersionType::External;
        let doc = Document::create("a");

        let ops = classify_batch(
            vec![(doc, Some(PartitionOffset { partition: 0, offset: 42 }))],
            &config,
        );
        match &ops[0] {
            Operation::Upsert(r) => assert_eq!(r.version, Some(42)),
            _ => panic!("expected upsert"),
        }
    }

    #[test]
    fn internal_version_type_never_sets_version() {
        let config = no_deletion_marker_config();
        let doc = Document::create("a");

        let ops = classify_batch(
            vec![(doc, Some(PartitionOffset { partition: 0, offset: 42 }))],
            &config,
        );
        match &ops[0] {
            Operation::Upsert(r) => assert_eq!(r.version, None),
            _ => panic!("expected upsert"),
        }
    }

    #[test]
    fn children_are_flattened_one_level_into_payload() {
        let config = no_deletion_marker_config();
        let mut parent = Document::create("p1");
        parent.set("title", "parent");
        let mut child = Document::create("c1");
        child.set("title", "child");
        parent.add_child(child);

        let ops = classify_batch(batch(vec![parent]), &config);
        match &ops[0] {
            Operation::Upsert(r) => {
                let children = r.payload.get("children").and_then(|v| v.as_array()).unwrap();
                assert_eq!(children.len(), 1);
                assert_eq!(children[0]["title"], "child");
            }
            _ => panic!("expected upsert"),
        }
    }

    fn no_deletion_marker_config() -> IndexerConfig {
        IndexerConfig {
            batch_size: 10,
            batch_timeout: std::time::Duration::from_secs(1),
            id_override_field: None,
            routing_field: None,
            version_type: conveyor_core::VersionType::Internal,
            deletion_marker_field: None,
            deletion_marker_field_value: None,
            delete_by_field_field: None,
            delete_by_field_value: None,
            ignore_fields: Vec::new(),
            drop_id_from_payload: false,
        }
    }
}
