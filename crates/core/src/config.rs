//! Environment-driven configuration for the run-coordination core.
//!
//! Mirrors the teacher's `Config::from_env` shape but without the
//! multi-profile indirection: every key is read once, under a single
//! `CONVEYOR_` prefix.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// External versioning strategy the indexer attaches to a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Internal,
    External,
    ExternalGte,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_list(key: &str) -> Vec<String> {
    env_opt(key)
        .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn env_version_type(key: &str, default: VersionType) -> VersionType {
    match env_opt(key).as_deref() {
        Some("internal") => VersionType::Internal,
        Some("external") => VersionType::External,
        Some("external_gte") => VersionType::ExternalGte,
        Some(other) => {
            tracing::warn!(value = other, key, "unrecognized version type, falling back to default");
            default
        }
        None => default,
    }
}

/// Load a local `.env` file, silently ignoring a missing one.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub threads: usize,
    pub queue_capacity: Option<usize>,
}

impl WorkerConfig {
    fn from_env() -> Self {
        Self {
            threads: env_usize("CONVEYOR_WORKER_THREADS", 1),
            queue_capacity: env_opt("CONVEYOR_WORKER_QUEUE_CAPACITY").and_then(|v| v.parse().ok()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    pub batch_size: usize,
    #[serde(with = "duration_millis")]
    pub batch_timeout: Duration,
    pub id_override_field: Option<String>,
    pub routing_field: Option<String>,
    pub version_type: VersionType,
    pub deletion_marker_field: Option<String>,
    pub deletion_marker_field_value: Option<String>,
    pub delete_by_field_field: Option<String>,
    pub delete_by_field_value: Option<String>,
    pub ignore_fields: Vec<String>,
    pub drop_id_from_payload: bool,
}

impl IndexerConfig {
    fn from_env() -> Self {
        Self {
            batch_size: env_usize("CONVEYOR_INDEXER_BATCH_SIZE", 100),
            batch_timeout: Duration::from_millis(env_u64("CONVEYOR_INDEXER_BATCH_TIMEOUT_MS", 1000)),
            id_override_field: env_opt("CONVEYOR_INDEXER_ID_OVERRIDE_FIELD"),
            routing_field: env_opt("CONVEYOR_INDEXER_ROUTING_FIELD"),
            version_type: env_version_type("CONVEYOR_INDEXER_VERSION_TYPE", VersionType::Internal),
            deletion_marker_field: env_opt("CONVEYOR_INDEXER_DELETION_MARKER_FIELD"),
            deletion_marker_field_value: env_opt("CONVEYOR_INDEXER_DELETION_MARKER_FIELD_VALUE"),
            delete_by_field_field: env_opt("CONVEYOR_INDEXER_DELETE_BY_FIELD_FIELD"),
            delete_by_field_value: env_opt("CONVEYOR_INDEXER_DELETE_BY_FIELD_VALUE"),
            ignore_fields: env_list("CONVEYOR_INDEXER_IGNORE_FIELDS"),
            drop_id_from_payload: env_bool("CONVEYOR_INDEXER_DROP_ID_FROM_PAYLOAD", false),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(with = "duration_millis")]
    pub connector_timeout: Duration,
    pub worker: WorkerConfig,
    pub indexer: IndexerConfig,
}

impl RunnerConfig {
    /// Build config from environment variables. Call [`load_dotenv`] first if
    /// a local `.env` should be honored.
    pub fn from_env() -> Self {
        Self {
            connector_timeout: Duration::from_millis(env_u64(
                "CONVEYOR_RUNNER_CONNECTOR_TIMEOUT_MS",
                86_400_000,
            )),
            worker: WorkerConfig::from_env(),
            indexer: IndexerConfig::from_env(),
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            connector_timeout_ms = self.connector_timeout.as_millis() as u64,
            worker_threads = self.worker.threads,
            indexer_batch_size = self.indexer.batch_size,
            "runner config loaded"
        );
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            connector_timeout: Duration::from_millis(86_400_000),
            worker: WorkerConfig {
                threads: 1,
                queue_capacity: None,
            },
            indexer: IndexerConfig {
                batch_size: 100,
                batch_timeout: Duration::from_millis(1000),
                id_override_field: None,
                routing_field: None,
                version_type: VersionType::Internal,
                deletion_marker_field: None,
                deletion_marker_field_value: None,
                delete_by_field_field: None,
                delete_by_field_value: None,
                ignore_fields: Vec::new(),
                drop_id_from_payload: false,
            },
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
