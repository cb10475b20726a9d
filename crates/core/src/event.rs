//! Event: the value object carried on the event stream between Worker/Indexer
//! and the Publisher that owns a run's outstanding-document ledger.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// A child document has been emitted and is now in flight.
    Create,
    /// A document reached a terminal, successful state.
    Finish,
    /// A document reached a terminal, failed state.
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub document_id: String,
    pub run_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The document whose processing produced this one. `None` for a
    /// document that entered the run directly from a connector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<String>,
}

impl Event {
    pub fn create(document_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            run_id: run_id.into(),
            event_type: EventType::Create,
            status: EventStatus::Success,
            message: None,
            caused_by: None,
        }
    }

    /// A CREATE event for a document fanned out from `parent_id`.
    pub fn create_child(document_id: impl Into<String>, run_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        let mut event = Self::create(document_id, run_id);
        event.caused_by = Some(parent_id.into());
        event
    }

    pub fn finish(document_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            run_id: run_id.into(),
            event_type: EventType::Finish,
            status: EventStatus::Success,
            message: None,
            caused_by: None,
        }
    }

    /// Carries only the first line of the underlying error's `Display` output —
    /// the full error chain belongs in the log, not on the wire.
    pub fn fail(document_id: impl Into<String>, run_id: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let first_line = message.lines().next().unwrap_or_default().to_string();
        Self {
            document_id: document_id.into(),
            run_id: run_id.into(),
            event_type: EventType::Fail,
            status: EventStatus::Failure,
            message: Some(first_line),
            caused_by: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.event_type, EventType::Finish | EventType::Fail)
    }
}
