//! Wire-format envelope for documents and events on the broker transport.
//!
//! Unlike the ambient messaging envelope this crate's sibling systems use
//! elsewhere, documents and events on this substrate are carried as JSON —
//! the wire format is part of the contract external producers/consumers
//! integrate against, so it favors inspectability over density.

use serde::{Deserialize, Serialize};

use crate::error::MessengerError;

/// Envelope around a JSON-serializable payload, tagged with a partition
/// offset so the broker-backed messenger can track redelivery and commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub payload: T,
    /// Present only for broker-sourced envelopes; `None` for in-memory mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<PartitionOffset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionOffset {
    pub partition: u32,
    pub offset: u64,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            offset: None,
        }
    }

    pub fn with_offset(payload: T, offset: PartitionOffset) -> Self {
        Self {
            payload,
            offset: Some(offset),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, MessengerError> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl<T: for<'de> Deserialize<'de>> Envelope<T> {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MessengerError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_without_offset() {
        let env = Envelope::new("hello".to_string());
        let bytes = env.to_bytes().unwrap();
        let back: Envelope<String> = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(back.payload, "hello");
        assert!(back.offset.is_none());
    }

    #[test]
    fn roundtrip_with_offset() {
        let env = Envelope::with_offset(42u64, PartitionOffset { partition: 0, offset: 7 });
        let bytes = env.to_bytes().unwrap();
        let back: Envelope<u64> = Envelope::from_bytes(&bytes).unwrap();
        assert_eq!(back.payload, 42);
        assert_eq!(back.offset, Some(PartitionOffset { partition: 0, offset: 7 }));
    }
}
