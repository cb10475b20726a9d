//! TOML-driven configuration for a distributed (broker-backed) deployment.
//! Mirrors the teacher's `EisenbahnConfig::from_toml` shape.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MessengerError;
use crate::transport::Transport;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportToml {
    pub kind: String,
    pub ipc_name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl TransportToml {
    fn into_transport(self) -> Result<Transport, MessengerError> {
        match self.kind.as_str() {
            "ipc" => {
                let name = self
                    .ipc_name
                    .ok_or_else(|| MessengerError::Config("ipc transport missing ipc_name".into()))?;
                Ok(Transport::ipc(&name))
            }
            "tcp" => {
                let host = self
                    .host
                    .ok_or_else(|| MessengerError::Config("tcp transport missing host".into()))?;
                let port = self
                    .port
                    .ok_or_else(|| MessengerError::Config("tcp transport missing port".into()))?;
                Ok(Transport::tcp(host, port))
            }
            other => Err(MessengerError::Config(format!("unknown transport kind '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessengerConfigToml {
    pub source: TransportToml,
    pub destination: TransportToml,
    pub events: TransportToml,
    #[serde(default = "default_dedup_hold_ms")]
    pub dedup_hold_ms: u64,
}

fn default_dedup_hold_ms() -> u64 {
    5000
}

pub struct MessengerConfig {
    pub source: Transport,
    pub destination: Transport,
    pub events: Transport,
    pub dedup_hold: Duration,
}

impl MessengerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, MessengerError> {
        let parsed: MessengerConfigToml = toml::from_str(contents)?;
        Ok(Self {
            source: parsed.source.into_transport()?,
            destination: parsed.destination.into_transport()?,
            events: parsed.events.into_transport()?,
            dedup_hold: Duration::from_millis(parsed.dedup_hold_ms),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MessengerError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn local(pipeline_name: &str) -> Self {
        Self {
            source: Transport::ipc(&format!("{pipeline_name}-source")),
            destination: Transport::ipc(&format!("{pipeline_name}-destination")),
            events: Transport::ipc(&format!("{pipeline_name}-events")),
            dedup_hold: Duration::from_millis(5000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ipc_transports() {
        let toml = r#"
            dedup_hold_ms = 2000

            [source]
            kind = "ipc"
            ipc_name = "pipeline-source"

            [destination]
            kind = "ipc"
            ipc_name = "pipeline-destination"

            [events]
            kind = "tcp"
            host = "127.0.0.1"
            port = 5600
        "#;
        let cfg = MessengerConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.dedup_hold, Duration::from_millis(2000));
        assert_eq!(cfg.events.endpoint(), "tcp://127.0.0.1:5600");
    }

    #[test]
    fn rejects_unknown_transport_kind() {
        let toml = r#"
            [source]
            kind = "carrier-pigeon"

            [destination]
            kind = "ipc"
            ipc_name = "d"

            [events]
            kind = "ipc"
            ipc_name = "e"
        "#;
        assert!(MessengerConfig::from_toml_str(toml).is_err());
    }
}
