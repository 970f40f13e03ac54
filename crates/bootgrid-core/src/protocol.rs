//! Wire payloads exchanged between the scheduler and its executors.
//!
//! Three payloads cross the cluster manager:
//! - discovery telemetry, carried in a FINISHED status update
//! - the launch-service command, sent scheduler → executor
//! - the acknowledgement literal, sent executor → scheduler
//!
//! Typed values are used internally; JSON appears only at this boundary.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// Well-known port every worker service listens on.
pub const WORKER_PORT: u16 = 9311;

/// Acknowledgement an executor sends once the worker service was spawned.
pub const SERVICE_LAUNCHED_ACK: &str = "service launched";

/// Payload of the RUNNING update sent when a discovery task starts.
pub const DISCOVERY_RUNNING: &str = "running discovery task";

/// Flag that precedes the port in a launch-service command.
pub const PORT_FLAG: &str = "-p";

// ── Telemetry ──────────────────────────────────────────────────────

/// Runtime facts an executor reports about its host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Address other hosts can reach this one on.
    pub ip_addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_avg: Option<f64>,
    /// Fields this version does not know about.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Telemetry {
    pub fn new(ip_addr: impl Into<String>) -> Self {
        Self {
            ip_addr: ip_addr.into(),
            hostname: None,
            cpus: None,
            load_avg: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn to_bytes(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> ProtocolResult<Self> {
        let telemetry: Telemetry = serde_json::from_slice(data)
            .map_err(|e| ProtocolError::Telemetry(e.to_string()))?;
        if telemetry.ip_addr.is_empty() {
            return Err(ProtocolError::Telemetry("empty ip_addr".to_string()));
        }
        Ok(telemetry)
    }
}

// ── Launch-service command ─────────────────────────────────────────

/// Instruction to start the worker service: a program and its arguments.
///
/// Encoded as a flat JSON array `[program, arg, ...]`. Numeric elements are
/// accepted when decoding and turned into their decimal string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl LaunchCommand {
    /// `[program, "-p", port]`
    pub fn worker(program: impl Into<String>, port: u16) -> Self {
        Self {
            program: program.into(),
            args: vec![PORT_FLAG.to_string(), port.to_string()],
        }
    }

    /// The full argv, program first.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    /// Port passed with `-p`, if any.
    pub fn port(&self) -> Option<u16> {
        let idx = self.args.iter().position(|a| a == PORT_FLAG)?;
        self.args.get(idx + 1)?.parse().ok()
    }

    pub fn to_bytes(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(data).map_err(|e| ProtocolError::LaunchCommand(e.to_string()))
    }
}

impl Serialize for LaunchCommand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.args.len() + 1))?;
        seq.serialize_element(&self.program)?;
        for arg in &self.args {
            seq.serialize_element(arg)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for LaunchCommand {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(ArgvVisitor)
    }
}

struct ArgvVisitor;

impl<'de> Visitor<'de> for ArgvVisitor {
    type Value = LaunchCommand;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a non-empty array of strings or numbers")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<LaunchCommand, A::Error> {
        let mut argv = Vec::new();
        while let Some(value) = seq.next_element::<serde_json::Value>()? {
            let arg = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                other => {
                    return Err(de::Error::custom(format!(
                        "unsupported argument {other}"
                    )));
                }
            };
            argv.push(arg);
        }
        let mut argv = argv.into_iter();
        let program = argv
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| de::Error::custom("missing program"))?;
        Ok(LaunchCommand {
            program,
            args: argv.collect(),
        })
    }
}

/// Whether an executor message is the expected acknowledgement.
pub fn is_service_ack(data: &[u8]) -> bool {
    data == SERVICE_LAUNCHED_ACK.as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_command_encodes_as_flat_array() {
        let cmd = LaunchCommand::worker("/opt/bin/worker", 9311);
        let json = String::from_utf8(cmd.to_bytes().unwrap()).unwrap();
        assert_eq!(json, r#"["/opt/bin/worker","-p","9311"]"#);
        assert_eq!(cmd.port(), Some(9311));
    }

    #[test]
    fn numeric_port_is_accepted() {
        let cmd = LaunchCommand::from_bytes(br#"["/bin/worker", "-p", 7000]"#).unwrap();
        assert_eq!(cmd.argv(), vec!["/bin/worker", "-p", "7000"]);
        assert_eq!(cmd.port(), Some(7000));
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = LaunchCommand::from_bytes(b"[]").unwrap_err();
        assert!(matches!(err, ProtocolError::LaunchCommand(_)));
    }

    #[test]
    fn nested_values_are_rejected() {
        assert!(LaunchCommand::from_bytes(br#"["/bin/worker", {"p": 1}]"#).is_err());
        assert!(LaunchCommand::from_bytes(br#"{"program": "/bin/worker"}"#).is_err());
    }

    #[test]
    fn telemetry_ignores_unknown_fields() {
        let t = Telemetry::from_bytes(br#"{"ip_addr": "10.0.0.5", "disk_free": 12}"#).unwrap();
        assert_eq!(t.ip_addr, "10.0.0.5");
        assert_eq!(t.hostname, None);
        assert!(t.extra.contains_key("disk_free"));
    }

    #[test]
    fn telemetry_requires_ip() {
        assert!(Telemetry::from_bytes(br#"{"hostname": "h1"}"#).is_err());
        assert!(Telemetry::from_bytes(br#"{"ip_addr": ""}"#).is_err());
        assert!(Telemetry::from_bytes(b"not json").is_err());
    }

    #[test]
    fn telemetry_survives_encoding() {
        let mut t = Telemetry::new("192.168.1.20");
        t.hostname = Some("worker-3".to_string());
        t.cpus = Some(8);
        let decoded = Telemetry::from_bytes(&t.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, t);
    }

    #[test]
    fn ack_literal() {
        assert!(is_service_ack(b"service launched"));
        assert!(!is_service_ack(b"service failed"));
    }
}
