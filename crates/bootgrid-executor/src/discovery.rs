//! Host discovery: the facts a discovery task reports back.

use std::net::UdpSocket;

use tracing::debug;

use bootgrid_core::Telemetry;

use crate::error::{ExecutorError, ExecutorResult};

/// Source of a host's telemetry.
pub trait Discovery: Send + Sync {
    /// Gather telemetry. May block briefly on local I/O.
    fn discover(&self) -> ExecutorResult<Telemetry>;
}

/// Discovers the running host.
///
/// The reachable address is the local end of a UDP socket "connected" to
/// a public address; no packet is sent.
#[derive(Debug, Clone)]
pub struct SystemDiscovery {
    probe_addr: String,
}

impl SystemDiscovery {
    pub fn new() -> Self {
        Self {
            probe_addr: "8.8.8.8:80".to_string(),
        }
    }

    pub fn with_probe_addr(mut self, addr: impl Into<String>) -> Self {
        self.probe_addr = addr.into();
        self
    }

    fn local_ip(&self) -> ExecutorResult<String> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| ExecutorError::Discovery(format!("bind udp socket: {e}")))?;
        socket
            .connect(&self.probe_addr)
            .map_err(|e| ExecutorError::Discovery(format!("route to {}: {e}", self.probe_addr)))?;
        let addr = socket
            .local_addr()
            .map_err(|e| ExecutorError::Discovery(format!("local address: {e}")))?;
        Ok(addr.ip().to_string())
    }
}

impl Default for SystemDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl Discovery for SystemDiscovery {
    fn discover(&self) -> ExecutorResult<Telemetry> {
        let mut telemetry = Telemetry::new(self.local_ip()?);
        telemetry.hostname = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().into_owned());
        telemetry.cpus = std::thread::available_parallelism().ok().map(|n| n.get());
        telemetry.load_avg = load_avg();
        debug!(ip = %telemetry.ip_addr, host = ?telemetry.hostname, "host discovered");
        Ok(telemetry)
    }
}

/// Fixed telemetry, for hosts whose address is known up front.
#[derive(Debug, Clone)]
pub struct StaticDiscovery {
    telemetry: Telemetry,
}

impl StaticDiscovery {
    pub fn new(telemetry: Telemetry) -> Self {
        Self { telemetry }
    }
}

impl Discovery for StaticDiscovery {
    fn discover(&self) -> ExecutorResult<Telemetry> {
        Ok(self.telemetry.clone())
    }
}

/// One-minute load average, where the platform exposes it.
fn load_avg() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/proc/loadavg").ok()?;
        content.split_whitespace().next()?.parse().ok()
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}
