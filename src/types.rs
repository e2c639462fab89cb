use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Identity of a resolved target.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    pub hostname: String,
    pub aliases: Vec<String>,
    pub addresses: Vec<IpAddr>,
}

impl HostRecord {
    pub fn primary_address(&self) -> Option<IpAddr> {
        self.addresses.first().copied()
    }
}

/// One port that accepted a connection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OpenPort {
    pub port: u16,
    pub service: String,
    pub latency_ms: u64,
}

/// Structured scan result; `open` is in ascending port order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub host: HostRecord,
    pub open: Vec<OpenPort>,
    /// Connection attempts made.
    pub probed: u64,
    /// Ports in range with no service table entry.
    pub skipped: u64,
    pub started_at: String,
    pub cancelled: bool,
}

impl ScanReport {
    pub fn open_ports(&self) -> Vec<u16> {
        self.open.iter().map(|e| e.port).collect()
    }
}

/// Either the bare port list or the rendered verbose report.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScanOutput {
    Ports(Vec<u16>),
    Report(String),
}

impl std::fmt::Display for ScanOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanOutput::Ports(ports) => write!(f, "{ports:?}"),
            ScanOutput::Report(report) => f.write_str(report),
        }
    }
}
