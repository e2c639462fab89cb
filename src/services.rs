use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Port -> service name. Only ports present here are ever probed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTable {
    services: BTreeMap<u16, String>,
}

impl ServiceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in table of common well-known TCP services.
    pub fn well_known() -> Self {
        const WELL_KNOWN: &[(u16, &str)] = &[
            (20, "ftp"),
            (21, "ftp"),
            (22, "ssh"),
            (23, "telnet"),
            (25, "smtp"),
            (43, "whois"),
            (53, "dns"),
            (68, "dhcp"),
            (80, "http"),
            (110, "pop3"),
            (137, "netbios"),
            (139, "netbios"),
            (143, "imap"),
            (161, "snmp"),
            (162, "snmp"),
            (389, "ldap"),
            (443, "https"),
            (445, "microsoft-ds"),
            (500, "isakmp"),
            (554, "rtsp"),
            (636, "ldaps"),
            (989, "ftps"),
            (990, "ftps"),
            (993, "imaps"),
            (995, "pop3s"),
            (1433, "ms-sql-s"),
            (1723, "pptp"),
            (3306, "mysql"),
            (3389, "ms-wbt-server"),
            (5432, "postgresql"),
            (5900, "vnc"),
            (6379, "redis"),
            (8080, "http-proxy"),
            (8443, "https-alt"),
            (27017, "mongodb"),
        ];
        WELL_KNOWN.iter().copied().collect()
    }

    pub fn insert(&mut self, port: u16, name: impl Into<String>) -> Option<String> {
        self.services.insert(port, name.into())
    }

    pub fn get(&self, port: u16) -> Option<&str> {
        self.services.get(&port).map(String::as_str)
    }

    pub fn contains(&self, port: u16) -> bool {
        self.services.contains_key(&port)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Entries in ascending port order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &str)> {
        self.services.iter().map(|(p, s)| (*p, s.as_str()))
    }
}

impl<S: Into<String>> FromIterator<(u16, S)> for ServiceTable {
    fn from_iter<I: IntoIterator<Item = (u16, S)>>(iter: I) -> Self {
        let mut table = ServiceTable::new();
        for (port, name) in iter {
            table.insert(port, name);
        }
        table
    }
}

/// Parse service table content.
///
/// One `port name` pair per line; everything after `#` is ignored and blank
/// lines are skipped. A repeated port overwrites the earlier name.
pub fn parse_services_str(s: &str) -> Result<ServiceTable> {
    let mut table = ServiceTable::new();

    for (idx, raw_line) in s.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.split('#').next().map(str::trim).unwrap_or("");
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let (Some(port), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
            bail!("line {line_no}: expected `<port> <service>`: {line}");
        };
        let port = parse_port_str(port)
            .with_context(|| format!("line {line_no}: invalid port value: {port}"))?;
        table.insert(port, name);
    }

    Ok(table)
}

/// Load a service table from a file path. Errors if the file cannot be read or parsed.
pub fn load_services_from_path(path: impl AsRef<Path>) -> Result<ServiceTable> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read services file: {}", path.as_ref().display()))?;
    parse_services_str(&content)
}

/// Inclusive port range. Iterates nothing when `low > high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub low: u16,
    pub high: u16,
}

impl PortRange {
    pub fn new(low: u16, high: u16) -> Self {
        Self { low, high }
    }

    /// Parse `start-end` or a single port.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some((a, b)) = s.split_once('-') {
            let start = parse_port_str(a.trim())
                .with_context(|| format!("invalid start in range: {a}"))?;
            let end =
                parse_port_str(b.trim()).with_context(|| format!("invalid end in range: {b}"))?;
            if start > end {
                bail!("invalid range {start}-{end} (start > end)");
            }
            return Ok(Self::new(start, end));
        }
        let p = parse_port_str(s).with_context(|| format!("invalid port value: {s}"))?;
        Ok(Self::new(p, p))
    }

    pub fn ports(&self) -> std::ops::RangeInclusive<u16> {
        self.low..=self.high
    }

    pub fn contains(&self, port: u16) -> bool {
        self.ports().contains(&port)
    }

    pub fn len(&self) -> usize {
        if self.low > self.high {
            0
        } else {
            usize::from(self.high - self.low) + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<(u16, u16)> for PortRange {
    fn from((low, high): (u16, u16)) -> Self {
        Self::new(low, high)
    }
}

impl From<[u16; 2]> for PortRange {
    fn from([low, high]: [u16; 2]) -> Self {
        Self::new(low, high)
    }
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > 65535 {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
