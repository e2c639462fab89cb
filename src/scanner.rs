use crate::error::ScanError;
use crate::resolve::{resolve_target, Resolver, SystemResolver};
use crate::services::{PortRange, ServiceTable};
use crate::types::{HostRecord, OpenPort, ScanOutput, ScanReport};
use ::time::{format_description::well_known, OffsetDateTime};
use std::fmt::Write as _;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Connect timeout and worker pool width for a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    pub timeout: Duration,
    /// Concurrent connection attempts, clamped to `1..=5000`. `1` is sequential.
    pub concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            concurrency: 64,
        }
    }
}

/// Resolve `target` with the platform resolver and probe `range`.
pub async fn scan_ports(
    target: &str,
    range: PortRange,
    services: &ServiceTable,
    config: &ProbeConfig,
) -> Result<ScanReport, ScanError> {
    scan_ports_with(&SystemResolver, target, range, services, config, CancellationToken::new()).await
}

/// Like [`scan_ports`], stopping early once `cancel` fires.
pub async fn scan_ports_with_cancel(
    target: &str,
    range: PortRange,
    services: &ServiceTable,
    config: &ProbeConfig,
    cancel: CancellationToken,
) -> Result<ScanReport, ScanError> {
    scan_ports_with(&SystemResolver, target, range, services, config, cancel).await
}

/// Resolve `target` with `resolver`, then probe every port of `range` that has a
/// service table entry.
///
/// - Resolution failure returns before any connection attempt.
/// - Each attempt is bounded by `config.timeout`; the socket is dropped as soon
///   as the attempt finishes.
/// - Attempts run through a `Semaphore`-bounded `JoinSet`; results are
///   returned in ascending port order regardless of completion order.
pub async fn scan_ports_with<R: Resolver>(
    resolver: &R,
    target: &str,
    range: PortRange,
    services: &ServiceTable,
    config: &ProbeConfig,
    cancel: CancellationToken,
) -> Result<ScanReport, ScanError> {
    let host = resolve_target(resolver, target).await?;
    let ip = host
        .primary_address()
        .ok_or(ScanError::InvalidHostname)?;
    Ok(probe_host(host, ip, range, services, config, cancel).await)
}

async fn probe_host(
    host: HostRecord,
    ip: IpAddr,
    range: PortRange,
    services: &ServiceTable,
    config: &ProbeConfig,
    cancel: CancellationToken,
) -> ScanReport {
    let started_at = now_iso_like();
    info!(%ip, low = range.low, high = range.high, "starting port probe");

    let sem = Arc::new(Semaphore::new(config.concurrency.clamp(1, 5_000)));
    let mut set = JoinSet::new();
    let mut probed = 0u64;
    let mut skipped = 0u64;

    for port in range.ports() {
        if cancel.is_cancelled() {
            break;
        }
        if !services.contains(port) {
            skipped += 1;
            continue;
        }
        let permit = tokio::select! {
            p = sem.clone().acquire_owned() => match p {
                Ok(p) => p,
                Err(_) => break,
            },
            _ = cancel.cancelled() => break,
        };
        probed += 1;
        let timeout = config.timeout;

        set.spawn(async move {
            let _permit = permit;
            let start = Instant::now();
            let open = probe_port(SocketAddr::new(ip, port), timeout).await;
            (port, open.then(|| start.elapsed().as_millis() as u64))
        });
    }

    let mut open = Vec::new();
    while let Some(res) = set.join_next().await {
        if let Ok((port, Some(latency_ms))) = res {
            open.push(OpenPort {
                port,
                service: services.get(port).unwrap_or_default().to_string(),
                latency_ms,
            });
        }
    }
    open.sort_unstable_by_key(|e| e.port);

    info!(%ip, probed, open = open.len(), "port probe finished");
    ScanReport {
        host,
        open,
        probed,
        skipped,
        started_at,
        cancelled: cancel.is_cancelled(),
    }
}

/// One bounded connect attempt. Refused, unreachable, and timed out are all closed.
async fn probe_port(addr: SocketAddr, timeout: Duration) -> bool {
    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            debug!(%addr, "open");
            true
        }
        Ok(Err(e)) => {
            debug!(%addr, error = %e, "closed");
            false
        }
        Err(_) => {
            debug!(%addr, "timed out");
            false
        }
    }
}

/// Render the human-readable report.
///
/// ```text
/// Open ports for {hostname} ({address})
/// PORT     SERVICE
/// 443      https
/// ```
pub fn format_report(host: &HostRecord, open_ports: &[u16], services: &ServiceTable) -> String {
    let address = host
        .primary_address()
        .map(|a| a.to_string())
        .unwrap_or_default();
    let mut out = format!("Open ports for {} ({})\n", host.hostname, address);
    let _ = writeln!(out, "PORT{:>12}", "SERVICE");
    for &port in open_ports {
        let _ = writeln!(out, "{:<9}{}", port, services.get(port).unwrap_or_default());
    }
    out.truncate(out.trim_end_matches('\n').len());
    out
}

/// Scan and shape the result: the port list, or the rendered report when `verbose`.
pub async fn get_open_ports(
    target: &str,
    range: impl Into<PortRange>,
    verbose: bool,
    services: &ServiceTable,
    config: &ProbeConfig,
) -> Result<ScanOutput, ScanError> {
    let report = scan_ports(target, range.into(), services, config).await?;
    Ok(shape_output(&report, verbose, services))
}

/// Turn a finished report into the requested output shape.
pub fn shape_output(report: &ScanReport, verbose: bool, services: &ServiceTable) -> ScanOutput {
    let ports = report.open_ports();
    if verbose {
        ScanOutput::Report(format_report(&report.host, &ports, services))
    } else {
        ScanOutput::Ports(ports)
    }
}

fn now_iso_like() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn host(name: &str, ip: [u8; 4]) -> HostRecord {
        HostRecord {
            hostname: name.to_string(),
            aliases: Vec::new(),
            addresses: vec![IpAddr::from(ip)],
        }
    }

    #[test]
    fn report_single_port_layout() {
        let services = ServiceTable::well_known();
        let report = format_report(&host("104.26.10.78", [104, 26, 10, 78]), &[443], &services);
        assert_eq!(
            report,
            "Open ports for 104.26.10.78 (104.26.10.78)\nPORT     SERVICE\n443      https"
        );
        let data_line = report.lines().last().unwrap();
        assert_eq!(&data_line[..9], "443      ");
        assert_eq!(&data_line[9..], "https");
    }

    #[test]
    fn report_multiple_ports_and_no_trailing_newline() {
        let services = ServiceTable::well_known();
        let report = format_report(&host("scanme.nmap.org", [45, 33, 32, 156]), &[22, 80], &services);
        assert_eq!(
            report,
            "Open ports for scanme.nmap.org (45.33.32.156)\nPORT     SERVICE\n22       ssh\n80       http"
        );
    }

    #[test]
    fn report_without_open_ports_is_header_only() {
        let report = format_report(&host("localhost", [127, 0, 0, 1]), &[], &ServiceTable::well_known());
        assert_eq!(report, "Open ports for localhost (127.0.0.1)\nPORT     SERVICE");
    }

    #[tokio::test]
    async fn probe_port_closed_on_refused() {
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        assert!(!probe_port(addr, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn probe_port_open_on_listener() {
        let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(probe_port(addr, Duration::from_millis(500)).await);
    }
}
