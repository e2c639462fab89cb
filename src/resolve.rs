use crate::error::ScanError;
use crate::types::HostRecord;
use dns_lookup::AddrInfoHints;
use std::future::Future;
use std::io;
use std::net::IpAddr;
use tracing::{debug, warn};

/// How a target string is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Digits and dots only: reverse lookup.
    Address,
    /// Anything else: forward lookup.
    Name,
}

/// Classify a target by removing every `.` and checking that the rest is
/// non-empty and all ASCII digits. Octet ranges are not validated.
pub fn classify_target(target: &str) -> TargetKind {
    let mut digits = target.chars().filter(|&c| c != '.').peekable();
    if digits.peek().is_some() && digits.all(|c| c.is_ascii_digit()) {
        TargetKind::Address
    } else {
        TargetKind::Name
    }
}

/// Host name resolution backend.
pub trait Resolver {
    /// Name -> canonical hostname, aliases, addresses.
    fn forward(&self, name: &str) -> impl Future<Output = io::Result<HostRecord>> + Send;

    /// Address text -> hostname, aliases, addresses.
    fn reverse(&self, address: &str) -> impl Future<Output = io::Result<HostRecord>> + Send;
}

/// Resolve `target` according to its classification.
pub async fn resolve_target<R: Resolver>(resolver: &R, target: &str) -> Result<HostRecord, ScanError> {
    let (result, err) = match classify_target(target) {
        TargetKind::Address => (resolver.reverse(target).await, ScanError::InvalidIpAddress),
        TargetKind::Name => (resolver.forward(target).await, ScanError::InvalidHostname),
    };
    match result {
        Ok(record) if !record.addresses.is_empty() => {
            debug!(host = target, hostname = %record.hostname, addresses = ?record.addresses, "resolved target");
            Ok(record)
        }
        Ok(_) => {
            warn!(host = target, "resolution returned no addresses");
            Err(err)
        }
        Err(e) => {
            warn!(host = target, error = %e, "resolution failed");
            Err(err)
        }
    }
}

/// Platform resolver (`getaddrinfo` / `getnameinfo`), run on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    async fn forward(&self, name: &str) -> io::Result<HostRecord> {
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || forward_blocking(&name))
            .await
            .map_err(io::Error::other)?
    }

    async fn reverse(&self, address: &str) -> io::Result<HostRecord> {
        let address = address.to_owned();
        tokio::task::spawn_blocking(move || reverse_blocking(&address))
            .await
            .map_err(io::Error::other)?
    }
}

fn forward_blocking(name: &str) -> io::Result<HostRecord> {
    let hints = AddrInfoHints {
        socktype: libc::SOCK_STREAM,
        flags: libc::AI_CANONNAME,
        ..AddrInfoHints::default()
    };
    let mut hostname = None;
    let mut addresses: Vec<IpAddr> = Vec::new();
    for info in dns_lookup::getaddrinfo(Some(name), None, Some(hints)).map_err(io::Error::from)? {
        let info = info?;
        if hostname.is_none() {
            hostname = info.canonname;
        }
        let ip = info.sockaddr.ip();
        if !addresses.contains(&ip) {
            addresses.push(ip);
        }
    }
    Ok(HostRecord {
        hostname: hostname.unwrap_or_else(|| name.to_string()),
        aliases: Vec::new(),
        addresses: ipv4_first(addresses),
    })
}

/// Stable partition: IPv4 addresses keep their order and move ahead of IPv6, so
/// the primary address of a dual-stack name is its first A record.
pub fn ipv4_first(addresses: Vec<IpAddr>) -> Vec<IpAddr> {
    let (mut v4, v6): (Vec<IpAddr>, Vec<IpAddr>) =
        addresses.into_iter().partition(IpAddr::is_ipv4);
    v4.extend(v6);
    v4
}

fn reverse_blocking(address: &str) -> io::Result<HostRecord> {
    let ip: IpAddr = address
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let hostname = dns_lookup::lookup_addr(&ip)?;
    Ok(HostRecord {
        hostname,
        aliases: Vec::new(),
        addresses: vec![ip],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_syntactic() {
        assert_eq!(classify_target("104.26.10.78"), TargetKind::Address);
        assert_eq!(classify_target("266.255.9.10"), TargetKind::Address);
        assert_eq!(classify_target("1234"), TargetKind::Address);
        assert_eq!(classify_target("1.2.3.4.5"), TargetKind::Address);
        assert_eq!(classify_target("scanme.nmap.org"), TargetKind::Name);
        assert_eq!(classify_target("10.0.0.1a"), TargetKind::Name);
        assert_eq!(classify_target("::1"), TargetKind::Name);
        assert_eq!(classify_target("..."), TargetKind::Name);
        assert_eq!(classify_target(""), TargetKind::Name);
    }

    #[test]
    fn ipv4_addresses_lead_in_stable_order() {
        let v6a: IpAddr = "2600:3c01::f03c:91ff:fe18:bb2f".parse().unwrap();
        let v6b: IpAddr = "::1".parse().unwrap();
        let v4a = IpAddr::from([45, 33, 32, 156]);
        let v4b = IpAddr::from([127, 0, 0, 1]);
        assert_eq!(ipv4_first(vec![v6a, v4a, v6b, v4b]), vec![v4a, v4b, v6a, v6b]);
        assert_eq!(ipv4_first(vec![v6a, v6b]), vec![v6a, v6b]);
        assert!(ipv4_first(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn out_of_range_octet_is_invalid_ip() {
        let err = resolve_target(&SystemResolver, "266.255.9.10").await.unwrap_err();
        assert_eq!(err, ScanError::InvalidIpAddress);
    }

    #[tokio::test]
    async fn reserved_tld_is_invalid_hostname() {
        let err = resolve_target(&SystemResolver, "no-such-host.invalid")
            .await
            .unwrap_err();
        assert_eq!(err, ScanError::InvalidHostname);
    }

    #[tokio::test]
    async fn loopback_reverse_keeps_address() {
        let rec = resolve_target(&SystemResolver, "127.0.0.1").await.unwrap();
        assert_eq!(rec.primary_address(), Some(IpAddr::from([127, 0, 0, 1])));
        assert!(!rec.hostname.is_empty());
    }
}
