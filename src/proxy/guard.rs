//! Outbound target guard (SSRF mitigation).
//!
//! # Responsibilities
//! - Enforce the port policy (80, 443, or default only) before any network call
//! - Resolve the target host and reject loopback/link-local/private/CGNAT ranges
//! - Fail closed: a resolution failure rejects the target
//!
//! # Design Decisions
//! - Range membership uses `ipnet` CIDR tests on the canonical address form,
//!   so IPv4-mapped IPv6 addresses are judged as their embedded IPv4 address
//! - A single disallowed address rejects the whole target, however many
//!   addresses the lookup returned
//! - Redirects are not re-validated after the initial check; like DNS answers
//!   changing between check and fetch, this is a known hardening gap

use std::net::IpAddr;
use std::sync::LazyLock;
use std::time::Duration;

use ipnet::IpNet;
use thiserror::Error;
use url::{Host, Url};

#[derive(Debug, Error)]
pub enum GuardError {
    #[error(
        "requests on ports other than 80 and 443 are forbidden to mitigate the possibility of \
         port scanning (requested port {0})"
    )]
    ForbiddenPort(u16),
    #[error("target URL has no host")]
    NoHost,
    #[error("couldn't resolve target host")]
    Resolve(#[source] std::io::Error),
    #[error("target host resolution timed out")]
    ResolveTimeout,
    #[error("you cannot request certain special IPs (target resolves to {addr} in {range})")]
    Disallowed { addr: IpAddr, range: IpNet },
}

/// Address ranges the proxy refuses to fetch from.
static DISALLOWED_RANGES: LazyLock<Vec<IpNet>> = LazyLock::new(|| {
    [
        "127.0.0.0/8",    // loopback
        "::1/128",
        "169.254.0.0/16", // link-local unicast
        "fe80::/10",
        "224.0.0.0/24",   // link-local multicast
        "ff02::/16",
        "10.0.0.0/8",     // private
        "172.16.0.0/12",
        "192.168.0.0/16",
        "100.64.0.0/10",  // carrier-grade NAT
        "fc00::/7",       // unique local, covers fd00::/8
    ]
    .iter()
    .map(|cidr| cidr.parse().expect("static CIDR literal"))
    .collect()
});

/// Enforce the port policy. Runs before any resolution or network call.
pub fn check_port(target: &Url) -> Result<(), GuardError> {
    match target.port() {
        None | Some(80) | Some(443) => Ok(()),
        Some(other) => Err(GuardError::ForbiddenPort(other)),
    }
}

/// Resolve the target host and reject it if any resolved address falls in a
/// disallowed range. DNS lookups are bounded by `dns_timeout`.
pub async fn check_addresses(target: &Url, dns_timeout: Duration) -> Result<(), GuardError> {
    for addr in resolve(target, dns_timeout).await? {
        if let Some(range) = disallowed_range(addr) {
            return Err(GuardError::Disallowed { addr, range });
        }
    }
    Ok(())
}

/// The disallowed range containing `addr`, if any.
pub fn disallowed_range(addr: IpAddr) -> Option<IpNet> {
    let canonical = addr.to_canonical();
    DISALLOWED_RANGES.iter().find(|net| net.contains(&canonical)).copied()
}

async fn resolve(target: &Url, dns_timeout: Duration) -> Result<Vec<IpAddr>, GuardError> {
    match target.host() {
        None => Err(GuardError::NoHost),
        Some(Host::Ipv4(ip)) => Ok(vec![IpAddr::V4(ip)]),
        Some(Host::Ipv6(ip)) => Ok(vec![IpAddr::V6(ip)]),
        Some(Host::Domain(domain)) => {
            let port = target.port_or_known_default().unwrap_or(80);
            let lookup = tokio::net::lookup_host((domain, port));
            let addrs: Vec<IpAddr> = tokio::time::timeout(dns_timeout, lookup)
                .await
                .map_err(|_| GuardError::ResolveTimeout)?
                .map_err(GuardError::Resolve)?
                .map(|sock| sock.ip())
                .collect();
            if addrs.is_empty() {
                return Err(GuardError::Resolve(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "lookup returned no addresses",
                )));
            }
            Ok(addrs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn default_and_standard_ports_are_allowed() {
        assert!(check_port(&url("http://example.com/")).is_ok());
        assert!(check_port(&url("http://example.com:443/")).is_ok());
        assert!(check_port(&url("https://example.com/")).is_ok());
        // Default port for the scheme is elided by the parser.
        assert!(check_port(&url("https://example.com:443/")).is_ok());
    }

    #[test]
    fn other_ports_are_forbidden() {
        assert!(matches!(
            check_port(&url("http://example.com:8080/")),
            Err(GuardError::ForbiddenPort(8080))
        ));
        assert!(matches!(
            check_port(&url("http://example.com:22/")),
            Err(GuardError::ForbiddenPort(22))
        ));
    }

    #[test]
    fn private_ranges_are_disallowed() {
        for addr in [
            "127.0.0.1",
            "10.0.0.1",
            "10.255.255.255",
            "100.64.0.1",
            "100.127.255.255",
            "169.254.18.5",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.1.1",
            "224.0.0.5",
            "::1",
            "fe80::1",
            "fc00::1",
            "fd12:3456::1",
        ] {
            let addr: IpAddr = addr.parse().unwrap();
            assert!(disallowed_range(addr).is_some(), "{addr} should be disallowed");
        }
    }

    #[test]
    fn public_addresses_are_allowed() {
        for addr in [
            "93.184.216.34",
            "8.8.8.8",
            "172.32.0.1",
            "100.128.0.1",
            "2606:2800:220:1:248:1893:25c8:1946",
        ] {
            let addr: IpAddr = addr.parse().unwrap();
            assert!(disallowed_range(addr).is_none(), "{addr} should be allowed");
        }
    }

    #[test]
    fn ipv4_mapped_ipv6_is_judged_as_ipv4() {
        let addr: IpAddr = "::ffff:10.0.0.1".parse().unwrap();
        assert!(disallowed_range(addr).is_some());
    }

    #[tokio::test]
    async fn literal_ip_targets_skip_dns() {
        let timeout = Duration::from_secs(1);
        assert!(matches!(
            check_addresses(&url("http://10.0.0.1/"), timeout).await,
            Err(GuardError::Disallowed { .. })
        ));
        assert!(check_addresses(&url("http://93.184.216.34/"), timeout).await.is_ok());
        assert!(matches!(
            check_addresses(&url("http://[::1]/"), timeout).await,
            Err(GuardError::Disallowed { .. })
        ));
    }
}
