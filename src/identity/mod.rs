//! Host identity resolution.
//!
//! Determines the outbound IPv4 address and fully-qualified hostname that
//! identify this machine in status reports. Both lookups degrade to a
//! best-effort value instead of failing.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use tracing::debug;

/// Remote address used to pick the outbound interface. No packet is sent.
const PROBE_TARGET: &str = "10.255.255.255:1";

/// Identity of the reporting host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdentity {
    /// Fully-qualified hostname, or the configured override.
    pub hostname: String,
    /// Outbound IP address.
    pub ip_address: IpAddr,
}

impl NetworkIdentity {
    /// Resolve the identity of this host.
    ///
    /// `student_id` replaces the resolved hostname when provided.
    pub fn resolve(student_id: Option<&str>) -> Self {
        let hostname = match student_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => fqdn(),
        };

        Self {
            hostname,
            ip_address: outbound_ip(),
        }
    }
}

/// Best-guess outbound IP address, falling back to loopback.
pub fn outbound_ip() -> IpAddr {
    match PROBE_TARGET.parse::<SocketAddr>() {
        Ok(target) => outbound_ip_via(target),
        Err(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
    }
}

/// Ask the OS which local address it would use to reach `target`.
///
/// Connecting a UDP socket only sets its default peer, so the local address
/// is chosen without any traffic. The socket is dropped on every path.
pub fn outbound_ip_via(target: SocketAddr) -> IpAddr {
    let probe = || -> std::io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(target)?;
        Ok(socket.local_addr()?.ip())
    };

    match probe() {
        Ok(ip) => ip,
        Err(e) => {
            debug!("Outbound address probe failed: {}", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

/// Fully-qualified name of this host.
///
/// Resolves the OS hostname and reverse-resolves its addresses; the first
/// name containing a dot wins. Falls back to the plain hostname.
///
/// Only the primary name of each reverse lookup is considered, not the
/// alias list `gethostbyaddr` would also return.
pub fn fqdn() -> String {
    let hostname = gethostname::gethostname().to_string_lossy().trim().to_string();
    if hostname.is_empty() {
        return "localhost".to_string();
    }

    canonical_name(&hostname).unwrap_or(hostname)
}

fn canonical_name(hostname: &str) -> Option<String> {
    let addrs = match dns_lookup::lookup_host(hostname) {
        Ok(addrs) => addrs,
        Err(e) => {
            debug!("Cannot resolve host {}: {}", hostname, e);
            return None;
        }
    };

    addrs
        .into_iter()
        .filter_map(|addr| dns_lookup::lookup_addr(&addr).ok())
        .find(|name| is_qualified(name))
}

fn is_qualified(name: &str) -> bool {
    name.contains('.') && !name.ends_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_target_uses_loopback_interface() {
        let target: SocketAddr = "127.0.0.1:9".parse().unwrap();
        assert_eq!(outbound_ip_via(target), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_probe_failure_falls_back_to_loopback() {
        // An IPv4 socket cannot connect to an IPv6 peer.
        let target: SocketAddr = "[::1]:1".parse().unwrap();
        assert_eq!(outbound_ip_via(target), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_outbound_ip_is_ipv4() {
        assert!(outbound_ip().is_ipv4());
    }

    #[test]
    fn test_fqdn_is_never_empty() {
        assert!(!fqdn().is_empty());
    }

    #[test]
    fn test_student_id_override() {
        let identity = NetworkIdentity::resolve(Some("  student-42 "));
        assert_eq!(identity.hostname, "student-42");

        let identity = NetworkIdentity::resolve(Some(""));
        assert!(!identity.hostname.is_empty());
    }

    #[test]
    fn test_is_qualified() {
        assert!(is_qualified("lab01.cern.ch"));
        assert!(!is_qualified("lab01"));
        assert!(!is_qualified("lab01."));
    }
}
