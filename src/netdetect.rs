use if_addrs::{get_if_addrs, IfAddr};
use ipnet::Ipv4Net;
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::error::ScanError;

/// The only prefix length that can be expanded into a host list.
pub const SUPPORTED_PREFIX: u8 = 24;

/// Range swept when the local network cannot be inferred.
pub const FALLBACK_NETWORK: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 0);

/// Public address used only to select the default route; nothing is sent to it.
const ROUTE_PROBE_TARGET: &str = "1.1.1.1:80";

/// Expand a network into its candidate host addresses.
///
/// Only /24 networks are supported: the result is `.1` through `.254` of the
/// network's first three octets, in ascending order. Host bits in the base
/// address are ignored, so `10.0.0.77/24` expands like `10.0.0.0/24`.
pub fn generate_range(net: Ipv4Net) -> Result<Vec<Ipv4Addr>, ScanError> {
    if net.prefix_len() != SUPPORTED_PREFIX {
        return Err(ScanError::UnsupportedRange {
            network: net.to_string(),
            prefix: net.prefix_len(),
        });
    }
    let [a, b, c, _] = net.network().octets();
    Ok((1..=254).map(|d| Ipv4Addr::new(a, b, c, d)).collect())
}

/// Infer the local /24 to sweep. Never fails.
///
/// Tries the source address of the default route first, then the first
/// non-loopback interface, and finally [`FALLBACK_NETWORK`].
pub async fn infer_local_network() -> Ipv4Net {
    if let Some(ip) = default_route_ipv4().await {
        debug!(%ip, "local address from default route");
        return ipv4_to_default_cidr(ip);
    }
    match detect_local_cidrs() {
        Ok(cidrs) if !cidrs.is_empty() => cidrs[0],
        Ok(_) => {
            warn!("no IPv4 interface found, falling back to {FALLBACK_NETWORK}/24");
            ipv4_to_default_cidr(FALLBACK_NETWORK)
        }
        Err(e) => {
            warn!("failed to list interfaces ({e}), falling back to {FALLBACK_NETWORK}/24");
            ipv4_to_default_cidr(FALLBACK_NETWORK)
        }
    }
}

/// Detect local non-loopback IPv4 addresses and convert each to its /24.
///
/// For example, an interface IP `192.168.1.42` becomes `192.168.1.0/24`.
/// Duplicates are removed and the result is sorted by network address.
pub fn detect_local_cidrs() -> std::io::Result<Vec<Ipv4Net>> {
    let mut set = BTreeSet::new();
    for iface in get_if_addrs()? {
        if let IfAddr::V4(v4) = iface.addr {
            if v4.ip.is_loopback() {
                continue;
            }
            set.insert(ipv4_to_default_cidr(v4.ip));
        }
    }
    Ok(set.into_iter().collect())
}

/// Convert an IPv4 address into its /24 network.
pub fn ipv4_to_default_cidr(ip: Ipv4Addr) -> Ipv4Net {
    let [a, b, c, _] = ip.octets();
    Ipv4Net::new(Ipv4Addr::new(a, b, c, 0), SUPPORTED_PREFIX).unwrap_or_else(|_| Ipv4Net::from(ip))
}

/// Source address the kernel picks for the default route. Connecting a UDP
/// socket only selects a route, no datagram leaves the host.
async fn default_route_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await.ok()?;
    socket.connect(ROUTE_PROBE_TARGET).await.ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(v4) if !v4.is_unspecified() && !v4.is_loopback() => Some(v4),
        _ => None,
    }
}
