//! Best-effort host metadata: reverse DNS name, link-layer address and vendor.
//!
//! Every lookup here is allowed to fail. Failures are traced and turn into an
//! unset field, never into an error.

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// Upper bound on a single reverse name lookup.
pub const HOSTNAME_TIMEOUT: Duration = Duration::from_secs(2);

/// How long one `arp -a` snapshot is reused across hosts.
pub const NEIGHBOR_CACHE_TTL: Duration = Duration::from_secs(2);

/// Upper bound on reading the neighbor table.
pub const NEIGHBOR_TIMEOUT: Duration = Duration::from_secs(2);

/// Metadata discovered for one host. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostMetadata {
    pub hostname: Option<String>,
    pub mac_address: Option<String>,
    pub vendor: Option<String>,
    pub operating_system: Option<String>,
}

impl HostMetadata {
    pub fn is_empty(&self) -> bool {
        self.hostname.is_none()
            && self.mac_address.is_none()
            && self.vendor.is_none()
            && self.operating_system.is_none()
    }
}

/// Source of host metadata for the deep scan.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Look up whatever is known about `addr`. `None` when nothing was found.
    async fn resolve(&self, addr: Ipv4Addr) -> Option<HostMetadata>;
}

/// Resolver that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

#[async_trait]
impl Resolver for NoopResolver {
    async fn resolve(&self, _addr: Ipv4Addr) -> Option<HostMetadata> {
        None
    }
}

/// Resolver backed by the operating system: reverse DNS through the system
/// resolver and the neighbor table as printed by `arp -a`.
#[derive(Debug, Default)]
pub struct SystemResolver {
    neighbors: NeighborTable,
}

impl SystemResolver {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, addr: Ipv4Addr) -> Option<HostMetadata> {
        let (hostname, mac_address) =
            tokio::join!(reverse_dns(addr, HOSTNAME_TIMEOUT), self.neighbors.lookup(addr));
        let vendor = mac_address.as_deref().and_then(vendor_for_mac);

        let meta = HostMetadata {
            hostname,
            mac_address,
            vendor,
            operating_system: None,
        };
        debug!(%addr, ?meta, "metadata resolved");
        (!meta.is_empty()).then_some(meta)
    }
}

/// Reverse-resolve `addr` to a host name.
///
/// Resolvers that echo the numeric address back when no PTR record exists are
/// treated as "no name".
pub async fn reverse_dns(addr: Ipv4Addr, limit: Duration) -> Option<String> {
    let lookup = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&IpAddr::V4(addr)));
    let name = match time::timeout(limit, lookup).await {
        Ok(Ok(Ok(name))) => name,
        Ok(Ok(Err(e))) => {
            trace!(%addr, "reverse lookup failed: {e}");
            return None;
        }
        Ok(Err(e)) => {
            trace!(%addr, "reverse lookup task failed: {e}");
            return None;
        }
        Err(_) => {
            trace!(%addr, "reverse lookup timed out");
            return None;
        }
    };

    let name = name.trim().trim_end_matches('.');
    if name.is_empty() || name.parse::<IpAddr>().is_ok() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Manufacturer registered for the MAC's OUI prefix.
pub fn vendor_for_mac(mac: &str) -> Option<String> {
    oui_data::lookup(mac).map(|v| v.organization().to_owned())
}

/// Cached view of the system neighbor table.
#[derive(Debug)]
pub struct NeighborTable {
    ttl: Duration,
    limit: Duration,
    program: String,
    args: Vec<String>,
    snapshot: Mutex<Option<(Instant, Arc<str>)>>,
}

impl Default for NeighborTable {
    fn default() -> Self {
        Self::with_ttl(NEIGHBOR_CACHE_TTL)
    }
}

impl NeighborTable {
    /// Table read with `arp` in numeric mode, so listing it never waits on DNS.
    pub fn with_ttl(ttl: Duration) -> Self {
        let args: &[&str] = if cfg!(windows) { &["-a"] } else { &["-an"] };
        Self::with_command("arp", args).ttl(ttl)
    }

    /// Table read from an arbitrary command whose output looks like `arp -a`.
    pub fn with_command(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            ttl: NEIGHBOR_CACHE_TTL,
            limit: NEIGHBOR_TIMEOUT,
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            snapshot: Mutex::new(None),
        }
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Upper bound on one run of the table command.
    pub fn limit(mut self, limit: Duration) -> Self {
        self.limit = limit;
        self
    }

    /// MAC address listed for `addr`, normalized to lowercase `aa:bb:cc:dd:ee:ff`.
    pub async fn lookup(&self, addr: Ipv4Addr) -> Option<String> {
        let table = self.snapshot().await?;
        parse_arp_output(&table, addr)
    }

    async fn snapshot(&self) -> Option<Arc<str>> {
        // Held across the refresh so concurrent lookups share one run; the
        // run itself is bounded by `limit`.
        let mut guard = self.snapshot.lock().await;
        if let Some((taken, text)) = guard.as_ref() {
            if taken.elapsed() < self.ttl {
                return Some(text.clone());
            }
        }

        let run = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output();
        let output = match time::timeout(self.limit, run).await {
            Ok(Ok(o)) if o.status.success() => o,
            Ok(Ok(o)) => {
                trace!(program = %self.program, status = %o.status, "neighbor table command failed");
                return None;
            }
            Ok(Err(e)) => {
                trace!(program = %self.program, "neighbor table unavailable: {e}");
                return None;
            }
            Err(_) => {
                debug!(program = %self.program, limit_ms = self.limit.as_millis() as u64, "neighbor table timed out");
                return None;
            }
        };
        let text: Arc<str> = String::from_utf8_lossy(&output.stdout).into();
        *guard = Some((Instant::now(), text.clone()));
        Some(text)
    }
}

/// Find the MAC address for `addr` in `arp -a` output.
///
/// Handles the Linux/BSD form `? (10.0.0.1) at 0:1a:2b:3:4:5 on en0` and the
/// Windows form `10.0.0.1   00-1a-2b-03-04-05   dynamic`. The address must
/// match a whole token, so `10.0.0.1` never matches a row for `10.0.0.10`.
pub fn parse_arp_output(text: &str, addr: Ipv4Addr) -> Option<String> {
    let needle = addr.to_string();
    text.lines()
        .filter(|line| {
            line.split_whitespace()
                .any(|tok| tok.trim_matches(|c| c == '(' || c == ')') == needle)
        })
        .find_map(|line| line.split_whitespace().find_map(normalize_mac))
}

/// Normalize a MAC written with `:` or `-` separators and one or two hex
/// digits per group.
fn normalize_mac(token: &str) -> Option<String> {
    let groups: Vec<&str> = token.split(|c| c == ':' || c == '-').collect();
    if groups.len() != 6 {
        return None;
    }
    let mut octets = Vec::with_capacity(6);
    for g in groups {
        if g.is_empty() || g.len() > 2 {
            return None;
        }
        octets.push(u8::from_str_radix(g, 16).ok()?);
    }
    Some(
        octets
            .iter()
            .map(|o| format!("{o:02x}"))
            .collect::<Vec<_>>()
            .join(":"),
    )
}
