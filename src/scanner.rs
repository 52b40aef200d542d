use ::time::{format_description::well_known, OffsetDateTime};
use std::collections::BTreeMap;
use std::future::Future;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::netdetect::{generate_range, infer_local_network};
use crate::probe::{probe_reachability, scan_host_ports};
use crate::resolver::{Resolver, SystemResolver};
use crate::scheduler::BatchScheduler;
use crate::types::{DeviceRecord, ScanResult};

/// Mapping from address to its record while a scan is in progress.
///
/// Exactly one record exists per address and records are never removed.
/// Keys are address strings, so iteration order is the final result order.
#[derive(Debug, Default)]
pub struct Roster {
    devices: BTreeMap<String, DeviceRecord>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `addr`, created unreachable on first use.
    pub fn register(&mut self, addr: Ipv4Addr) -> &mut DeviceRecord {
        let key = addr.to_string();
        self.devices
            .entry(key)
            .or_insert_with_key(|k| DeviceRecord::new(k.as_str()))
    }

    pub fn get(&self, address: &str) -> Option<&DeviceRecord> {
        self.devices.get(address)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Addresses currently marked reachable, in roster order.
    pub fn reachable_hosts(&self) -> Vec<Ipv4Addr> {
        self.devices
            .values()
            .filter(|d| d.is_reachable())
            .filter_map(|d| d.address().parse().ok())
            .collect()
    }

    /// Freeze the roster into the read-only result handed to callers.
    pub fn freeze(self, elapsed: Duration, started_at: impl Into<String>) -> ScanResult {
        ScanResult::new(self.devices.into_values().collect(), elapsed, started_at)
    }
}

/// Runs a complete scan: range generation, reachability sweep, optional deep
/// scan and aggregation.
pub struct Scanner {
    config: ScanConfig,
    resolver: Arc<dyn Resolver>,
    cancel: Option<CancellationToken>,
}

impl Scanner {
    /// Scanner that resolves metadata through the operating system.
    pub fn new(config: ScanConfig) -> Self {
        Self::with_resolver(config, Arc::new(SystemResolver::new()))
    }

    pub fn with_resolver(config: ScanConfig, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            config,
            resolver,
            cancel: None,
        }
    }

    /// Allow `token` to stop the scan. It is checked before every batch; an
    /// in-flight batch always finishes. A cancelled scan returns
    /// [`ScanError::Cancelled`] instead of a partial result.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run the whole scan. Only configuration problems and cancellation fail;
    /// unreachable hosts and failed lookups are part of a normal result.
    pub async fn scan(&self) -> Result<ScanResult, ScanError> {
        let started = Instant::now();
        let started_at = now_rfc3339();

        let network = match self.config.network() {
            Some(net) => net,
            None => infer_local_network().await,
        };
        let addrs = generate_range(network)?;
        info!(%network, hosts = addrs.len(), "starting reachability sweep");

        let mut roster = Roster::new();
        self.sweep(&addrs, &mut roster).await?;

        if self.config.deep_scan() {
            self.deep_scan(&mut roster).await?;
        }

        let result = roster.freeze(started.elapsed(), started_at);
        let counts = result.counts();
        info!(
            total = counts.total,
            online = counts.online,
            elapsed_ms = result.elapsed().as_millis() as u64,
            "scan complete"
        );
        Ok(result)
    }

    /// Probe every address and record the ones that answer. Every address
    /// gets a record, reachable or not.
    pub async fn sweep(&self, addrs: &[Ipv4Addr], roster: &mut Roster) -> Result<(), ScanError> {
        for &addr in addrs {
            roster.register(addr);
        }

        let timeout = self.config.timeout();
        let outcomes = self
            .schedule(addrs.iter().copied(), move |addr| async move {
                (addr, probe_reachability(addr, timeout).await)
            })
            .await?;

        let mut online = 0usize;
        for (addr, rtt) in outcomes {
            if let Some(rtt) = rtt {
                debug!(%addr, rtt_ms = rtt.as_millis() as u64, "host answered");
                roster.register(addr).mark_reachable(rtt);
                online += 1;
            }
        }
        info!(online, "reachability sweep done");
        Ok(())
    }

    /// Resolve metadata and probe the configured ports on every host that is
    /// currently reachable. Both run concurrently; ports of one host are
    /// probed one after another.
    pub async fn deep_scan(&self, roster: &mut Roster) -> Result<(), ScanError> {
        let hosts = roster.reachable_hosts();
        if hosts.is_empty() {
            debug!("no reachable hosts, skipping deep scan");
            return Ok(());
        }
        info!(hosts = hosts.len(), ports = self.config.ports().len(), "starting deep scan");

        let resolver = self.resolver.clone();
        let metadata = self.schedule(hosts.iter().copied(), move |addr| {
            let resolver = resolver.clone();
            async move { (addr, resolver.resolve(addr).await) }
        });

        let ports: Arc<[u16]> = self.config.ports().into();
        let port_scan = self.schedule(hosts.iter().copied(), move |addr| {
            let ports = ports.clone();
            async move { (addr, scan_host_ports(addr, &ports).await) }
        });

        let (metadata, port_scan) = tokio::join!(metadata, port_scan);

        for (addr, meta) in metadata? {
            if let Some(meta) = meta {
                roster.register(addr).apply_metadata(&meta);
            }
        }
        for (addr, open) in port_scan? {
            if !open.is_empty() {
                debug!(%addr, ?open, "open ports");
            }
            roster.register(addr).add_open_ports(open);
        }
        Ok(())
    }

    async fn schedule<I, F, Fut, T>(&self, items: I, op: F) -> Result<Vec<T>, ScanError>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let scheduler = BatchScheduler::new(self.config.max_concurrent());
        match &self.cancel {
            Some(token) => scheduler.run_cancellable(items, op, token).await,
            None => Ok(scheduler.run(items, op).await),
        }
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanOptions;
    use crate::resolver::{HostMetadata, NoopResolver};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    struct CountingResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Resolver for CountingResolver {
        async fn resolve(&self, _addr: Ipv4Addr) -> Option<HostMetadata> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Some(HostMetadata {
                hostname: Some(format!("host-{n}")),
                mac_address: Some("00:11:22:33:44:55".into()),
                ..Default::default()
            })
        }
    }

    fn config(opts: ScanOptions) -> ScanConfig {
        ScanConfig::try_from(opts).unwrap()
    }

    #[test]
    fn roster_keeps_one_record_per_address() {
        let mut roster = Roster::new();
        let a = Ipv4Addr::new(10, 0, 0, 1);
        roster.register(a).mark_reachable(Duration::from_millis(5));
        roster.register(a);
        roster.register(Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(roster.len(), 2);
        assert!(roster.get("10.0.0.1").unwrap().is_reachable());
        assert_eq!(roster.reachable_hosts(), vec![a]);
    }

    #[tokio::test]
    async fn unsupported_prefix_aborts_before_probing() {
        let scanner = Scanner::with_resolver(
            config(ScanOptions {
                network: Some("10.0.0.0/16".into()),
                ..Default::default()
            }),
            Arc::new(NoopResolver),
        );
        let started = std::time::Instant::now();
        let err = scanner.scan().await.unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedRange { prefix: 16, .. }));
        // The default probe timeout is 3 s; failing fast means nothing was sent.
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn deep_scan_never_loses_ports_or_metadata() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = listener.local_addr().unwrap().port();
        let resolver = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });
        let scanner = Scanner::with_resolver(
            config(ScanOptions {
                ports: Some(vec![80, open_port as u32]),
                deep_scan: Some(true),
                ..Default::default()
            }),
            resolver.clone(),
        );

        let mut roster = Roster::new();
        let host = roster.register(Ipv4Addr::LOCALHOST);
        host.mark_reachable(Duration::from_millis(1));
        host.add_open_ports([80]);

        scanner.deep_scan(&mut roster).await.unwrap();
        scanner.deep_scan(&mut roster).await.unwrap();

        let rec = roster.get("127.0.0.1").unwrap();
        assert!(rec.open_ports().contains(&80));
        assert!(rec.open_ports().contains(&open_port));
        assert_eq!(rec.hostname(), Some("host-0"));
        assert_eq!(rec.mac_address(), Some("00:11:22:33:44:55"));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn deep_scan_skips_unreachable_hosts() {
        let resolver = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });
        let scanner = Scanner::with_resolver(ScanConfig::default(), resolver.clone());
        let mut roster = Roster::new();
        roster.register(Ipv4Addr::new(192, 0, 2, 1));

        scanner.deep_scan(&mut roster).await.unwrap();

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert!(roster.get("192.0.2.1").unwrap().hostname().is_none());
    }

    #[tokio::test]
    async fn cancelled_scan_reports_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let scanner = Scanner::with_resolver(
            config(ScanOptions {
                network: Some("127.0.0.0/24".into()),
                timeout_ms: Some(20),
                ..Default::default()
            }),
            Arc::new(NoopResolver),
        )
        .with_cancellation(token);

        assert!(matches!(scanner.scan().await, Err(ScanError::Cancelled)));
    }
}
