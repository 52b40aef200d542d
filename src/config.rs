use ipnet::Ipv4Net;
use serde::Deserialize;
use std::time::Duration;

use crate::error::ScanError;
use crate::ports::{dedup_ports, default_ports};

pub const DEFAULT_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_MAX_CONCURRENT: usize = 50;

/// Raw scan options as supplied by a caller. Every field is optional; omitted
/// fields take the defaults when converted into a [`ScanConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScanOptions {
    pub network: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_concurrent: Option<usize>,
    pub ports: Option<Vec<u32>>,
    pub deep_scan: Option<bool>,
}

/// Validated, read-only configuration for one scan invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    network: Option<Ipv4Net>,
    timeout: Duration,
    max_concurrent: usize,
    ports: Vec<u16>,
    deep_scan: bool,
}

impl ScanConfig {
    /// Parse and validate a JSON options document such as
    /// `{"network": "10.0.0.0/24", "deepScan": true}`.
    pub fn from_json(s: &str) -> Result<Self, ScanError> {
        let opts: ScanOptions =
            serde_json::from_str(s).map_err(|e| ScanError::InvalidConfig(e.to_string()))?;
        Self::try_from(opts)
    }

    /// Network to sweep, if one was given. `None` means "infer from the local host".
    pub fn network(&self) -> Option<Ipv4Net> {
        self.network
    }

    /// Per-address reachability probe timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Batch size used for every bounded fan-out.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Ports probed during a deep scan, in configured order without duplicates.
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    pub fn deep_scan(&self) -> bool {
        self.deep_scan
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            network: None,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            ports: default_ports(),
            deep_scan: false,
        }
    }
}

impl TryFrom<ScanOptions> for ScanConfig {
    type Error = ScanError;

    fn try_from(opts: ScanOptions) -> Result<Self, Self::Error> {
        let network = match opts.network.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(s.parse::<Ipv4Net>().map_err(|_| {
                ScanError::InvalidConfig(format!(
                    "network must look like a.b.c.d/prefix, got {s:?}"
                ))
            })?),
        };

        let timeout_ms = opts.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(ScanError::InvalidConfig("timeoutMs must be at least 1".into()));
        }

        let max_concurrent = opts.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT);
        if max_concurrent == 0 {
            return Err(ScanError::InvalidConfig(
                "maxConcurrent must be at least 1".into(),
            ));
        }

        let ports = match opts.ports {
            None => default_ports(),
            Some(raw) => {
                let mut ports = Vec::with_capacity(raw.len());
                for p in raw {
                    match u16::try_from(p) {
                        Ok(p) if p != 0 => ports.push(p),
                        _ => {
                            return Err(ScanError::InvalidConfig(format!(
                                "port out of range: {p}"
                            )))
                        }
                    }
                }
                dedup_ports(ports)
            }
        };

        Ok(Self {
            network,
            timeout: Duration::from_millis(timeout_ms),
            max_concurrent,
            ports,
            deep_scan: opts.deep_scan.unwrap_or(false),
        })
    }
}
