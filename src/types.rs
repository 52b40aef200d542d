use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::resolver::HostMetadata;

/// Everything learned about one address during a scan.
///
/// Fields only ever move forward: `reachable` goes from false to true,
/// each optional field is set at most once and `open_ports` only grows.
///
/// Serialize-only: records are built through the mutators below.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    address: String,
    reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    operating_system: Option<String>,
    open_ports: BTreeSet<u16>,
}

impl DeviceRecord {
    /// A new, not-yet-reachable record.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            reachable: false,
            response_time_ms: None,
            hostname: None,
            mac_address: None,
            vendor: None,
            operating_system: None,
            open_ports: BTreeSet::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    pub fn response_time_ms(&self) -> Option<u64> {
        self.response_time_ms
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn mac_address(&self) -> Option<&str> {
        self.mac_address.as_deref()
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    pub fn operating_system(&self) -> Option<&str> {
        self.operating_system.as_deref()
    }

    pub fn open_ports(&self) -> &BTreeSet<u16> {
        &self.open_ports
    }

    /// Mark the host reachable. Only the first call records a response time;
    /// returns whether this call changed the record.
    pub fn mark_reachable(&mut self, response_time: Duration) -> bool {
        if self.reachable {
            return false;
        }
        self.reachable = true;
        self.response_time_ms = Some(response_time.as_millis() as u64);
        true
    }

    /// Fill in any metadata fields that are still unset.
    pub fn apply_metadata(&mut self, meta: &HostMetadata) {
        set_once(&mut self.hostname, &meta.hostname);
        set_once(&mut self.mac_address, &meta.mac_address);
        set_once(&mut self.vendor, &meta.vendor);
        set_once(&mut self.operating_system, &meta.operating_system);
    }

    pub fn add_open_ports(&mut self, ports: impl IntoIterator<Item = u16>) {
        self.open_ports.extend(ports);
    }
}

fn set_once(slot: &mut Option<String>, value: &Option<String>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}

/// Aggregate counts over a roster.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCounts {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
}

impl DeviceCounts {
    /// Share of online devices as a percentage, 0 for an empty roster.
    pub fn online_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.online as f64 * 100.0 / self.total as f64
        }
    }
}

/// Final, read-only outcome of one scan.
///
/// Devices are ordered by plain string comparison of their address
/// (`10.0.0.10` sorts before `10.0.0.2`).
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    started_at: String,
    elapsed: Duration,
    devices: Vec<DeviceRecord>,
}

impl ScanResult {
    /// Build a result, sorting devices by address. If an address appears more
    /// than once only its first record is kept.
    pub fn new(mut devices: Vec<DeviceRecord>, elapsed: Duration, started_at: impl Into<String>) -> Self {
        devices.sort_by(|a, b| a.address.cmp(&b.address));
        devices.dedup_by(|later, first| later.address == first.address);
        Self {
            started_at: started_at.into(),
            elapsed,
            devices,
        }
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    /// RFC 3339 timestamp of when the scan started.
    pub fn started_at(&self) -> &str {
        &self.started_at
    }

    /// Total wall-clock duration of the scan.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, address: &str) -> Option<&DeviceRecord> {
        self.devices
            .binary_search_by(|d| d.address.as_str().cmp(address))
            .ok()
            .map(|i| &self.devices[i])
    }

    pub fn online(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.iter().filter(|d| d.reachable)
    }

    pub fn offline(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.iter().filter(|d| !d.reachable)
    }

    pub fn counts(&self) -> DeviceCounts {
        let total = self.devices.len();
        let online = self.online().count();
        DeviceCounts {
            total,
            online,
            offline: total - online,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reachability_never_reverts_and_keeps_first_rtt() {
        let mut rec = DeviceRecord::new("10.0.0.1");
        assert!(!rec.is_reachable());
        assert!(rec.mark_reachable(Duration::from_millis(12)));
        assert!(!rec.mark_reachable(Duration::from_millis(99)));
        assert!(rec.is_reachable());
        assert_eq!(rec.response_time_ms(), Some(12));
    }

    #[test]
    fn metadata_fields_are_set_once() {
        let mut rec = DeviceRecord::new("10.0.0.1");
        rec.apply_metadata(&HostMetadata {
            hostname: Some("printer".into()),
            ..Default::default()
        });
        rec.apply_metadata(&HostMetadata {
            hostname: Some("other".into()),
            mac_address: Some("00:11:22:33:44:55".into()),
            ..Default::default()
        });
        assert_eq!(rec.hostname(), Some("printer"));
        assert_eq!(rec.mac_address(), Some("00:11:22:33:44:55"));
        assert_eq!(rec.vendor(), None);
    }

    #[test]
    fn open_ports_only_grow() {
        let mut rec = DeviceRecord::new("10.0.0.1");
        rec.add_open_ports([80, 22]);
        rec.add_open_ports([]);
        rec.add_open_ports([443, 80]);
        assert_eq!(rec.open_ports().iter().copied().collect::<Vec<_>>(), vec![22, 80, 443]);
    }

    #[test]
    fn result_is_sorted_lexicographically_and_unique() {
        let devices = ["10.0.0.2", "10.0.0.10", "10.0.0.1", "10.0.0.2"]
            .into_iter()
            .map(DeviceRecord::new)
            .collect();
        let res = ScanResult::new(devices, Duration::from_secs(1), "2026-01-01T00:00:00Z");
        let addrs: Vec<_> = res.devices().iter().map(DeviceRecord::address).collect();
        assert_eq!(addrs, vec!["10.0.0.1", "10.0.0.10", "10.0.0.2"]);
        assert!(res.get("10.0.0.10").is_some());
        assert!(res.get("10.0.0.3").is_none());
    }

    #[test]
    fn counts_add_up() {
        let mut up = DeviceRecord::new("10.0.0.1");
        up.mark_reachable(Duration::from_millis(3));
        let res = ScanResult::new(
            vec![up, DeviceRecord::new("10.0.0.2"), DeviceRecord::new("10.0.0.3")],
            Duration::ZERO,
            "",
        );
        let c = res.counts();
        assert_eq!(c, DeviceCounts { total: 3, online: 1, offline: 2 });
        assert_eq!(c.total, c.online + c.offline);
        assert!((c.online_ratio() - 33.333).abs() < 0.01);
        assert_eq!(DeviceCounts::default().online_ratio(), 0.0);
    }

    #[test]
    fn json_shape_uses_camel_case_and_omits_unset_fields() {
        let mut rec = DeviceRecord::new("10.0.0.1");
        rec.mark_reachable(Duration::from_millis(4));
        rec.add_open_ports([443, 22]);
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "address": "10.0.0.1",
                "reachable": true,
                "responseTimeMs": 4,
                "openPorts": [22, 443]
            })
        );
    }

    #[test]
    fn fresh_record_serializes_only_required_fields() {
        let v = serde_json::to_value(DeviceRecord::new("10.0.0.9")).unwrap();
        assert_eq!(
            v,
            serde_json::json!({ "address": "10.0.0.9", "reachable": false, "openPorts": [] })
        );
    }
}
