use lan_sweep::resolver::NoopResolver;
use lan_sweep::{ScanConfig, ScanError, Scanner};
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test]
async fn loopback_sweep_without_deep_scan() {
    let config =
        ScanConfig::from_json(r#"{"network":"127.0.0.0/24","timeoutMs":50,"ports":[80]}"#).unwrap();
    let result = Scanner::with_resolver(config, Arc::new(NoopResolver))
        .scan()
        .await
        .expect("scan completes");

    assert_eq!(result.len(), 254);

    let addrs: Vec<&str> = result.devices().iter().map(|d| d.address()).collect();
    let mut sorted = addrs.clone();
    sorted.sort();
    assert_eq!(addrs, sorted, "devices are in string order");
    assert_eq!(addrs[0], "127.0.0.1");
    assert_eq!(addrs[1], "127.0.0.10");

    let unique: HashSet<&str> = addrs.iter().copied().collect();
    let expected: HashSet<String> = (1..=254).map(|d| format!("127.0.0.{d}")).collect();
    assert_eq!(unique.len(), 254);
    assert!(expected.iter().all(|a| unique.contains(a.as_str())));

    for d in result.devices() {
        assert!(d.open_ports().is_empty());
        assert!(d.hostname().is_none());
        assert_eq!(d.response_time_ms().is_some(), d.is_reachable());
    }

    let counts = result.counts();
    assert_eq!(counts.total, counts.online + counts.offline);
    assert_eq!(counts.online, result.online().count());
}

#[tokio::test]
async fn unsupported_range_is_the_only_fatal_error() {
    let config = ScanConfig::from_json(r#"{"network":"10.0.0.0/16"}"#).unwrap();
    let err = Scanner::with_resolver(config, Arc::new(NoopResolver))
        .scan()
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::UnsupportedRange { .. }));
}

#[tokio::test]
async fn open_ports_stay_within_configured_ports() {
    let config = ScanConfig::from_json(
        r#"{"network":"127.0.0.0/24","timeoutMs":30,"maxConcurrent":254,"ports":[22,80],"deepScan":true}"#,
    )
    .unwrap();
    let result = Scanner::with_resolver(config.clone(), Arc::new(NoopResolver))
        .scan()
        .await
        .unwrap();

    assert_eq!(result.len(), 254);
    let allowed: HashSet<u16> = config.ports().iter().copied().collect();
    for d in result.devices() {
        assert!(d.open_ports().iter().all(|p| allowed.contains(p)));
        if !d.is_reachable() {
            assert!(d.open_ports().is_empty());
        }
    }
}

#[tokio::test]
async fn oversized_max_concurrent_still_completes() {
    let config = ScanConfig::from_json(
        r#"{"network":"127.0.0.0/24","timeoutMs":20,"maxConcurrent":18446744073709551615}"#,
    )
    .unwrap();
    let result = Scanner::with_resolver(config, Arc::new(NoopResolver))
        .scan()
        .await
        .expect("scan completes");
    assert_eq!(result.len(), 254);
}
