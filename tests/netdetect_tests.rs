use ipnet::Ipv4Net;
use lan_sweep::netdetect::{generate_range, ipv4_to_default_cidr};
use lan_sweep::ScanError;
use std::net::Ipv4Addr;

#[test]
fn default_cidr_is_24() {
    let cidr = ipv4_to_default_cidr(Ipv4Addr::new(192, 168, 42, 99));
    assert_eq!(cidr.to_string(), "192.168.42.0/24");
}

#[test]
fn expands_dot_one_through_dot_254() {
    let net: Ipv4Net = "10.0.0.0/24".parse().unwrap();
    let ips = generate_range(net).unwrap();
    let expected: Vec<Ipv4Addr> = (1..=254).map(|d| Ipv4Addr::new(10, 0, 0, d)).collect();
    assert_eq!(ips, expected);
}

#[test]
fn slash_16_is_rejected() {
    let net: Ipv4Net = "10.0.0.0/16".parse().unwrap();
    let err = generate_range(net).unwrap_err();
    assert!(matches!(err, ScanError::UnsupportedRange { prefix: 16, .. }));
    assert!(err.to_string().contains("10.0.0.0/16"));
}
