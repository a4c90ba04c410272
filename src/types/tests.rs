use std::net::{IpAddr, Ipv6Addr};
use std::time::Duration;

use super::*;

#[test]
fn test_config_defaults() {
    let config = PairingConfig::default();
    assert_eq!(config.http_port, 47989);
    assert_eq!(config.https_port, 47984);
    assert_eq!(config.connect_timeout, Duration::from_secs(10));
    assert_eq!(config.pin_entry_timeout, Duration::from_secs(120));
    assert_eq!(config.step_timeout, Duration::from_secs(10));
    assert!(config.confirm_over_tls);
    assert!(config.identity_path.is_none());
}

#[test]
fn test_config_builder() {
    let config = PairingConfig::builder()
        .device_name("Living Room Pad")
        .step_timeout(Duration::from_secs(3))
        .confirm_over_tls(false)
        .identity_path("/tmp/identity.json")
        .build();

    assert_eq!(config.device_name, "Living Room Pad");
    assert_eq!(config.step_timeout, Duration::from_secs(3));
    assert!(!config.confirm_over_tls);
    assert!(config.identity_path.is_some());
}

#[test]
fn test_host_address_ipv6() {
    let host = HostAddress::from(IpAddr::V6(Ipv6Addr::LOCALHOST));
    assert!(host.is_ipv6());
    assert_eq!(host.authority(47989), "[::1]:47989");
    assert_eq!(host.to_string(), "[::1]");

    let bracketed = HostAddress::new("[fe80::1]");
    assert_eq!(bracketed.host, "fe80::1");
}

#[test]
fn test_host_address_hostname() {
    let host = HostAddress::new("gaming-pc.local").with_http_port(8080);
    assert!(!host.is_ipv6());
    assert_eq!(host.http_port, 8080);
    assert_eq!(host.https_port, DEFAULT_HTTPS_PORT);
    assert_eq!(host.authority(host.http_port), "gaming-pc.local:8080");
}

#[test]
fn test_config_host_address_uses_configured_ports() {
    let config = PairingConfig::builder().http_port(1).https_port(2).build();
    let host = config.host_address("10.0.0.5");
    assert_eq!((host.http_port, host.https_port), (1, 2));
}
