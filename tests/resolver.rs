mod common;

use std::net::IpAddr;

use cellmqtt::error::ResolveError;
use cellmqtt::resolver::{BrokerEndpoint, BrokerResolver};
use common::MockDns;

fn v4() -> IpAddr {
    "93.184.216.34".parse().unwrap()
}

fn v6() -> IpAddr {
    "2001:db8::42".parse().unwrap()
}

#[test]
fn test_ipv4_selected_when_listed_first() {
    let mut dns = MockDns::with(&[v4(), v6()]);
    let endpoint = BrokerResolver::resolve(&mut dns, "broker.example", 1883).unwrap();
    assert_eq!(endpoint, BrokerEndpoint::new([93, 184, 216, 34].into(), 1883));
}

#[test]
fn test_ipv4_selected_when_listed_after_ipv6() {
    let mut dns = MockDns::with(&[v6(), v4()]);
    let endpoint = BrokerResolver::resolve(&mut dns, "broker.example", 8883).unwrap();
    assert_eq!(endpoint.ip(), "93.184.216.34".parse::<std::net::Ipv4Addr>().unwrap());
    assert_eq!(endpoint.port(), 8883);
}

#[test]
fn test_first_of_several_ipv4_wins() {
    let mut dns = MockDns::with(&[v6(), "10.1.1.1".parse().unwrap(), v4()]);
    let endpoint = BrokerResolver::resolve(&mut dns, "broker.example", 1883).unwrap();
    assert_eq!(endpoint.to_string(), "10.1.1.1:1883");
}

#[test]
fn test_only_ipv6_is_no_usable_address() {
    let mut dns = MockDns::with(&[v6()]);
    assert_eq!(
        BrokerResolver::resolve(&mut dns, "broker.example", 1883),
        Err(ResolveError::NoUsableAddress)
    );
}

#[test]
fn test_empty_answer_is_no_usable_address() {
    let mut dns = MockDns::with(&[]);
    assert_eq!(
        BrokerResolver::resolve(&mut dns, "broker.example", 1883),
        Err(ResolveError::NoUsableAddress)
    );
}

#[test]
fn test_lookup_failure_propagates() {
    let mut dns = MockDns::failing(ResolveError::LookupFailed);
    assert_eq!(
        BrokerResolver::resolve(&mut dns, "broker.example", 1883),
        Err(ResolveError::LookupFailed)
    );
    assert_eq!(dns.lookups, vec!["broker.example"]);
}

#[test]
fn test_unspecified_endpoint() {
    let endpoint = BrokerEndpoint::unspecified(1883);
    assert!(endpoint.is_unspecified());
    assert_eq!(endpoint.to_string(), "0.0.0.0:1883");
    assert!(!BrokerEndpoint::new([127, 0, 0, 1].into(), 1883).is_unspecified());
}
