//! Host fact discovery: hostname, default addresses and interface indexes.
//!
//! The collector only reads host state through [`NetworkProbe`], so the
//! selection rules below are the same whether the data came from iproute2,
//! netlink, or a test fixture.

use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::document::{KEY_HOSTNAME, KEY_LOCAL_HOSTNAME, KEY_NETWORK, MetadataDocument};
use crate::error::Result;

/// MAC reported for loopback devices.
pub const NULL_MAC: &str = "00:00:00:00:00:00";
/// Loopback addresses never recorded in the indexes.
pub const LOOPBACK_IPV4: &str = "127.0.0.1";
pub const LOOPBACK_IPV6: &str = "::1";

pub const KEY_LOCAL_IPV4: &str = "local-ipv4";
pub const KEY_LOCAL_IPV6: &str = "local-ipv6";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl std::fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "ipv4"),
            AddressFamily::Ipv6 => write!(f, "ipv6"),
        }
    }
}

/// One address configured on an interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefixlen: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl AddressRecord {
    /// Build a record, deriving the netmask from the prefix length.
    pub fn new(family: AddressFamily, addr: impl Into<String>, prefixlen: Option<u8>) -> Self {
        Self {
            addr: addr.into(),
            netmask: prefixlen.and_then(|p| netmask(family, p)),
            prefixlen,
            ..Default::default()
        }
    }

    pub fn with_broadcast(mut self, broadcast: impl Into<String>) -> Self {
        self.broadcast = Some(broadcast.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// The record as a by-address index entry: everything but the
    /// address itself, plus the owning interface's MAC when known.
    fn index_entry(&self, mac: Option<&str>) -> Value {
        let mut entry = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        entry.shift_remove("addr");
        if let Some(mac) = mac {
            entry.insert("mac".to_string(), Value::String(mac.to_string()));
        }
        Value::Object(entry)
    }
}

/// Netmask for a prefix length, in the notation each family uses:
/// `255.255.255.0` for IPv4, `ffff:ffff:ffff:ffff::/64` for IPv6.
pub fn netmask(family: AddressFamily, prefixlen: u8) -> Option<String> {
    match family {
        AddressFamily::Ipv4 if prefixlen <= 32 => {
            let bits = u32::MAX.checked_shl(32 - prefixlen as u32).unwrap_or(0);
            Some(Ipv4Addr::from(bits).to_string())
        }
        AddressFamily::Ipv6 if prefixlen <= 128 => {
            let bits = u128::MAX.checked_shl(128 - prefixlen as u32).unwrap_or(0);
            Some(format!("{}/{}", Ipv6Addr::from(bits), prefixlen))
        }
        _ => None,
    }
}

/// A network interface as seen by the probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceFact {
    pub name: String,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub ipv4: Vec<AddressRecord>,
    #[serde(default)]
    pub ipv6: Vec<AddressRecord>,
}

impl InterfaceFact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = Some(mac.into());
        self
    }

    pub fn with_address(mut self, family: AddressFamily, record: AddressRecord) -> Self {
        match family {
            AddressFamily::Ipv4 => self.ipv4.push(record),
            AddressFamily::Ipv6 => self.ipv6.push(record),
        }
        self
    }

    pub fn addresses(&self, family: AddressFamily) -> &[AddressRecord] {
        match family {
            AddressFamily::Ipv4 => &self.ipv4,
            AddressFamily::Ipv6 => &self.ipv6,
        }
    }

    /// The interface's only address of `family`. More than one is
    /// ambiguous and yields `None` with a warning.
    fn sole_address(&self, family: AddressFamily) -> Option<&str> {
        match self.addresses(family) {
            [] => None,
            [only] => Some(only.addr.as_str()),
            many => {
                let addrs: Vec<&str> = many.iter().map(|r| r.addr.as_str()).collect();
                warn!(
                    device = %self.name,
                    %family,
                    addresses = ?addrs,
                    "device has more than one {} address", family
                );
                None
            }
        }
    }
}

/// Read-only view of the host's network state.
pub trait NetworkProbe {
    /// Fully-qualified hostname, if one can be determined.
    fn fqdn(&self) -> Option<String>;

    /// Device carrying the default route for `family`. Lookup failures
    /// are reported as `None`.
    fn default_route_device(&self, family: AddressFamily) -> Option<String>;

    /// All interfaces on the host. Only failure to list them at all is an
    /// error; an interface without addresses is a normal entry.
    fn interfaces(&self) -> Result<Vec<InterfaceFact>>;
}

/// Everything discovered about the host for one resolution cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostFacts {
    pub hostname: Option<String>,
    pub default_ipv4: Option<String>,
    pub default_ipv6: Option<String>,
    pub by_mac: Map<String, Value>,
    pub by_ipv4: Map<String, Value>,
    pub by_ipv6: Map<String, Value>,
}

impl HostFacts {
    /// Render as a metadata-shaped document, ready to be merged under the
    /// operator's metadata.
    pub fn to_document(&self) -> MetadataDocument {
        let mut doc = MetadataDocument::new();
        doc.insert(
            KEY_NETWORK,
            json!({
                "interfaces": {
                    "by-mac": self.by_mac,
                    "by-ipv4": self.by_ipv4,
                    "by-ipv6": self.by_ipv6,
                }
            }),
        );
        if let Some(hostname) = &self.hostname {
            doc.insert(KEY_HOSTNAME, Value::String(hostname.clone()));
            doc.insert(KEY_LOCAL_HOSTNAME, Value::String(hostname.clone()));
        }
        if let Some(ipv4) = &self.default_ipv4 {
            doc.insert(KEY_LOCAL_IPV4, Value::String(ipv4.clone()));
        }
        if let Some(ipv6) = &self.default_ipv6 {
            doc.insert(KEY_LOCAL_IPV6, Value::String(ipv6.clone()));
        }
        doc
    }
}

/// Collect host facts through `probe`.
pub fn collect(probe: &dyn NetworkProbe) -> Result<HostFacts> {
    let interfaces = probe.interfaces()?;

    let mut facts = HostFacts {
        hostname: probe.fqdn().filter(|h| !h.is_empty()),
        ..Default::default()
    };

    let (ipv4, ipv6) = default_addresses(probe, &interfaces);
    facts.default_ipv4 = ipv4;
    facts.default_ipv6 = ipv6;

    for iface in &interfaces {
        index_interface(&mut facts, iface);
    }

    debug!(
        hostname = ?facts.hostname,
        default_ipv4 = ?facts.default_ipv4,
        default_ipv6 = ?facts.default_ipv6,
        macs = facts.by_mac.len(),
        "collected host facts"
    );
    Ok(facts)
}

/// Default IPv4 and IPv6 addresses, taken from the devices that carry the
/// default routes. Either may be `None` when the family has no default
/// route or its device has more than one address.
fn default_addresses(
    probe: &dyn NetworkProbe,
    interfaces: &[InterfaceFact],
) -> (Option<String>, Option<String>) {
    let dev4 = route_interface(probe, interfaces, AddressFamily::Ipv4);
    let dev6 = route_interface(probe, interfaces, AddressFamily::Ipv6);
    if dev4.is_none() && dev6.is_none() {
        debug!("no default route for either address family");
        return (None, None);
    }

    let mut ipv4 = dev4.and_then(|d| d.sole_address(AddressFamily::Ipv4).map(str::to_string));
    let mut ipv6 = dev6.and_then(|d| d.sole_address(AddressFamily::Ipv6).map(str::to_string));

    // Dual-stack device with a default route in only one family: borrow
    // the other family's address from the same device.
    if ipv4.is_some() && dev6.is_none() {
        ipv6 = dev4.and_then(|d| d.sole_address(AddressFamily::Ipv6).map(str::to_string));
    }
    if ipv6.is_some() && dev4.is_none() {
        ipv4 = dev6.and_then(|d| d.sole_address(AddressFamily::Ipv4).map(str::to_string));
    }

    (ipv4, ipv6)
}

fn route_interface<'a>(
    probe: &dyn NetworkProbe,
    interfaces: &'a [InterfaceFact],
    family: AddressFamily,
) -> Option<&'a InterfaceFact> {
    let dev = probe.default_route_device(family)?;
    let iface = interfaces.iter().find(|i| i.name == dev);
    if iface.is_none() {
        debug!(device = %dev, %family, "default route device not found among interfaces");
    }
    iface
}

fn index_interface(facts: &mut HostFacts, iface: &InterfaceFact) {
    let mac = iface.mac.as_deref();
    if mac == Some(NULL_MAC) {
        return;
    }

    let ipv4: Vec<&AddressRecord> = iface
        .ipv4
        .iter()
        .filter(|r| r.addr != LOOPBACK_IPV4)
        .collect();
    let ipv6: Vec<&AddressRecord> = iface
        .ipv6
        .iter()
        .filter(|r| r.addr != LOOPBACK_IPV6)
        .collect();

    if let Some(mac) = mac {
        if !ipv4.is_empty() || !ipv6.is_empty() {
            let mut entry = Map::new();
            if !ipv4.is_empty() {
                entry.insert("ipv4".to_string(), json!(ipv4));
            }
            if !ipv6.is_empty() {
                entry.insert("ipv6".to_string(), json!(ipv6));
            }
            facts.by_mac.insert(mac.to_string(), Value::Object(entry));
        }
    }

    for record in ipv4 {
        facts
            .by_ipv4
            .insert(record.addr.clone(), record.index_entry(mac));
    }
    for record in ipv6 {
        facts
            .by_ipv6
            .insert(record.addr.clone(), record.index_entry(mac));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::HashMap;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct FakeProbe {
        fqdn: Option<String>,
        routes: HashMap<&'static str, String>,
        interfaces: Vec<InterfaceFact>,
        fail: bool,
    }

    impl FakeProbe {
        fn route(mut self, family: AddressFamily, dev: &str) -> Self {
            let key = match family {
                AddressFamily::Ipv4 => "4",
                AddressFamily::Ipv6 => "6",
            };
            self.routes.insert(key, dev.to_string());
            self
        }

        fn iface(mut self, iface: InterfaceFact) -> Self {
            self.interfaces.push(iface);
            self
        }
    }

    impl NetworkProbe for FakeProbe {
        fn fqdn(&self) -> Option<String> {
            self.fqdn.clone()
        }

        fn default_route_device(&self, family: AddressFamily) -> Option<String> {
            let key = match family {
                AddressFamily::Ipv4 => "4",
                AddressFamily::Ipv6 => "6",
            };
            self.routes.get(key).cloned()
        }

        fn interfaces(&self) -> Result<Vec<InterfaceFact>> {
            if self.fail {
                return Err(Error::InterfaceEnumeration {
                    reason: "boom".to_string(),
                });
            }
            Ok(self.interfaces.clone())
        }
    }

    fn v4(addr: &str) -> AddressRecord {
        AddressRecord::new(AddressFamily::Ipv4, addr, Some(24))
    }

    fn v6(addr: &str) -> AddressRecord {
        AddressRecord::new(AddressFamily::Ipv6, addr, Some(64))
    }

    fn loopback() -> InterfaceFact {
        InterfaceFact::new("lo")
            .with_mac(NULL_MAC)
            .with_address(AddressFamily::Ipv4, AddressRecord::new(AddressFamily::Ipv4, "127.0.0.1", Some(8)))
            .with_address(AddressFamily::Ipv6, AddressRecord::new(AddressFamily::Ipv6, "::1", Some(128)))
    }

    fn eth0() -> InterfaceFact {
        InterfaceFact::new("eth0")
            .with_mac("00:50:56:aa:bb:cc")
            .with_address(AddressFamily::Ipv4, v4("10.0.0.5").with_broadcast("10.0.0.255"))
            .with_address(AddressFamily::Ipv6, v6("fd00::5").with_scope("global"))
    }

    #[test]
    fn test_netmask_notation() {
        assert_eq!(netmask(AddressFamily::Ipv4, 24).as_deref(), Some("255.255.255.0"));
        assert_eq!(netmask(AddressFamily::Ipv4, 0).as_deref(), Some("0.0.0.0"));
        assert_eq!(netmask(AddressFamily::Ipv4, 32).as_deref(), Some("255.255.255.255"));
        assert_eq!(
            netmask(AddressFamily::Ipv6, 64).as_deref(),
            Some("ffff:ffff:ffff:ffff::/64")
        );
        assert_eq!(netmask(AddressFamily::Ipv4, 33), None);
    }

    #[test]
    fn test_single_stack_defaults() {
        let probe = FakeProbe::default()
            .route(AddressFamily::Ipv4, "eth0")
            .route(AddressFamily::Ipv6, "eth0")
            .iface(loopback())
            .iface(eth0());
        let facts = collect(&probe).unwrap();
        assert_eq!(facts.default_ipv4.as_deref(), Some("10.0.0.5"));
        assert_eq!(facts.default_ipv6.as_deref(), Some("fd00::5"));
    }

    #[test]
    fn test_no_default_routes() {
        let probe = FakeProbe::default().iface(eth0());
        let facts = collect(&probe).unwrap();
        assert_eq!(facts.default_ipv4, None);
        assert_eq!(facts.default_ipv6, None);
        // indexes are still populated
        assert!(facts.by_mac.contains_key("00:50:56:aa:bb:cc"));
    }

    #[test]
    #[traced_test]
    fn test_ambiguous_ipv4_is_undetermined() {
        let iface = InterfaceFact::new("eth0")
            .with_mac("00:50:56:00:00:01")
            .with_address(AddressFamily::Ipv4, v4("10.0.0.5"))
            .with_address(AddressFamily::Ipv4, v4("10.0.0.6"));
        let probe = FakeProbe::default()
            .route(AddressFamily::Ipv4, "eth0")
            .iface(iface);
        let facts = collect(&probe).unwrap();
        assert_eq!(facts.default_ipv4, None);
        assert_eq!(facts.default_ipv6, None);
        assert_eq!(facts.by_ipv4.len(), 2);
        assert!(logs_contain("device has more than one ipv4 address"));
    }

    #[test]
    fn test_ipv6_inferred_from_ipv4_device() {
        let probe = FakeProbe::default()
            .route(AddressFamily::Ipv4, "eth0")
            .iface(eth0());
        let facts = collect(&probe).unwrap();
        assert_eq!(facts.default_ipv4.as_deref(), Some("10.0.0.5"));
        assert_eq!(facts.default_ipv6.as_deref(), Some("fd00::5"));
    }

    #[test]
    fn test_ipv4_inferred_from_ipv6_device() {
        let probe = FakeProbe::default()
            .route(AddressFamily::Ipv6, "eth0")
            .iface(eth0());
        let facts = collect(&probe).unwrap();
        assert_eq!(facts.default_ipv4.as_deref(), Some("10.0.0.5"));
        assert_eq!(facts.default_ipv6.as_deref(), Some("fd00::5"));
    }

    #[test]
    fn test_no_inference_when_other_family_has_route() {
        let eth1 = InterfaceFact::new("eth1")
            .with_mac("00:50:56:00:00:02")
            .with_address(AddressFamily::Ipv6, v6("fd01::1"))
            .with_address(AddressFamily::Ipv6, v6("fd01::2"));
        let probe = FakeProbe::default()
            .route(AddressFamily::Ipv4, "eth0")
            .route(AddressFamily::Ipv6, "eth1")
            .iface(eth0())
            .iface(eth1);
        let facts = collect(&probe).unwrap();
        assert_eq!(facts.default_ipv4.as_deref(), Some("10.0.0.5"));
        // eth1 is ambiguous and eth0 is not consulted for IPv6
        assert_eq!(facts.default_ipv6, None);
    }

    #[test]
    #[traced_test]
    fn test_ambiguous_inference_is_undetermined() {
        let iface = InterfaceFact::new("eth0")
            .with_mac("00:50:56:00:00:01")
            .with_address(AddressFamily::Ipv4, v4("10.0.0.5"))
            .with_address(AddressFamily::Ipv6, v6("fd00::1"))
            .with_address(AddressFamily::Ipv6, v6("fe80::1"));
        let probe = FakeProbe::default()
            .route(AddressFamily::Ipv4, "eth0")
            .iface(iface);
        let facts = collect(&probe).unwrap();
        assert_eq!(facts.default_ipv4.as_deref(), Some("10.0.0.5"));
        assert_eq!(facts.default_ipv6, None);
        assert!(logs_contain("device has more than one ipv6 address"));
    }

    #[test]
    fn test_route_to_unknown_device() {
        let probe = FakeProbe::default()
            .route(AddressFamily::Ipv4, "wg0")
            .iface(eth0());
        let facts = collect(&probe).unwrap();
        assert_eq!(facts.default_ipv4, None);
    }

    #[test]
    fn test_loopback_never_indexed() {
        let mut lo_with_mac = loopback();
        lo_with_mac.name = "lo1".to_string();
        lo_with_mac.mac = Some("02:00:00:00:00:01".to_string());
        let probe = FakeProbe::default()
            .iface(loopback())
            .iface(lo_with_mac)
            .iface(eth0());
        let facts = collect(&probe).unwrap();

        assert!(!facts.by_mac.contains_key(NULL_MAC));
        // lo1 only carries loopback addresses
        assert!(!facts.by_mac.contains_key("02:00:00:00:00:01"));
        assert!(!facts.by_ipv4.contains_key(LOOPBACK_IPV4));
        assert!(!facts.by_ipv6.contains_key(LOOPBACK_IPV6));
        assert!(facts.by_ipv4.contains_key("10.0.0.5"));
    }

    #[test]
    fn test_index_entries() {
        let probe = FakeProbe::default().iface(eth0());
        let facts = collect(&probe).unwrap();

        assert_eq!(
            facts.by_ipv4["10.0.0.5"],
            json!({
                "netmask": "255.255.255.0",
                "broadcast": "10.0.0.255",
                "prefixlen": 24,
                "mac": "00:50:56:aa:bb:cc",
            })
        );
        let by_mac = &facts.by_mac["00:50:56:aa:bb:cc"];
        assert_eq!(by_mac["ipv4"][0]["addr"], json!("10.0.0.5"));
        assert_eq!(by_mac["ipv6"][0]["addr"], json!("fd00::5"));
    }

    #[test]
    fn test_macless_interface_indexed_by_address_only() {
        let tun = InterfaceFact::new("tun0").with_address(AddressFamily::Ipv4, v4("10.8.0.2"));
        let probe = FakeProbe::default().iface(tun);
        let facts = collect(&probe).unwrap();
        assert!(facts.by_mac.is_empty());
        assert!(facts.by_ipv4["10.8.0.2"].get("mac").is_none());
    }

    #[test]
    fn test_addressless_interface_not_in_by_mac() {
        let probe = FakeProbe::default().iface(InterfaceFact::new("eth9").with_mac("00:50:56:00:00:09"));
        let facts = collect(&probe).unwrap();
        assert!(facts.by_mac.is_empty());
    }

    #[test]
    fn test_by_mac_only_lists_present_families() {
        let probe = FakeProbe::default().iface(
            InterfaceFact::new("eth0")
                .with_mac("00:50:56:00:00:01")
                .with_address(AddressFamily::Ipv4, v4("10.0.0.5")),
        );
        let facts = collect(&probe).unwrap();
        let entry = facts.by_mac["00:50:56:00:00:01"].as_object().unwrap();
        assert!(entry.contains_key("ipv4"));
        assert!(!entry.contains_key("ipv6"));
    }

    #[test]
    fn test_enumeration_failure_is_fatal() {
        let probe = FakeProbe {
            fail: true,
            ..Default::default()
        };
        assert!(matches!(collect(&probe), Err(Error::InterfaceEnumeration { .. })));
    }

    #[test]
    fn test_empty_hostname_omitted() {
        let probe = FakeProbe {
            fqdn: Some(String::new()),
            ..Default::default()
        };
        let doc = collect(&probe).unwrap().to_document();
        assert!(doc.get("hostname").is_none());
        assert!(doc.get("local-hostname").is_none());
    }

    #[test]
    fn test_to_document_shape() {
        let probe = FakeProbe {
            fqdn: Some("web-01.example.com".to_string()),
            ..Default::default()
        }
        .route(AddressFamily::Ipv4, "eth0")
        .iface(eth0());
        let doc = collect(&probe).unwrap().to_document();

        assert_eq!(doc.hostname(), Some("web-01.example.com"));
        assert_eq!(doc.local_hostname(), Some("web-01.example.com"));
        assert_eq!(doc.get("local-ipv4"), Some(&json!("10.0.0.5")));
        assert_eq!(doc.get("local-ipv6"), Some(&json!("fd00::5")));
        let interfaces = &doc.get("network").unwrap()["interfaces"];
        for key in ["by-mac", "by-ipv4", "by-ipv6"] {
            assert!(interfaces[key].is_object(), "{key}");
        }
    }
}
