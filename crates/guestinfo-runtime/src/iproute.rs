//! Host network state via iproute2's JSON output.
//!
//! `ip -j addr show` lists every interface with its link address and
//! `addr_info` entries; `ip -j -4|-6 route show default` names the device
//! carrying each family's default route.

use std::path::PathBuf;

use guestinfo_core::error::{Error, Result};
use guestinfo_core::{AddressFamily, AddressRecord, InterfaceFact, NetworkProbe};
use serde::Deserialize;
use tracing::debug;

use crate::hostname;
use crate::shell;

/// [`NetworkProbe`] backed by the `ip` binary.
#[derive(Debug, Clone)]
pub struct IpRouteProbe {
    ip: Option<PathBuf>,
}

impl IpRouteProbe {
    /// `ip` is `None` when the guest has no iproute2; every query then
    /// degrades (interfaces fail, routes are absent).
    pub fn new(ip: Option<PathBuf>) -> Self {
        Self { ip }
    }
}

impl NetworkProbe for IpRouteProbe {
    fn fqdn(&self) -> Option<String> {
        hostname::fqdn()
    }

    fn default_route_device(&self, family: AddressFamily) -> Option<String> {
        let ip = self.ip.as_deref()?;
        let flag = match family {
            AddressFamily::Ipv4 => "-4",
            AddressFamily::Ipv6 => "-6",
        };
        match shell::run_host_stdout(ip, &["-j", flag, "route", "show", "default"]) {
            Ok(stdout) => parse_default_route(&stdout),
            Err(e) => {
                debug!(%family, error = %e, "no default route");
                None
            }
        }
    }

    fn interfaces(&self) -> Result<Vec<InterfaceFact>> {
        let ip = self.ip.as_deref().ok_or_else(|| Error::InterfaceEnumeration {
            reason: "ip command not found".to_string(),
        })?;
        let stdout = shell::run_host_stdout(ip, &["-j", "addr", "show"]).map_err(|e| {
            Error::InterfaceEnumeration {
                reason: format!("{:#}", e),
            }
        })?;
        parse_addr_show(&stdout)
    }
}

#[derive(Debug, Deserialize)]
struct RouteEntry {
    #[serde(default)]
    dev: Option<String>,
}

/// Device of the first default route in `ip -j route show default`
/// output. Empty output means no default route.
pub fn parse_default_route(json: &[u8]) -> Option<String> {
    if json.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<Vec<RouteEntry>>(json) {
        Ok(routes) => routes.into_iter().find_map(|r| r.dev),
        Err(e) => {
            debug!(error = %e, "unreadable route output");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(default)]
    ifname: Option<String>,
    #[serde(default)]
    link_type: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    addr_info: Vec<AddrInfo>,
}

#[derive(Debug, Deserialize)]
struct AddrInfo {
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    local: Option<String>,
    #[serde(default)]
    prefixlen: Option<u8>,
    #[serde(default)]
    broadcast: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Convert `ip -j addr show` output into interface facts.
pub fn parse_addr_show(json: &[u8]) -> Result<Vec<InterfaceFact>> {
    let links: Vec<Link> =
        serde_json::from_slice(json).map_err(|e| Error::InterfaceEnumeration {
            reason: format!("unreadable ip addr output: {}", e),
        })?;

    // entries without a name belong to other namespaces
    Ok(links
        .into_iter()
        .filter_map(|link| {
            let name = link.ifname?;
            let mut iface = InterfaceFact::new(name);
            iface.mac = link
                .address
                .filter(|addr| link.link_type.as_deref() != Some("none") && is_mac(addr))
                .map(|addr| addr.to_ascii_lowercase());

            for info in link.addr_info {
                let (Some(family), Some(local)) = (info.family.as_deref(), info.local) else {
                    continue;
                };
                let family = match family {
                    "inet" => AddressFamily::Ipv4,
                    "inet6" => AddressFamily::Ipv6,
                    _ => continue,
                };
                let mut record = AddressRecord::new(family, local, info.prefixlen);
                record.broadcast = info.broadcast;
                record.scope = info.scope;
                iface = iface.with_address(family, record);
            }
            Some(iface)
        })
        .collect())
}

/// Colon-separated hex octets, at least six of them.
fn is_mac(addr: &str) -> bool {
    let octets: Vec<&str> = addr.split(':').collect();
    octets.len() >= 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}
