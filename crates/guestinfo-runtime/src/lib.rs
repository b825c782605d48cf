// guestinfo-runtime: host-facing adapters for guestinfo-core
// Runs vmtoolsd and ip, reads DMI and hostname, loads agent config.

pub mod config;
pub mod datasource;
pub mod hostname;
pub mod iproute;
pub mod shell;
#[cfg(test)]
pub mod shell_mock;
pub mod tools;
pub mod vmtoolsd;

pub use config::AgentConfig;
pub use datasource::{GuestData, GuestInfoDataSource};
pub use iproute::IpRouteProbe;
pub use tools::HostTools;
pub use vmtoolsd::VmtoolsdSource;
