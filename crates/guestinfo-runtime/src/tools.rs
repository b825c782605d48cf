use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, error, warn};

use crate::config::ToolsConfig;

/// Helper binaries available on this guest, resolved once at start-up and
/// passed to whatever needs them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostTools {
    pub vmtoolsd: Option<PathBuf>,
    pub ip: Option<PathBuf>,
}

impl HostTools {
    /// Locate `vmtoolsd` and `ip`, honoring explicit paths from config.
    pub fn discover(config: &ToolsConfig) -> Self {
        let tools = Self {
            vmtoolsd: locate("vmtoolsd", config.vmtoolsd.as_deref()),
            ip: locate("ip", config.ip.as_deref()),
        };
        if tools.vmtoolsd.is_none() {
            error!("Failed to find vmtoolsd");
        }
        if tools.ip.is_none() {
            warn!("Failed to find ip, host network facts are unavailable");
        }
        debug!(vmtoolsd = ?tools.vmtoolsd, ip = ?tools.ip, "discovered host tools");
        tools
    }

    /// Path to `vmtoolsd`, or an error if the guest has none.
    pub fn require_vmtoolsd(&self) -> Result<&Path> {
        self.vmtoolsd
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("vmtoolsd is required to fetch guestinfo values"))
    }
}

fn locate(name: &str, explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => match which::which(path) {
            Ok(found) => Some(found),
            Err(e) => {
                warn!(tool = name, path = %path.display(), error = %e, "configured tool is not executable");
                None
            }
        },
        None => which::which(name).ok(),
    }
}
