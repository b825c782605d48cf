use std::path::PathBuf;

use guestinfo_core::GuestInfoSource;
use tracing::{debug, error};

use crate::shell;

/// What vmtoolsd prints on stderr for a key that was never set.
pub const NO_VALUE: &str = "No value found";

/// Reads `guestinfo.*` keys by running `vmtoolsd --cmd "info-get ..."`.
#[derive(Debug, Clone)]
pub struct VmtoolsdSource {
    vmtoolsd: PathBuf,
}

impl VmtoolsdSource {
    pub fn new(vmtoolsd: impl Into<PathBuf>) -> Self {
        Self {
            vmtoolsd: vmtoolsd.into(),
        }
    }
}

impl GuestInfoSource for VmtoolsdSource {
    fn get(&self, key: &str) -> Option<String> {
        debug!(key, "getting guestinfo value");
        let cmd = format!("info-get guestinfo.{}", key);

        let output = match shell::run_host(&self.vmtoolsd, &["--cmd", &cmd]) {
            Ok(output) => output,
            Err(e) => {
                error!(key, error = %e, "Unexpected error while getting guestinfo value");
                return None;
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.trim() == NO_VALUE {
            debug!(key, "no value found");
            return None;
        }
        if !output.status.success() {
            error!(
                key,
                exit = output.status.code().unwrap_or(-1),
                stderr = %stderr.trim(),
                "Failed to get guestinfo value"
            );
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let value = stdout.trim_end();
        if value.is_empty() {
            error!(key, "Failed to get guestinfo value: empty output");
            return None;
        }
        Some(value.to_string())
    }
}
