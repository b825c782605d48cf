use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Config file read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/guestinfo/guestinfo.toml";
/// Source of the instance id when metadata does not carry one.
pub const PRODUCT_UUID_PATH: &str = "/sys/class/dmi/id/product_uuid";

/// Agent configuration loaded from TOML. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

/// Explicit locations for helper binaries. Unset entries are looked up
/// on `PATH`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsConfig {
    pub vmtoolsd: Option<PathBuf>,
    pub ip: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_product_uuid_path")]
    pub product_uuid_path: PathBuf,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            product_uuid_path: default_product_uuid_path(),
        }
    }
}

fn default_product_uuid_path() -> PathBuf {
    PathBuf::from(PRODUCT_UUID_PATH)
}

impl AgentConfig {
    /// Load config from `path`, or from [`DEFAULT_CONFIG_PATH`] when it
    /// exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    debug!("no config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read guestinfo config: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid guestinfo config: {}", path.display()))
    }

    /// Parse config from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).with_context(|| "Failed to parse guestinfo config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, path) in [("vmtoolsd", &self.tools.vmtoolsd), ("ip", &self.tools.ip)] {
            if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                anyhow::bail!("[tools] {} must not be an empty path", name);
            }
        }
        if self.identity.product_uuid_path.as_os_str().is_empty() {
            anyhow::bail!("[identity] product_uuid_path must not be empty");
        }
        Ok(())
    }
}
