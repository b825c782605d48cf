//! Lifecycle facade for the provisioning framework.
//!
//! The framework calls [`GuestInfoDataSource::get_data`] early in boot,
//! [`GuestInfoDataSource::setup`] once interfaces are up, and then reads
//! the network config and instance id from the merged document.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use guestinfo_core::document::KEY_INSTANCE_ID;
use guestinfo_core::resolver::{self, USERDATA_KEY, VENDORDATA_KEY};
use guestinfo_core::{GuestInfoSource, MetadataDocument, NetworkProbe, facts, merge};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::AgentConfig;
use crate::iproute::IpRouteProbe;
use crate::tools::HostTools;
use crate::vmtoolsd::VmtoolsdSource;

/// Everything fetched from guestinfo in one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuestData {
    pub metadata: MetadataDocument,
    pub userdata: Option<String>,
    pub vendordata: Option<String>,
}

/// Binds a guestinfo transport and a network probe together.
pub struct GuestInfoDataSource {
    source: Option<Box<dyn GuestInfoSource>>,
    probe: Box<dyn NetworkProbe>,
    product_uuid_path: PathBuf,
}

impl GuestInfoDataSource {
    pub fn new(
        source: Option<Box<dyn GuestInfoSource>>,
        probe: Box<dyn NetworkProbe>,
        product_uuid_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            probe,
            product_uuid_path: product_uuid_path.into(),
        }
    }

    /// Build the production datasource from discovered tools and config.
    pub fn from_host(tools: &HostTools, config: &AgentConfig) -> Self {
        let source: Option<Box<dyn GuestInfoSource>> = match tools.require_vmtoolsd() {
            Ok(path) => Some(Box::new(VmtoolsdSource::new(path))),
            Err(e) => {
                debug!(error = %e, "guestinfo transport unavailable");
                None
            }
        };
        Self::new(
            source,
            Box::new(IpRouteProbe::new(tools.ip.clone())),
            config.identity.product_uuid_path.clone(),
        )
    }

    fn source(&self) -> Result<&dyn GuestInfoSource> {
        self.source
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("vmtoolsd is required to fetch guestinfo values"))
    }

    /// Resolve metadata only.
    pub fn metadata(&self) -> Result<MetadataDocument> {
        resolver::resolve(self.source()?).with_context(|| "Failed to load guestinfo metadata")
    }

    /// Fetch metadata, user-data and vendor-data.
    pub fn get_data(&self) -> Result<GuestData> {
        let source = self.source()?;
        let metadata = self.metadata()?;
        let userdata = resolver::fetch_decoded(source, USERDATA_KEY)
            .with_context(|| "Failed to load guestinfo userdata")?;
        let vendordata = resolver::fetch_decoded(source, VENDORDATA_KEY)
            .with_context(|| "Failed to load guestinfo vendordata")?;
        Ok(GuestData {
            metadata,
            userdata,
            vendordata,
        })
    }

    /// Collect host facts only.
    pub fn host_info(&self) -> Result<MetadataDocument> {
        let facts = facts::collect(self.probe.as_ref()).with_context(|| "Failed to collect host info")?;
        Ok(facts.to_document())
    }

    /// Merge host facts into the fetched metadata. Operator values win.
    pub fn setup(&self, data: &mut GuestData) -> Result<()> {
        let host_info = self.host_info()?;
        info!(?host_info, "got host-info");
        let metadata = std::mem::take(&mut data.metadata);
        data.metadata = merge::merge(host_info, metadata);
        Ok(())
    }

    /// `get_data` followed by `setup`.
    pub fn resolve(&self) -> Result<GuestData> {
        let mut data = self.get_data()?;
        self.setup(&mut data)?;
        Ok(data)
    }

    /// Network config from metadata; `None` tells the framework to use
    /// its fallback config.
    pub fn network_config<'a>(&self, data: &'a GuestData) -> Option<&'a Value> {
        match data.metadata.network_config() {
            Some(config) => {
                debug!("using metadata network config");
                Some(config)
            }
            None => {
                debug!("using fallback network config");
                None
            }
        }
    }

    /// Instance id from metadata, or the DMI product UUID, which is then
    /// recorded in the metadata.
    pub fn instance_id(&self, data: &mut GuestData) -> Result<String> {
        match data.metadata.get(KEY_INSTANCE_ID) {
            Some(Value::String(id)) => return Ok(id.clone()),
            Some(Value::Null) | None => {}
            Some(other) => return Ok(other.to_string()),
        }

        let id = read_product_uuid(&self.product_uuid_path)?;
        data.metadata
            .insert(KEY_INSTANCE_ID, Value::String(id.clone()));
        Ok(id)
    }
}

fn read_product_uuid(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read instance id from {}", path.display()))?;
    let id = content.trim_end().to_string();
    if id.is_empty() {
        anyhow::bail!("Instance id file {} is empty", path.display());
    }
    Ok(id)
}
