use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::debug;

use crate::logging::{self, LogFormat};

use guestinfo_core::codec::{self, Encoding};
use guestinfo_runtime::{AgentConfig, GuestInfoDataSource, HostTools};

#[derive(Parser)]
#[command(
    name = "guestinfo",
    version,
    about = "Instance metadata from VMware guestinfo"
)]
struct Cli {
    /// Agent config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Human)]
    log_format: LogFormat,

    /// Path to vmtoolsd (overrides config and PATH lookup)
    #[arg(long, global = true)]
    vmtoolsd: Option<PathBuf>,

    /// Path to ip (overrides config and PATH lookup)
    #[arg(long, global = true)]
    ip: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ---- guestinfo ----
    /// Resolve and print the operator metadata document
    Metadata,
    /// Print decoded user-data (empty if unset)
    Userdata,
    /// Print decoded vendor-data (empty if unset)
    Vendordata,
    /// Print the instance id, falling back to the DMI product UUID
    InstanceId,

    // ---- Host ----
    /// Collect and print network facts about this guest
    HostInfo,
    /// Fetch metadata, merge host facts, and print the result
    Resolve,
    /// Print the network config from metadata, or null
    NetworkConfig,

    // ---- Codec ----
    /// Decode stdin to stdout
    Decode {
        /// Encoding tag: base64 (b64), gzip+base64 (gz+b64); anything else is plain
        #[arg(long, short = 'e')]
        encoding: String,
    },
    /// Encode stdin to stdout
    Encode {
        /// Encoding tag: base64 (b64), gzip+base64 (gz+b64); anything else is plain
        #[arg(long, short = 'e')]
        encoding: String,
    },
}

// ============================================================================
// Command dispatch
// ============================================================================

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    match &cli.command {
        Commands::Decode { encoding } => cmd_decode(encoding),
        Commands::Encode { encoding } => cmd_encode(encoding),
        Commands::Metadata => cmd_metadata(&datasource(&cli)?),
        Commands::Userdata => cmd_userdata(&datasource(&cli)?),
        Commands::Vendordata => cmd_vendordata(&datasource(&cli)?),
        Commands::InstanceId => cmd_instance_id(&datasource(&cli)?),
        Commands::HostInfo => cmd_host_info(&datasource(&cli)?),
        Commands::Resolve => cmd_resolve(&datasource(&cli)?),
        Commands::NetworkConfig => cmd_network_config(&datasource(&cli)?),
    }
}

/// Load config, apply flag overrides, and discover host tools.
fn datasource(cli: &Cli) -> Result<GuestInfoDataSource> {
    let mut config = AgentConfig::load(cli.config.as_deref())?;
    if let Some(ref path) = cli.vmtoolsd {
        config.tools.vmtoolsd = Some(path.clone());
    }
    if let Some(ref path) = cli.ip {
        config.tools.ip = Some(path.clone());
    }
    debug!(?config, "loaded agent config");

    let tools = HostTools::discover(&config.tools);
    Ok(GuestInfoDataSource::from_host(&tools, &config))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

fn cmd_metadata(ds: &GuestInfoDataSource) -> Result<()> {
    print_json(&ds.metadata()?)
}

fn cmd_userdata(ds: &GuestInfoDataSource) -> Result<()> {
    let data = ds.get_data()?;
    print!("{}", data.userdata.unwrap_or_default());
    Ok(())
}

fn cmd_vendordata(ds: &GuestInfoDataSource) -> Result<()> {
    let data = ds.get_data()?;
    print!("{}", data.vendordata.unwrap_or_default());
    Ok(())
}

fn cmd_instance_id(ds: &GuestInfoDataSource) -> Result<()> {
    let mut data = ds.get_data()?;
    println!("{}", ds.instance_id(&mut data)?);
    Ok(())
}

fn cmd_host_info(ds: &GuestInfoDataSource) -> Result<()> {
    print_json(&ds.host_info()?)
}

fn cmd_resolve(ds: &GuestInfoDataSource) -> Result<()> {
    let data = ds.resolve()?;
    print_json(&data.metadata)
}

fn cmd_network_config(ds: &GuestInfoDataSource) -> Result<()> {
    let data = ds.resolve()?;
    print_json(&ds.network_config(&data).unwrap_or(&Value::Null))
}

fn read_stdin() -> Result<String> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read stdin")?;
    Ok(input)
}

fn cmd_decode(encoding: &str) -> Result<()> {
    let input = read_stdin()?;
    let text = codec::decode("stdin", Some(encoding), &input)?;
    print!("{}", text);
    Ok(())
}

fn cmd_encode(encoding: &str) -> Result<()> {
    let input = read_stdin()?;
    let encoded = codec::encode(Some(encoding), &input)?;
    match Encoding::from_tag(Some(encoding)) {
        Encoding::Plain => print!("{}", encoded),
        _ => println!("{}", encoded),
    }
    Ok(())
}
