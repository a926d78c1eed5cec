//! IMSM Platform Capability Reporter
//!
//! Prints the RAID capabilities the platform firmware advertises for every
//! supported storage controller.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         imsm-platform                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  Enumerator  │───▶│   Platform   │───▶│    Report    │       │
//! │  │   (sysfs)    │    │ (resolution) │    │ text/json/.. │       │
//! │  └──────────────┘    └──────┬───────┘    └──────────────┘       │
//! │                             │                                    │
//! │                   EFI │ ACPI │ VMD reg │ option ROM              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use imsm_platform::adapters::LoggingEventPublisher;
use imsm_platform::capability::{is_disk_count_valid, is_level_supported, level_name};
use imsm_platform::platform::{Platform, PlatformConfig, TestMode};
use imsm_platform::sysfs::parse_hex;

// =============================================================================
// CLI Arguments
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Yaml,
}

/// Report IMSM RAID capabilities of the platform's storage controllers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root of the sysfs tree
    #[arg(long, env = "IMSM_SYSFS_ROOT", default_value = "/sys")]
    sysfs_root: PathBuf,

    /// Physical memory device used for the option ROM scan
    #[arg(long, env = "IMSM_DEV_MEM", default_value = "/dev/mem")]
    dev_mem: PathBuf,

    /// Seconds an enumerated controller list stays valid
    #[arg(long, env = "IMSM_CACHE_TTL_SECS", default_value = "10")]
    cache_ttl_secs: u64,

    /// PCI vendor id to consider (hex)
    #[arg(long, env = "IMSM_VENDOR_ID", default_value = "0x8086", value_parser = parse_pci_id)]
    vendor_id: u16,

    /// Only report controllers with this PCI device id (hex)
    #[arg(long, value_parser = parse_pci_id)]
    device_id: Option<u16>,

    /// Check whether a RAID level is supported by each controller
    #[arg(long)]
    raid_level: Option<u32>,

    /// Disk count to validate together with --raid-level
    #[arg(long, requires = "raid_level")]
    disks: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

fn parse_pci_id(value: &str) -> Result<u16, String> {
    parse_hex(value)
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| format!("{:?} is not a 16-bit hex id", value))
}

// =============================================================================
// Main
// =============================================================================

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let config = PlatformConfig {
        sysfs_root: args.sysfs_root.clone(),
        dev_mem: args.dev_mem.clone(),
        vendor_id: args.vendor_id,
        cache_ttl: Duration::from_secs(args.cache_ttl_secs),
        ..PlatformConfig::from_env()
    };
    info!(
        sysfs_root = %config.sysfs_root.display(),
        vendor_id = format_args!("{:#06x}", config.vendor_id),
        rom_align = config.rom_align(),
        "Starting capability discovery"
    );

    let platform = Platform::with_test_mode(config, TestMode::from_env())
        .context("invalid platform configuration")?
        .with_event_publisher(Arc::new(LoggingEventPublisher::info_level()));

    let mut report = platform.report();
    if let Some(dev_id) = args.device_id {
        report = report.filter_device(dev_id);
    }

    if let Some(level) = args.raid_level {
        let Some(name) = level_name(level) else {
            bail!("unknown RAID level {}", level);
        };
        for entry in &report.controllers {
            let supported = entry
                .capability
                .as_ref()
                .map(|cap| is_level_supported(cap, level))
                .unwrap_or(false);
            let disks_ok = args.disks.map(|n| is_disk_count_valid(level, n)).unwrap_or(true);
            println!(
                "{} {}: {} {}",
                entry.controller.kind,
                entry.controller.pci_id,
                name,
                if supported && disks_ok { "ok" } else { "unsupported" }
            );
        }
        return Ok(());
    }

    match args.output {
        OutputFormat::Text => print!("{}", report),
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Yaml => print!("{}", report.to_yaml()?),
    }
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Logs go to stderr so JSON and YAML reports stay parseable.
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pci_id() {
        assert_eq!(parse_pci_id("0x8086"), Ok(0x8086));
        assert_eq!(parse_pci_id("2822"), Ok(0x2822));
        assert!(parse_pci_id("0x18086").is_err());
        assert!(parse_pci_id("intel").is_err());
    }
}
