//! VMD Topology Resolver
//!
//! A VMD bridge creates a new PCI domain. The kernel publishes it as
//! `<bridge>/domain/device`, but that link appears asynchronously after the
//! `pciDDDDD:BB` bus directory, so a freshly probed bridge may only have the
//! directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::VMD_DRIVER;
use crate::error::{Error, Result};
use crate::sysfs;

/// Link under a VMD bridge pointing at its bus.
pub const DOMAIN_DEVICE_LINK: &str = "domain/device";

/// Whether `name` has the fixed-width shape of a bus directory, `pciXXXXX:XX`.
fn is_bus_dir_name(name: &str) -> bool {
    name.len() == 11 && name.starts_with("pci") && name.as_bytes()[8] == b':'
}

/// Resolve the PCI bus synthesized by the VMD bridge at `bridge_path`.
///
/// When several bus directories exist the lexicographically smallest wins,
/// independent of directory iteration order.
pub fn resolve_bus(bridge_path: &Path) -> Result<PathBuf> {
    if let Ok(bus) = fs::canonicalize(bridge_path.join(DOMAIN_DEVICE_LINK)) {
        return Ok(bus);
    }

    let entries = fs::read_dir(bridge_path).map_err(|_| Error::BusResolution {
        path: bridge_path.to_path_buf(),
    })?;

    let mut candidates: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| is_bus_dir_name(name))
        .collect();
    candidates.sort();

    let name = candidates.into_iter().next().ok_or_else(|| Error::BusResolution {
        path: bridge_path.to_path_buf(),
    })?;

    debug!(
        bridge = %bridge_path.display(),
        bus = %name,
        "domain link missing, using bus directory"
    );
    let bus = bridge_path.join(name);
    Ok(fs::canonicalize(&bus).unwrap_or(bus))
}

/// Find the VMD bridge device whose synthesized bus contains `bus_path`.
pub fn bus_to_controller(sysfs_root: &Path, bus_path: &Path) -> Option<PathBuf> {
    let dir = sysfs::driver_dir(sysfs_root, "pci", VMD_DRIVER);
    let mut names: Vec<_> = fs::read_dir(&dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name())
        .collect();
    names.sort();

    names.into_iter().find_map(|name| {
        let bridge = fs::canonicalize(dir.join(&name)).ok()?;
        let bus = resolve_bus(&bridge).ok()?;
        bus_path.starts_with(&bus).then_some(bridge)
    })
}
