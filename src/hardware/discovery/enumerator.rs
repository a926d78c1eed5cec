//! Device Enumerator
//!
//! Walks `/sys/bus/<bus>/drivers/<driver>` and builds controller records.
//! SATA and NVMe walks first resolve the VMD buses so that controllers
//! hidden behind a bridge are tagged (SATA) or left to the bridge (NVMe).

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use super::vmd::resolve_bus;
use super::{Controller, ControllerKind, AHCI_DRIVER, ISCI_DRIVER, NVME_DRIVER, VMD_DRIVER};
use crate::sysfs;

const PCI_BUS: &str = "pci";

/// Builds controller lists from a sysfs tree.
#[derive(Debug, Clone)]
pub struct Enumerator {
    sysfs_root: PathBuf,
    vendor_id: u16,
}

impl Enumerator {
    /// Enumerate devices of `vendor_id` under `sysfs_root`.
    pub fn new(sysfs_root: impl Into<PathBuf>, vendor_id: u16) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            vendor_id,
        }
    }

    pub fn sysfs_root(&self) -> &Path {
        &self.sysfs_root
    }

    /// Every supported controller: SATA (including SATA behind VMD), then
    /// SAS, then NVMe, then the VMD bridges themselves.
    #[instrument(skip(self), fields(root = %self.sysfs_root.display()))]
    pub fn find_all(&self) -> Vec<Controller> {
        let mut controllers = self.enumerate(PCI_BUS, AHCI_DRIVER);
        controllers.extend(self.enumerate(PCI_BUS, ISCI_DRIVER));
        controllers.extend(self.enumerate(PCI_BUS, NVME_DRIVER));
        controllers.extend(self.enumerate(PCI_BUS, VMD_DRIVER));
        debug!(count = controllers.len(), "Controller enumeration complete");
        controllers
    }

    /// Controllers bound to `driver` on `bus`.
    ///
    /// A missing driver directory yields an empty list.
    pub fn enumerate(&self, bus: &str, driver: &str) -> Vec<Controller> {
        let kind = ControllerKind::from_driver(driver);

        let vmd_buses: Vec<PathBuf> = match kind {
            ControllerKind::Sata | ControllerKind::Nvme => self
                .enumerate(PCI_BUS, VMD_DRIVER)
                .into_iter()
                .map(|vmd| vmd.path)
                .collect(),
            _ => Vec::new(),
        };

        let dir = sysfs::driver_dir(&self.sysfs_root, bus, driver);
        let mut names: Vec<_> = match fs::read_dir(&dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.file_name())
                .collect(),
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "Driver directory not readable");
                return Vec::new();
            }
        };
        names.sort();

        names
            .iter()
            .filter_map(|name| self.probe_device(bus, kind, &dir.join(name), &vmd_buses))
            .collect()
    }

    fn probe_device(
        &self,
        bus: &str,
        kind: ControllerKind,
        path: &Path,
        vmd_buses: &[PathBuf],
    ) -> Option<Controller> {
        if !sysfs::subsystem_matches(path, bus) {
            return None;
        }

        let real_path = match sysfs::canonicalize(path) {
            Ok(p) => p,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unable to get real path");
                return None;
            }
        };

        let behind_vmd = vmd_buses.iter().any(|bus| real_path.starts_with(bus));
        let kind = match kind {
            ControllerKind::Nvme if behind_vmd => {
                debug!(path = %real_path.display(), "Skipping NVMe device behind VMD");
                return None;
            }
            ControllerKind::Sata if behind_vmd => ControllerKind::SataVmd,
            other => other,
        };

        match sysfs::vendor_id(path) {
            Ok(vendor) if vendor == self.vendor_id => {}
            _ => return None,
        }
        let dev_id = sysfs::device_id(path).ok()?;
        let class = sysfs::class_code(path).ok()?;

        let path = if kind == ControllerKind::Vmd {
            match resolve_bus(&real_path) {
                Ok(bus) => bus,
                Err(e) => {
                    warn!(bridge = %real_path.display(), error = %e, "Skipping VMD bridge");
                    return None;
                }
            }
        } else {
            real_path
        };

        Some(Controller::new(kind, dev_id, class, path))
    }
}
