//! Hardware Discovery Components
//!
//! Provides the controller record and the sysfs walkers that produce it.

pub mod enumerator;
pub mod vmd;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::sysfs::PCI_CLASS_RAID_CONTROLLER;

/// PCI vendor id of Intel Corporation.
pub const INTEL_VENDOR_ID: u16 = 0x8086;

/// Kernel driver names that bind the controllers we care about.
pub const AHCI_DRIVER: &str = "ahci";
pub const ISCI_DRIVER: &str = "isci";
pub const NVME_DRIVER: &str = "nvme";
pub const VMD_DRIVER: &str = "vmd";

// =============================================================================
// Controller Kind
// =============================================================================

/// Bus role of a storage controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerKind {
    /// SAS controller (isci)
    Sas,
    /// AHCI SATA controller
    Sata,
    /// AHCI SATA controller behind a VMD bridge
    SataVmd,
    /// NVMe controller
    Nvme,
    /// VMD root-complex bridge
    Vmd,
    /// Bound by some other driver
    Unknown,
}

impl ControllerKind {
    /// Role implied by the driver bound to a device.
    pub fn from_driver(driver: &str) -> Self {
        match driver {
            ISCI_DRIVER => ControllerKind::Sas,
            AHCI_DRIVER => ControllerKind::Sata,
            NVME_DRIVER => ControllerKind::Nvme,
            VMD_DRIVER => ControllerKind::Vmd,
            _ => ControllerKind::Unknown,
        }
    }

    /// Whether capability comes from the VMD firmware variables.
    pub fn is_vmd_family(&self) -> bool {
        matches!(self, ControllerKind::Vmd | ControllerKind::SataVmd)
    }
}

impl std::fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerKind::Sas => write!(f, "SAS"),
            ControllerKind::Sata => write!(f, "SATA"),
            ControllerKind::SataVmd => write!(f, "SATA VMD"),
            ControllerKind::Nvme => write!(f, "NVMe"),
            ControllerKind::Vmd => write!(f, "VMD"),
            ControllerKind::Unknown => write!(f, "unknown"),
        }
    }
}

// =============================================================================
// Controller
// =============================================================================

/// A storage controller found in sysfs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller {
    /// Bus role
    pub kind: ControllerKind,
    /// PCI device id
    pub dev_id: u16,
    /// 24-bit PCI class code
    pub class: u32,
    /// Canonical sysfs path; for a VMD bridge, the bus it synthesized
    pub path: PathBuf,
    /// Last path segment, e.g. `0000:00:17.0`
    pub pci_id: String,
}

impl Controller {
    /// Create a controller record, deriving the short id from `path`.
    pub fn new(kind: ControllerKind, dev_id: u16, class: u32, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let pci_id = crate::sysfs::last_segment(&path);
        Self {
            kind,
            dev_id,
            class,
            path,
            pci_id,
        }
    }

    /// Whether the controller reports the RAID bus controller class.
    pub fn is_raid_class(&self) -> bool {
        self.class == PCI_CLASS_RAID_CONTROLLER
    }

    /// Whether a sysfs node lives underneath this controller.
    pub fn contains_path(&self, path: &Path) -> bool {
        path.starts_with(&self.path)
    }
}
