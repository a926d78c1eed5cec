//! Sysfs Firmware Adapter
//!
//! Implements the `FirmwareSource` port against a live (or fake) sysfs tree
//! and `/dev/mem`.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::capability::Capability;
use crate::domain::ports::FirmwareSource;
use crate::firmware::{
    orom, vmd_register, AcpiTables, DevMemRoms, EfiVariables, OromMatch, VmdRegister, VENDOR_GUID,
};
use crate::hardware::{bus_to_controller, Controller};
use crate::platform::PlatformConfig;
use crate::sysfs;

/// Production firmware source.
#[derive(Debug, Clone)]
pub struct SysfsFirmware {
    sysfs_root: PathBuf,
    efi: EfiVariables,
    acpi: AcpiTables,
    roms: DevMemRoms,
    vendor_id: u16,
    rom_align: usize,
}

impl SysfsFirmware {
    pub fn new(config: &PlatformConfig) -> Self {
        Self {
            sysfs_root: config.sysfs_root.clone(),
            efi: EfiVariables::new(&config.sysfs_root),
            acpi: AcpiTables::new(&config.sysfs_root),
            roms: DevMemRoms::new(&config.dev_mem),
            vendor_id: config.vendor_id,
            rom_align: config.rom_align(),
        }
    }
}

impl FirmwareSource for SysfsFirmware {
    fn read_efi_variable(&self, name: &str) -> Option<Capability> {
        self.efi.read_capability(name, &VENDOR_GUID)
    }

    fn read_acpi_capability(&self, names: &[&str]) -> Option<Capability> {
        self.acpi.find_capability(names, &VENDOR_GUID)
    }

    fn read_vmd_register(&self, bus: &Path) -> Option<VmdRegister> {
        let bridge = bus_to_controller(&self.sysfs_root, bus)?;
        match vmd_register::read_vmd_register(&vmd_register::config_path(&bridge)) {
            Ok(reg) => Some(reg),
            Err(e) => {
                debug!(bridge = %bridge.display(), error = %e, "VMD register unreadable");
                None
            }
        }
    }

    #[instrument(skip(self, controller, is_known), fields(dev_id = controller.dev_id))]
    fn scan_option_roms(
        &self,
        controller: &Controller,
        is_known: &dyn Fn(u16) -> bool,
    ) -> Vec<OromMatch> {
        if sysfs::is_efi_boot(&self.sysfs_root) {
            debug!("EFI boot, option ROMs are not shadowed");
            return Vec::new();
        }
        orom::scan_option_roms(&self.roms, self.rom_align, self.vendor_id, is_known)
    }
}
