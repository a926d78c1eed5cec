//! Synthetic Firmware Adapter
//!
//! Implements the `FirmwareSource` port from canned descriptors. Used by the
//! environment test modes and by tests that need to observe which probes
//! the orchestrator called.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;

use crate::capability::Capability;
use crate::domain::ports::FirmwareSource;
use crate::firmware::{OromMatch, VmdRegister, SATA_VARIABLES, SCU_VARIABLE};
use crate::hardware::Controller;
use crate::platform::TestMode;

/// Number of times each probe was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeCalls {
    pub efi: usize,
    pub acpi: usize,
    pub vmd_register: usize,
    pub option_rom: usize,
}

/// Firmware source answering from memory.
#[derive(Debug, Default)]
pub struct SyntheticFirmware {
    efi: HashMap<String, Capability>,
    acpi: HashMap<String, Capability>,
    vmd_register: Option<VmdRegister>,
    roms: Vec<OromMatch>,
    /// Descriptor the ROM scan reports for whichever controller asks
    rom_for_any: Option<Capability>,
    calls: Mutex<ProbeCalls>,
}

impl SyntheticFirmware {
    /// A source that has nothing to offer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Firmware as the environment test modes describe it.
    pub fn from_test_mode(mode: TestMode) -> Self {
        let synthetic = Capability::platform_test(mode.no_raid5);
        let mut firmware = Self::new();

        if mode.orom {
            firmware.rom_for_any = Some(synthetic);
            return firmware;
        }
        if mode.ahci_efi {
            for name in SATA_VARIABLES {
                firmware = firmware.with_efi_variable(name, synthetic.clone());
            }
        }
        if mode.scu_efi {
            firmware = firmware.with_efi_variable(SCU_VARIABLE, synthetic);
        }
        firmware
    }

    pub fn with_efi_variable(mut self, name: &str, capability: Capability) -> Self {
        self.efi.insert(name.to_string(), capability);
        self
    }

    pub fn with_acpi_table(mut self, name: &str, capability: Capability) -> Self {
        self.acpi.insert(name.to_string(), capability);
        self
    }

    pub fn with_vmd_register(mut self, register: VmdRegister) -> Self {
        self.vmd_register = Some(register);
        self
    }

    pub fn with_option_rom(mut self, rom: OromMatch) -> Self {
        self.roms.push(rom);
        self
    }

    /// Snapshot of the probe call counters.
    pub fn calls(&self) -> ProbeCalls {
        *self.calls.lock()
    }
}

impl FirmwareSource for SyntheticFirmware {
    fn read_efi_variable(&self, name: &str) -> Option<Capability> {
        self.calls.lock().efi += 1;
        self.efi.get(name).cloned()
    }

    fn read_acpi_capability(&self, names: &[&str]) -> Option<Capability> {
        self.calls.lock().acpi += 1;
        names.iter().find_map(|name| self.acpi.get(*name).cloned())
    }

    fn read_vmd_register(&self, _bus: &Path) -> Option<VmdRegister> {
        self.calls.lock().vmd_register += 1;
        self.vmd_register
    }

    fn scan_option_roms(
        &self,
        controller: &Controller,
        is_known: &dyn Fn(u16) -> bool,
    ) -> Vec<OromMatch> {
        self.calls.lock().option_rom += 1;

        let mut matches: Vec<OromMatch> = self
            .roms
            .iter()
            .filter(|rom| !rom.device_ids.iter().any(|id| is_known(*id)))
            .cloned()
            .collect();

        if let Some(capability) = &self.rom_for_any {
            if !is_known(controller.dev_id) {
                matches.push(OromMatch {
                    capability: capability.clone(),
                    device_ids: vec![controller.dev_id],
                });
            }
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::RaidLevels;
    use crate::hardware::ControllerKind;

    fn sata() -> Controller {
        Controller::new(
            ControllerKind::Sata,
            0x2822,
            0x010400,
            "/sys/devices/pci0000:00/0000:00:17.0",
        )
    }

    #[test]
    fn test_orom_mode() {
        let firmware = SyntheticFirmware::from_test_mode(TestMode {
            orom: true,
            no_raid5: true,
            ..TestMode::default()
        });

        assert!(firmware.read_efi_variable("RstSataV").is_none());
        let found = firmware.scan_option_roms(&sata(), &|_| false);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].device_ids, vec![0x2822]);
        assert!(!found[0].capability.raid_levels.contains(RaidLevels::RAID5));

        assert!(firmware.scan_option_roms(&sata(), &|id| id == 0x2822).is_empty());
    }

    #[test]
    fn test_efi_modes() {
        let ahci = SyntheticFirmware::from_test_mode(TestMode {
            ahci_efi: true,
            ..TestMode::default()
        });
        assert!(ahci.read_efi_variable("RsttSatV").is_some());
        assert!(ahci.read_efi_variable("RstScuV").is_none());
        assert!(ahci.scan_option_roms(&sata(), &|_| false).is_empty());

        let scu = SyntheticFirmware::from_test_mode(TestMode {
            scu_efi: true,
            ..TestMode::default()
        });
        assert!(scu.read_efi_variable("RstScuV").unwrap().has_raid5());
    }

    #[test]
    fn test_call_counters() {
        let firmware = SyntheticFirmware::new();
        firmware.read_efi_variable("RstSataV");
        firmware.read_efi_variable("RstsSatV");
        firmware.read_acpi_capability(&["RstSataV"]);
        firmware.read_vmd_register(Path::new("/sys"));

        assert_eq!(
            firmware.calls(),
            ProbeCalls {
                efi: 2,
                acpi: 1,
                vmd_register: 1,
                option_rom: 0,
            }
        );
    }
}
