//! Capability Resolution
//!
//! [`Platform`] answers "what RAID features does this controller's firmware
//! offer?" by trying every source in priority order and remembering the
//! answers for the lifetime of the instance.
//!
//! # Resolution Order
//!
//! ```text
//! ┌────────────────┐ hit
//! │    registry    │──────────────────────────────────────▶ descriptor
//! └───────┬────────┘
//!         ▼ NVMe                                    (one per Platform)
//! ┌────────────────┐
//! │  $NVM built-in │──────────────────────────────────────▶ descriptor
//! └───────┬────────┘
//!         ▼ SAS / SATA (RAID class) / VMD
//! ┌────────────────┐   none   ┌────────────────┐
//! │ EFI variables  │─────────▶│   ACPI tables  │──────────▶ descriptor
//! └───────┬────────┘          └───────┬────────┘
//!         ▼ VMD bridge, nothing above           (one per Platform)
//! ┌────────────────┐
//! │  VMD register  │──────────────────────────────────────▶ descriptor
//! └───────┬────────┘
//!         ▼
//! ┌────────────────┐  registers every ROM found, then
//! │ option ROMs    │  re-checks the registry ────────────▶ descriptor / none
//! └────────────────┘
//! ```

mod config;
mod report;

pub use config::{
    PlatformConfig, TestMode, ENV_SAFE_OROM_SCAN, ENV_TEST_AHCI_EFI, ENV_TEST_OROM,
    ENV_TEST_OROM_NORAID5, ENV_TEST_SCU_EFI,
};
pub use report::{ControllerReport, PlatformReport};

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::adapters::{LoggingEventPublisher, SyntheticFirmware, SysfsFirmware};
use crate::capability::{Capability, CapabilityRegistry, EntryId};
use crate::domain::{CapabilitySource, DiscoveryEvent, EventPublisher, FirmwareSource};
use crate::error::Result;
use crate::firmware::{SATA_VARIABLES, SCU_VARIABLE, VMD_VARIABLES};
use crate::hardware::{Controller, ControllerKind, Enumerator};

const SCU_VARIABLES: [&str; 1] = [SCU_VARIABLE];

/// Controller list plus the moment it was built.
#[derive(Debug)]
struct DeviceCache {
    created: Instant,
    controllers: Vec<Controller>,
}

/// Everything a `Platform` learns while it lives.
#[derive(Debug, Default)]
struct PlatformState {
    registry: CapabilityRegistry,
    devices: Option<DeviceCache>,
    nvme_entry: Option<EntryId>,
    vmd_entry: Option<EntryId>,
}

/// Memoising capability resolver for one host.
///
/// Instances are independent: each owns its registry and caches, so tests
/// and callers that need a fresh view simply build a new one.
pub struct Platform {
    config: PlatformConfig,
    enumerator: Enumerator,
    firmware: Arc<dyn FirmwareSource>,
    events: Arc<dyn EventPublisher>,
    state: Mutex<PlatformState>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("config", &self.config)
            .field("registered", &self.state.lock().registry.len())
            .finish()
    }
}

impl Platform {
    /// Resolver backed by the real firmware interfaces.
    pub fn new(config: PlatformConfig) -> Result<Self> {
        let firmware = Arc::new(SysfsFirmware::new(&config));
        Self::with_firmware(config, firmware)
    }

    /// Resolver backed by an arbitrary firmware source.
    pub fn with_firmware(
        config: PlatformConfig,
        firmware: Arc<dyn FirmwareSource>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            enumerator: Enumerator::new(config.sysfs_root.clone(), config.vendor_id),
            config,
            firmware,
            events: Arc::new(LoggingEventPublisher::debug_level()),
            state: Mutex::new(PlatformState::default()),
        })
    }

    /// Resolver whose firmware is replaced when a test mode is active.
    pub fn with_test_mode(config: PlatformConfig, mode: TestMode) -> Result<Self> {
        if mode.is_active() {
            info!(?mode, "Using synthetic firmware");
            Self::with_firmware(config, Arc::new(SyntheticFirmware::from_test_mode(mode)))
        } else {
            Self::new(config)
        }
    }

    /// Default configuration with every environment hook applied.
    pub fn from_env() -> Result<Self> {
        Self::with_test_mode(PlatformConfig::from_env(), TestMode::from_env())
    }

    /// Replace the event publisher.
    pub fn with_event_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    // =========================================================================
    // Controllers
    // =========================================================================

    /// Every supported controller, rebuilt once the cached list is older
    /// than the configured TTL.
    pub fn find_controllers(&self) -> Vec<Controller> {
        let mut state = self.state.lock();
        self.controllers(&mut state).to_vec()
    }

    fn controllers<'a>(&self, state: &'a mut PlatformState) -> &'a [Controller] {
        let stale = match &state.devices {
            Some(cache) => cache.created.elapsed() >= self.config.cache_ttl,
            None => true,
        };
        if stale {
            let controllers = self.enumerator.find_all();
            self.events
                .publish(DiscoveryEvent::controllers_enumerated(controllers.len()));
            state.devices = Some(DeviceCache {
                created: Instant::now(),
                controllers,
            });
        }
        state
            .devices
            .as_ref()
            .map(|cache| cache.controllers.as_slice())
            .unwrap_or_default()
    }

    /// First controller with device id `dev_id`.
    pub fn controller_by_id(&self, dev_id: u16) -> Option<Controller> {
        self.find_controllers()
            .into_iter()
            .find(|c| c.dev_id == dev_id)
    }

    /// Controller with device id `dev_id` that `device_path` lives under.
    pub fn controller_by_id_and_path(&self, dev_id: u16, device_path: &Path) -> Option<Controller> {
        let path = std::fs::canonicalize(device_path).unwrap_or_else(|_| device_path.to_path_buf());
        self.find_controllers()
            .into_iter()
            .find(|c| c.dev_id == dev_id && c.contains_path(&path))
    }

    /// Controller a disk is attached to.
    ///
    /// `disk_path` is any sysfs node of the disk, e.g. `/sys/block/sda`.
    /// When controllers nest (a SATA controller behind a VMD bus) the most
    /// specific one wins.
    pub fn controller_for_disk(&self, disk_path: &Path) -> Option<Controller> {
        let path = std::fs::canonicalize(disk_path).ok()?;
        self.find_controllers()
            .into_iter()
            .filter(|c| c.contains_path(&path))
            .max_by_key(|c| c.path.components().count())
    }

    // =========================================================================
    // Capabilities
    // =========================================================================

    /// Descriptor already registered for `dev_id`, without probing.
    pub fn registered_capability(&self, dev_id: u16) -> Option<Arc<Capability>> {
        self.state.lock().registry.lookup(dev_id)
    }

    /// Descriptor for the controller with `dev_id`, optionally narrowed to
    /// the one a device path lives under.
    pub fn capability_for_device(
        &self,
        dev_id: u16,
        device_path: Option<&Path>,
    ) -> Option<Arc<Capability>> {
        if let Some(cap) = self.registered_capability(dev_id) {
            return Some(cap);
        }
        let controller = match device_path {
            Some(path) => self.controller_by_id_and_path(dev_id, path),
            None => self.controller_by_id(dev_id),
        }?;
        self.find_capability(&controller)
    }

    /// Resolve the descriptor for `controller`.
    #[instrument(
        skip(self, controller),
        fields(kind = %controller.kind, dev_id = controller.dev_id)
    )]
    pub fn find_capability(&self, controller: &Controller) -> Option<Arc<Capability>> {
        let mut state = self.state.lock();
        let resolved = self.resolve(&mut state, controller);

        match &resolved {
            Some((cap, source)) => {
                debug!(source = %source, signature = %cap.signature, "Capability resolved");
                self.events.publish(DiscoveryEvent::capability_resolved(
                    controller,
                    *source,
                    cap.signature.to_string(),
                ));
            }
            None => {
                debug!("No capability found");
                self.events.publish(DiscoveryEvent::capability_missing(controller));
            }
        }
        resolved.map(|(cap, _)| cap)
    }

    fn resolve(
        &self,
        state: &mut PlatformState,
        controller: &Controller,
    ) -> Option<(Arc<Capability>, CapabilitySource)> {
        if let Some(cap) = state.registry.lookup(controller.dev_id) {
            return Some((cap, CapabilitySource::Registry));
        }

        if controller.kind == ControllerKind::Nvme {
            let id = match state.nvme_entry {
                Some(id) => id,
                None => {
                    let id = state
                        .registry
                        .insert(Capability::nvme_compat(), Some(ControllerKind::Nvme));
                    state.nvme_entry = Some(id);
                    id
                }
            };
            return Self::attach(state, id, controller.dev_id, CapabilitySource::NvmeBuiltIn);
        }

        if let Some((cap, source)) = self.probe_efi(controller) {
            let id = state.registry.insert(cap, Some(controller.kind));
            return Self::attach(state, id, controller.dev_id, source);
        }

        if controller.kind == ControllerKind::Vmd {
            let id = match state.vmd_entry {
                Some(id) => Some(id),
                None => self.firmware.read_vmd_register(&controller.path).map(|reg| {
                    debug!(
                        sku = reg.sku(),
                        major = reg.major(),
                        minor = reg.minor(),
                        "VMD register"
                    );
                    let id = state
                        .registry
                        .insert(reg.capability(), Some(ControllerKind::Vmd));
                    state.vmd_entry = Some(id);
                    id
                }),
            };
            if let Some(id) = id {
                return Self::attach(state, id, controller.dev_id, CapabilitySource::VmdRegister);
            }
        }

        let matches = {
            let registry = &state.registry;
            self.firmware
                .scan_option_roms(controller, &|id| registry.lookup(id).is_some())
        };
        for found in matches {
            self.events
                .publish(DiscoveryEvent::option_rom_matched(found.device_ids.clone()));
            let id = state.registry.insert(found.capability, None);
            for dev_id in found.device_ids {
                state.registry.add_device_id(id, dev_id);
            }
        }

        state
            .registry
            .lookup(controller.dev_id)
            .map(|cap| (cap, CapabilitySource::OptionRom))
    }

    fn attach(
        state: &mut PlatformState,
        id: EntryId,
        dev_id: u16,
        source: CapabilitySource,
    ) -> Option<(Arc<Capability>, CapabilitySource)> {
        state.registry.add_device_id(id, dev_id);
        state.registry.capability(id).map(|cap| (cap, source))
    }

    /// EFI variables, then ACPI tables under the same names.
    fn probe_efi(&self, controller: &Controller) -> Option<(Capability, CapabilitySource)> {
        let names: &[&str] = match controller.kind {
            ControllerKind::Sas => &SCU_VARIABLES,
            ControllerKind::Sata if controller.is_raid_class() => &SATA_VARIABLES,
            ControllerKind::Sata => {
                debug!(
                    class = format_args!("{:#08x}", controller.class),
                    "Not in RAID mode, skipping EFI"
                );
                return None;
            }
            ControllerKind::Vmd | ControllerKind::SataVmd => &VMD_VARIABLES,
            ControllerKind::Nvme | ControllerKind::Unknown => return None,
        };

        names
            .iter()
            .find_map(|name| self.firmware.read_efi_variable(name))
            .map(|cap| (cap, CapabilitySource::EfiVariable))
            .or_else(|| {
                self.firmware
                    .read_acpi_capability(names)
                    .map(|cap| (cap, CapabilitySource::AcpiTable))
            })
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    /// Resolve every controller and snapshot the result.
    #[instrument(skip(self))]
    pub fn report(&self) -> PlatformReport {
        let controllers = self
            .find_controllers()
            .into_iter()
            .map(|controller| {
                let capability = self.find_capability(&controller).map(|cap| (*cap).clone());
                ControllerReport {
                    controller,
                    capability,
                }
            })
            .collect();
        PlatformReport::new(self.config.sysfs_root.clone(), controllers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryEventCollector;
    use crate::capability::RaidLevels;
    use crate::firmware::{OromMatch, VmdRegister};
    use crate::testutil::TempTree;
    use std::time::Duration;

    fn controller(kind: ControllerKind, dev_id: u16) -> Controller {
        let path = format!("/sys/devices/pci0000:00/0000:00:{:02x}.0", dev_id & 0xff);
        Controller::new(kind, dev_id, 0x010400, path)
    }

    fn platform(firmware: Arc<SyntheticFirmware>) -> (Platform, Arc<InMemoryEventCollector>) {
        let tree_root = std::env::temp_dir().join("imsm-platform-no-such-sysfs");
        let config = PlatformConfig {
            sysfs_root: tree_root,
            ..PlatformConfig::default()
        };
        let events = Arc::new(InMemoryEventCollector::new());
        let platform = Platform::with_firmware(config, firmware)
            .unwrap()
            .with_event_publisher(events.clone());
        (platform, events)
    }

    #[test]
    fn test_nvme_singleton() {
        let firmware = Arc::new(SyntheticFirmware::new());
        let (platform, _) = platform(firmware.clone());

        let a = platform.find_capability(&controller(ControllerKind::Nvme, 0x0a54)).unwrap();
        let b = platform.find_capability(&controller(ControllerKind::Nvme, 0xf1a8)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_nvme_compat());
        assert!(a.is_enterprise());
        assert_eq!(firmware.calls().efi, 0);
        assert!(Arc::ptr_eq(&platform.registered_capability(0xf1a8).unwrap(), &a));
    }

    #[test]
    fn test_vmd_register_probed_once() {
        let firmware =
            Arc::new(SyntheticFirmware::new().with_vmd_register(VmdRegister(2 << 1 | 7 << 4)));
        let (platform, events) = platform(firmware.clone());

        let a = platform.find_capability(&controller(ControllerKind::Vmd, 0x201d)).unwrap();
        let b = platform.find_capability(&controller(ControllerKind::Vmd, 0x28c0)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.raid_levels, RaidLevels::STANDARD);
        assert_eq!(a.major_ver, 7);
        assert_eq!(firmware.calls().vmd_register, 1);
        assert_eq!(
            events.sources(),
            vec![CapabilitySource::VmdRegister, CapabilitySource::VmdRegister]
        );
    }

    #[test]
    fn test_efi_preferred_over_acpi_and_rom() {
        let efi = Capability::platform_test(false);
        let firmware = Arc::new(
            SyntheticFirmware::new()
                .with_efi_variable("RstsSatV", efi.clone())
                .with_acpi_table("RstSataV", Capability::platform_test(true))
                .with_option_rom(OromMatch {
                    capability: Capability::nvme_compat(),
                    device_ids: vec![0x2822],
                }),
        );
        let (platform, events) = platform(firmware.clone());

        let cap = platform.find_capability(&controller(ControllerKind::Sata, 0x2822)).unwrap();
        assert_eq!(*cap, efi);
        assert_eq!(firmware.calls().acpi, 0);
        assert_eq!(firmware.calls().option_rom, 0);

        // Second lookup is a registry hit
        platform.find_capability(&controller(ControllerKind::Sata, 0x2822));
        assert_eq!(firmware.calls().efi, 2);
        assert_eq!(
            events.sources(),
            vec![CapabilitySource::EfiVariable, CapabilitySource::Registry]
        );
    }

    #[test]
    fn test_acpi_fallback() {
        let acpi = Capability::platform_test(true);
        let firmware = Arc::new(SyntheticFirmware::new().with_acpi_table("RstScuV", acpi.clone()));
        let (platform, events) = platform(firmware);

        let cap = platform.find_capability(&controller(ControllerKind::Sas, 0x1d6b)).unwrap();
        assert_eq!(*cap, acpi);
        assert_eq!(events.sources(), vec![CapabilitySource::AcpiTable]);
    }

    #[test]
    fn test_non_raid_sata_skips_efi() {
        let rom = Capability::platform_test(false);
        let firmware = Arc::new(
            SyntheticFirmware::new()
                .with_efi_variable("RstSataV", Capability::platform_test(true))
                .with_option_rom(OromMatch {
                    capability: rom.clone(),
                    device_ids: vec![0xa102],
                }),
        );
        let (platform, _) = platform(firmware.clone());

        let ahci = Controller::new(
            ControllerKind::Sata,
            0xa102,
            0x010601,
            "/sys/devices/pci0000:00/0000:00:17.0",
        );
        let cap = platform.find_capability(&ahci).unwrap();
        assert_eq!(*cap, rom);
        assert_eq!(firmware.calls().efi, 0);
    }

    #[test]
    fn test_rom_scan_registers_every_match() {
        let firmware = Arc::new(
            SyntheticFirmware::new()
                .with_option_rom(OromMatch {
                    capability: Capability::platform_test(false),
                    device_ids: vec![0x2822, 0x2826],
                })
                .with_option_rom(OromMatch {
                    capability: Capability::platform_test(true),
                    device_ids: vec![0x1d6b],
                }),
        );
        let (platform, events) = platform(firmware.clone());

        let sata = platform.find_capability(&controller(ControllerKind::Sata, 0x2826)).unwrap();
        assert!(sata.has_raid5());
        assert!(!platform.registered_capability(0x1d6b).unwrap().has_raid5());
        assert!(Arc::ptr_eq(&platform.registered_capability(0x2822).unwrap(), &sata));
        assert_eq!(events.events_of_type("OptionRomMatched").len(), 2);
    }

    #[test]
    fn test_nothing_found() {
        let firmware = Arc::new(SyntheticFirmware::new());
        let (platform, events) = platform(firmware.clone());

        assert!(platform.find_capability(&controller(ControllerKind::Vmd, 0x201d)).is_none());
        assert_eq!(
            firmware.calls(),
            crate::adapters::ProbeCalls {
                efi: 2,
                acpi: 1,
                vmd_register: 1,
                option_rom: 1,
            }
        );
        assert_eq!(events.events_of_type("CapabilityMissing").len(), 1);
    }

    #[test]
    fn test_orom_test_mode() {
        let firmware = Arc::new(SyntheticFirmware::from_test_mode(TestMode {
            orom: true,
            no_raid5: true,
            ..TestMode::default()
        }));
        let (platform, _) = platform(firmware);

        let cap = platform.find_capability(&controller(ControllerKind::Sata, 0x2822)).unwrap();
        assert!(!cap.has_raid5());
        assert!(cap.has_raid10());
        assert_eq!(cap.max_disks_per_array, 6);
    }

    #[test]
    fn test_device_cache_ttl() {
        let tree = TempTree::new();
        let add = |dev: &str, id: &str| {
            tree.write(&format!("devices/pci0000:00/{}/vendor", dev), b"0x8086\n");
            tree.write(&format!("devices/pci0000:00/{}/device", dev), id.as_bytes());
            tree.write(&format!("devices/pci0000:00/{}/class", dev), b"0x010400\n");
            tree.mkdir("bus/pci");
            tree.symlink("bus/pci", &format!("devices/pci0000:00/{}/subsystem", dev));
            tree.symlink(
                &format!("devices/pci0000:00/{}", dev),
                &format!("bus/pci/drivers/ahci/{}", dev),
            );
        };
        add("0000:00:17.0", "0x2822\n");

        let cached = Platform::with_firmware(
            PlatformConfig {
                sysfs_root: tree.root().to_path_buf(),
                cache_ttl: Duration::from_secs(3600),
                ..PlatformConfig::default()
            },
            Arc::new(SyntheticFirmware::new()),
        )
        .unwrap();
        let uncached = Platform::with_firmware(
            PlatformConfig {
                sysfs_root: tree.root().to_path_buf(),
                cache_ttl: Duration::ZERO,
                ..PlatformConfig::default()
            },
            Arc::new(SyntheticFirmware::new()),
        )
        .unwrap();

        assert_eq!(cached.find_controllers().len(), 1);
        assert_eq!(uncached.find_controllers().len(), 1);

        add("0000:00:1f.2", "0x2826\n");
        assert_eq!(cached.find_controllers().len(), 1);
        assert_eq!(uncached.find_controllers().len(), 2);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = PlatformConfig {
            vendor_id: 0,
            ..PlatformConfig::default()
        };
        assert!(Platform::with_firmware(config, Arc::new(SyntheticFirmware::new())).is_err());
    }
}
