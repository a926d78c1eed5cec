//! Platform configuration and environment hooks.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::firmware::orom::{DEFAULT_ROM_ALIGN, SAFE_ROM_ALIGN};
use crate::hardware::INTEL_VENDOR_ID;
use crate::sysfs::SYSFS_ROOT;

/// Forces the slower 2 KiB option ROM alignment.
pub const ENV_SAFE_OROM_SCAN: &str = "IMSM_SAFE_OROM_SCAN";
/// Option ROM scan reports a synthetic descriptor; EFI reports nothing.
pub const ENV_TEST_OROM: &str = "IMSM_TEST_OROM";
/// Synthetic descriptors omit RAID 5.
pub const ENV_TEST_OROM_NORAID5: &str = "IMSM_TEST_OROM_NORAID5";
/// EFI reports a synthetic descriptor for SATA controllers.
pub const ENV_TEST_AHCI_EFI: &str = "IMSM_TEST_AHCI_EFI";
/// EFI reports a synthetic descriptor for SAS controllers.
pub const ENV_TEST_SCU_EFI: &str = "IMSM_TEST_SCU_EFI";

/// Whether an environment hook is switched on. Only the value `1` counts.
fn flag_set(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> bool {
    lookup(name).as_deref() == Some("1")
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for capability discovery
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Root of the sysfs tree
    pub sysfs_root: PathBuf,

    /// Physical memory device used for the option ROM scan
    pub dev_mem: PathBuf,

    /// Only controllers from this PCI vendor are considered
    pub vendor_id: u16,

    /// How long an enumerated controller list stays valid
    pub cache_ttl: Duration,

    /// Scan option ROMs at 2 KiB instead of 512 byte boundaries
    pub safe_rom_scan: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from(SYSFS_ROOT),
            dev_mem: PathBuf::from("/dev/mem"),
            vendor_id: INTEL_VENDOR_ID,
            cache_ttl: Duration::from_secs(10),
            safe_rom_scan: false,
        }
    }
}

impl PlatformConfig {
    /// Defaults, with the ROM alignment hook read from the environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults, with the ROM alignment hook read through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            safe_rom_scan: flag_set(&lookup, ENV_SAFE_OROM_SCAN),
            ..Self::default()
        }
    }

    /// Option ROM alignment in bytes.
    pub fn rom_align(&self) -> usize {
        if self.safe_rom_scan {
            SAFE_ROM_ALIGN
        } else {
            DEFAULT_ROM_ALIGN
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.vendor_id == 0 || self.vendor_id == 0xffff {
            return Err(Error::Config(format!(
                "invalid PCI vendor id {:#06x}",
                self.vendor_id
            )));
        }
        if self.sysfs_root.as_os_str().is_empty() {
            return Err(Error::Config("sysfs root must not be empty".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// Test Modes
// =============================================================================

/// Firmware substitutions requested through the environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestMode {
    pub orom: bool,
    pub no_raid5: bool,
    pub ahci_efi: bool,
    pub scu_efi: bool,
}

impl TestMode {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            orom: flag_set(&lookup, ENV_TEST_OROM),
            no_raid5: flag_set(&lookup, ENV_TEST_OROM_NORAID5),
            ahci_efi: flag_set(&lookup, ENV_TEST_AHCI_EFI),
            scu_efi: flag_set(&lookup, ENV_TEST_SCU_EFI),
        }
    }

    /// Whether real firmware should be replaced at all.
    ///
    /// `no_raid5` alone only modifies the other modes.
    pub fn is_active(&self) -> bool {
        self.orom || self.ahci_efi || self.scu_efi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PlatformConfig::default();
        assert_eq!(config.sysfs_root, PathBuf::from("/sys"));
        assert_eq!(config.vendor_id, 0x8086);
        assert_eq!(config.cache_ttl, Duration::from_secs(10));
        assert_eq!(config.rom_align(), 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_safe_scan_hook() {
        let safe = PlatformConfig::from_lookup(lookup(&[("IMSM_SAFE_OROM_SCAN", "1")]));
        assert_eq!(safe.rom_align(), 2048);
        let other = PlatformConfig::from_lookup(lookup(&[("IMSM_SAFE_OROM_SCAN", "yes")]));
        assert_eq!(other.rom_align(), 512);
    }

    #[test]
    fn test_validate_rejects_bad_vendor() {
        let config = PlatformConfig {
            vendor_id: 0xffff,
            ..PlatformConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_test_modes() {
        assert!(!TestMode::from_lookup(lookup(&[])).is_active());

        let mode = TestMode::from_lookup(lookup(&[
            ("IMSM_TEST_OROM", "1"),
            ("IMSM_TEST_OROM_NORAID5", "1"),
        ]));
        assert!(mode.orom && mode.no_raid5);
        assert!(mode.is_active());

        let mode = TestMode::from_lookup(lookup(&[
            ("IMSM_TEST_OROM_NORAID5", "1"),
            ("IMSM_TEST_SCU_EFI", "0"),
        ]));
        assert!(!mode.is_active());
    }
}
