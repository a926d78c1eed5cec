//! VMD Capability Register
//!
//! VMD bridges without an EFI capability variable still report their SKU
//! and VROC version in a 32-bit register of PCI configuration space.
//!
//! ```text
//! config + 0x3FC (u32, little-endian)
//!   bit  0      reserved
//!   bits 1..3   SKU (2 = premium)
//!   bits 4..7   major version
//!   bits 8..11  minor version
//! ```

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::capability::Capability;
use crate::error::{Error, Result};

/// Offset of the capability register in configuration space.
pub const VMD_REGISTER_OFFSET: u64 = 0x3fc;

const SKU_PREMIUM: u8 = 2;

/// Raw contents of the VMD capability register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmdRegister(pub u32);

impl VmdRegister {
    pub fn sku(self) -> u8 {
        ((self.0 >> 1) & 0x7) as u8
    }

    pub fn is_premium(self) -> bool {
        self.sku() == SKU_PREMIUM
    }

    pub fn major(self) -> u16 {
        ((self.0 >> 4) & 0xf) as u16
    }

    pub fn minor(self) -> u16 {
        ((self.0 >> 8) & 0xf) as u16
    }

    /// Built-in descriptor matching this register.
    pub fn capability(self) -> Capability {
        Capability::vmd_compat(self.is_premium(), self.major(), self.minor())
    }
}

/// Configuration space file of the bridge device at `bridge`.
pub fn config_path(bridge: &Path) -> PathBuf {
    bridge.join("config")
}

/// Read the capability register from a configuration space file.
///
/// Unprivileged readers only see the first 64 bytes of config space, so a
/// short file is reported as malformed rather than read as zero.
pub fn read_vmd_register(config: &Path) -> Result<VmdRegister> {
    let file = File::open(config).map_err(|e| Error::from_io(config, e))?;
    let mut raw = [0u8; 4];
    file.read_exact_at(&mut raw, VMD_REGISTER_OFFSET)
        .map_err(|_| Error::malformed(config, "configuration space truncated"))?;
    Ok(VmdRegister(u32::from_le_bytes(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::RaidLevels;
    use crate::testutil::TempTree;
    use assert_matches::assert_matches;

    #[test]
    fn test_register_fields() {
        // sku 2, major 7, minor 5
        let reg = VmdRegister(0b0101_0111_0100);
        assert_eq!(reg.sku(), 2);
        assert!(reg.is_premium());
        assert_eq!(reg.major(), 7);
        assert_eq!(reg.minor(), 5);

        let standard = VmdRegister(0b0000_0001_0010);
        assert_eq!(standard.sku(), 1);
        assert!(!standard.is_premium());
        assert_eq!(standard.major(), 1);
    }

    #[test]
    fn test_capability_by_sku() {
        let premium = VmdRegister(2 << 1 | 8 << 4).capability();
        assert_eq!(premium.raid_levels, RaidLevels::STANDARD);
        assert_eq!(premium.major_ver, 8);
        assert!(premium.is_vmd_compat());

        let standard = VmdRegister(1 << 1).capability();
        assert_eq!(standard.raid_levels, RaidLevels::RAID_CNG);
    }

    #[test]
    fn test_read_from_config() {
        let tree = TempTree::new();
        let mut config = vec![0u8; 4096];
        config[0x3fc..0x400].copy_from_slice(&(2u32 << 1 | 8 << 4 | 1 << 8).to_le_bytes());
        tree.write("bridge/config", &config);

        let reg = read_vmd_register(&config_path(&tree.path("bridge"))).unwrap();
        assert!(reg.is_premium());
        assert_eq!((reg.major(), reg.minor()), (8, 1));
    }

    #[test]
    fn test_read_truncated_or_missing() {
        let tree = TempTree::new();
        tree.write("bridge/config", &[0u8; 64]);

        assert_matches!(
            read_vmd_register(&tree.path("bridge/config")),
            Err(Error::Malformed { .. })
        );
        assert_matches!(
            read_vmd_register(&tree.path("missing/config")),
            Err(Error::NotFound { .. })
        );
    }
}
