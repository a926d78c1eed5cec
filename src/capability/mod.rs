//! Capability Descriptors
//!
//! The IMSM capability descriptor is a fixed 38-byte little-endian record
//! published by Intel RAID firmware (option ROM, EFI driver or ACPI table).
//! It lists the RAID levels, strip sizes and disk/volume limits a controller
//! family supports.
//!
//! # Layout
//!
//! ```text
//! 0   signature[4]        "$VER" firmware, "$NVM"/"$VMD" built-in
//! 4   table_ver_major     6   major_ver   8  minor_ver
//! 10  hotfix_ver          12  build       14 len   15 checksum
//! 16  rlc  (RAID levels)  18  sss (strip sizes)
//! 20  dpa  22 tds  24 vpa  25 vphba
//! 26  attr 30 capabilities 34 driver_features
//! ```
//!
//! # Components
//!
//! - [`Capability`] - decoded descriptor and its query helpers
//! - [`registry`] - descriptors shared between device ids
//! - [`levels`] - per-RAID-level support and disk count predicates

pub mod levels;
pub mod registry;

#[cfg(test)]
mod proptest;

use std::fmt;

use bitflags::bitflags;
use bytes::{Buf, BufMut};
use serde::{Serialize, Serializer};

pub use levels::{is_disk_count_valid, is_level_supported, level_name, LevelOps, LEVEL_OPS};
pub use registry::{CapabilityRegistry, EntryId, RegistryEntry};

/// Size in bytes of the on-firmware descriptor.
pub const CAPABILITY_SIZE: usize = 38;

/// Signature of a descriptor published by firmware.
pub const OROM_SIGNATURE: [u8; 4] = *b"$VER";
/// Signature of the built-in NVMe compatibility descriptor.
pub const NVME_COMPAT_SIGNATURE: [u8; 4] = *b"$NVM";
/// Signature of the built-in VMD compatibility descriptor.
pub const VMD_COMPAT_SIGNATURE: [u8; 4] = *b"$VMD";

/// Disks per array on SATA/SAS platforms.
pub const DISKS_PER_ARRAY: u16 = 6;
/// Disks per array on NVMe and VMD platforms.
pub const DISKS_PER_ARRAY_NVME: u16 = 12;
/// Total disks on SATA/SAS platforms.
pub const TOTAL_DISKS: u16 = 6;
/// Total disks on NVMe platforms.
pub const TOTAL_DISKS_NVME: u16 = 12;
/// Total disks behind a VMD domain.
pub const TOTAL_DISKS_VMD: u16 = 48;
/// Volumes per array.
pub const VOLUMES_PER_ARRAY: u8 = 2;
/// Volumes per SATA/SAS controller.
pub const VOLUMES_PER_HBA: u8 = 4;
/// Volumes per VMD controller.
pub const VOLUMES_PER_HBA_VMD: u8 = 24;

bitflags! {
    /// RAID Level Capability (`rlc`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct RaidLevels: u16 {
        const RAID0    = 1 << 0;
        const RAID1    = 1 << 1;
        const RAID10   = 1 << 2;
        const RAID1E   = 1 << 3;
        const RAID5    = 1 << 4;
        /// Only RAID level migration is licensed
        const RAID_CNG = 1 << 5;
    }
}

impl RaidLevels {
    /// The four levels a fully licensed platform offers.
    pub const STANDARD: Self = Self::RAID0
        .union(Self::RAID1)
        .union(Self::RAID10)
        .union(Self::RAID5);
}

bitflags! {
    /// Strip Sizes Supported (`sss`); bit n means 2^(n+1) KiB.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct StripSizes: u16 {
        const KIB_2   = 1 << 0;
        const KIB_4   = 1 << 1;
        const KIB_8   = 1 << 2;
        const KIB_16  = 1 << 3;
        const KIB_32  = 1 << 4;
        const KIB_64  = 1 << 5;
        const KIB_128 = 1 << 6;
        const KIB_256 = 1 << 7;
        const KIB_512 = 1 << 8;
        const MIB_1   = 1 << 9;
        const MIB_2   = 1 << 10;
        const MIB_4   = 1 << 11;
        const MIB_8   = 1 << 12;
        const MIB_16  = 1 << 13;
        const MIB_32  = 1 << 14;
        const MIB_64  = 1 << 15;
    }
}

impl StripSizes {
    /// 4 KiB through 128 KiB, the set used by built-in descriptors.
    pub const KIB_4_TO_128: Self = Self::KIB_4
        .union(Self::KIB_8)
        .union(Self::KIB_16)
        .union(Self::KIB_32)
        .union(Self::KIB_64)
        .union(Self::KIB_128);
}

bitflags! {
    /// Attributes (`attr`). The low bits duplicate [`RaidLevels`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct Attributes: u32 {
        const RAID0           = 1 << 0;
        const RAID1           = 1 << 1;
        const RAID10          = 1 << 2;
        const RAID1E          = 1 << 3;
        const RAID5           = 1 << 4;
        const RAID_CNG        = 1 << 5;
        const TWO_TB_DISK     = 1 << 26;
        const TWO_TB          = 1 << 29;
        const PM              = 1 << 30;
        const CHECKSUM_VERIFY = 1 << 31;

        const _ = !0;
    }
}

bitflags! {
    /// Driver features (`driver_features`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct DriverFeatures: u32 {
        const HDD_UNLOCK        = 1 << 0;
        const LED_LOC           = 1 << 1;
        const ENTERPRISE_SYSTEM = 1 << 2;
        const ZPODD             = 1 << 3;
        const LARGE_DRAM_CACHE  = 1 << 4;
        const ROHI              = 1 << 5;
        const READ_PATROL       = 1 << 6;
        const XOR_HW            = 1 << 7;
        const SKU_MODE          = (1 << 8) | (1 << 9);
        const TPV               = 1 << 10;

        const _ = !0;
    }
}

/// Four-byte descriptor signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; 4]);

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:?})", self.to_string())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// =============================================================================
// Capability
// =============================================================================

/// RAID capabilities of one controller family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Capability {
    pub signature: Signature,
    pub table_ver_major: u8,
    pub table_ver_minor: u8,
    pub major_ver: u16,
    pub minor_ver: u16,
    pub hotfix_ver: u16,
    pub build: u16,
    /// Table length as declared by firmware
    pub len: u8,
    pub checksum: u8,
    pub raid_levels: RaidLevels,
    pub strip_sizes: StripSizes,
    pub max_disks_per_array: u16,
    pub max_total_disks: u16,
    pub max_volumes_per_array: u8,
    pub max_volumes_per_controller: u8,
    pub attributes: Attributes,
    pub capabilities: u32,
    pub driver_features: DriverFeatures,
}

impl Capability {
    /// An all-zero descriptor carrying only a signature.
    pub fn empty(signature: [u8; 4]) -> Self {
        Self {
            signature: Signature(signature),
            table_ver_major: 0,
            table_ver_minor: 0,
            major_ver: 0,
            minor_ver: 0,
            hotfix_ver: 0,
            build: 0,
            len: 0,
            checksum: 0,
            raid_levels: RaidLevels::empty(),
            strip_sizes: StripSizes::empty(),
            max_disks_per_array: 0,
            max_total_disks: 0,
            max_volumes_per_array: 0,
            max_volumes_per_controller: 0,
            attributes: Attributes::empty(),
            capabilities: 0,
            driver_features: DriverFeatures::empty(),
        }
    }

    /// Decode a descriptor from the first [`CAPABILITY_SIZE`] bytes of `raw`.
    ///
    /// Returns `None` when `raw` is too short. The signature is not checked;
    /// EFI and ACPI sources publish whatever the firmware vendor chose.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        if raw.len() < CAPABILITY_SIZE {
            return None;
        }
        let mut buf = &raw[..CAPABILITY_SIZE];

        let mut signature = [0u8; 4];
        buf.copy_to_slice(&mut signature);

        Some(Self {
            signature: Signature(signature),
            table_ver_major: buf.get_u8(),
            table_ver_minor: buf.get_u8(),
            major_ver: buf.get_u16_le(),
            minor_ver: buf.get_u16_le(),
            hotfix_ver: buf.get_u16_le(),
            build: buf.get_u16_le(),
            len: buf.get_u8(),
            checksum: buf.get_u8(),
            raid_levels: RaidLevels::from_bits_retain(buf.get_u16_le()),
            strip_sizes: StripSizes::from_bits_retain(buf.get_u16_le()),
            max_disks_per_array: buf.get_u16_le(),
            max_total_disks: buf.get_u16_le(),
            max_volumes_per_array: buf.get_u8(),
            max_volumes_per_controller: buf.get_u8(),
            attributes: Attributes::from_bits_retain(buf.get_u32_le()),
            capabilities: buf.get_u32_le(),
            driver_features: DriverFeatures::from_bits_retain(buf.get_u32_le()),
        })
    }

    /// Encode into the firmware layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(CAPABILITY_SIZE);
        buf.put_slice(&self.signature.0);
        buf.put_u8(self.table_ver_major);
        buf.put_u8(self.table_ver_minor);
        buf.put_u16_le(self.major_ver);
        buf.put_u16_le(self.minor_ver);
        buf.put_u16_le(self.hotfix_ver);
        buf.put_u16_le(self.build);
        buf.put_u8(self.len);
        buf.put_u8(self.checksum);
        buf.put_u16_le(self.raid_levels.bits());
        buf.put_u16_le(self.strip_sizes.bits());
        buf.put_u16_le(self.max_disks_per_array);
        buf.put_u16_le(self.max_total_disks);
        buf.put_u8(self.max_volumes_per_array);
        buf.put_u8(self.max_volumes_per_controller);
        buf.put_u32_le(self.attributes.bits());
        buf.put_u32_le(self.capabilities);
        buf.put_u32_le(self.driver_features.bits());
        buf
    }

    // =========================================================================
    // Built-in descriptors
    // =========================================================================

    /// Compatibility descriptor for NVMe controllers, which publish no
    /// readable per-model firmware capability.
    pub fn nvme_compat() -> Self {
        Self {
            raid_levels: RaidLevels::STANDARD,
            strip_sizes: StripSizes::KIB_4_TO_128,
            max_disks_per_array: DISKS_PER_ARRAY_NVME,
            max_total_disks: TOTAL_DISKS_NVME,
            max_volumes_per_array: VOLUMES_PER_ARRAY,
            max_volumes_per_controller: (TOTAL_DISKS_NVME / 2) as u8 * VOLUMES_PER_ARRAY,
            attributes: Attributes::TWO_TB | Attributes::TWO_TB_DISK,
            driver_features: DriverFeatures::ENTERPRISE_SYSTEM,
            ..Self::empty(NVME_COMPAT_SIGNATURE)
        }
    }

    /// Compatibility descriptor for a VMD domain without EFI capability.
    ///
    /// Only RAID level migration is offered unless the bridge reports the
    /// premium SKU.
    pub fn vmd_compat(premium: bool, major_ver: u16, minor_ver: u16) -> Self {
        let raid_levels = if premium {
            RaidLevels::STANDARD
        } else {
            RaidLevels::RAID_CNG
        };
        Self {
            major_ver,
            minor_ver,
            raid_levels,
            strip_sizes: StripSizes::KIB_4_TO_128,
            max_disks_per_array: DISKS_PER_ARRAY_NVME,
            max_total_disks: TOTAL_DISKS_VMD,
            max_volumes_per_array: VOLUMES_PER_ARRAY,
            max_volumes_per_controller: VOLUMES_PER_HBA_VMD,
            attributes: Attributes::TWO_TB | Attributes::TWO_TB_DISK,
            driver_features: DriverFeatures::ENTERPRISE_SYSTEM | DriverFeatures::TPV,
            ..Self::empty(VMD_COMPAT_SIGNATURE)
        }
    }

    /// Synthetic firmware descriptor used by the test modes.
    pub fn platform_test(no_raid5: bool) -> Self {
        let raid_levels = if no_raid5 {
            RaidLevels::RAID0 | RaidLevels::RAID1 | RaidLevels::RAID10
        } else {
            RaidLevels::STANDARD
        };
        Self {
            raid_levels,
            strip_sizes: StripSizes::KIB_4_TO_128,
            max_disks_per_array: DISKS_PER_ARRAY,
            max_total_disks: TOTAL_DISKS,
            max_volumes_per_array: VOLUMES_PER_ARRAY,
            max_volumes_per_controller: VOLUMES_PER_HBA,
            attributes: Attributes::from_bits_retain(raid_levels.bits() as u32)
                | Attributes::CHECKSUM_VERIFY,
            ..Self::empty(OROM_SIGNATURE)
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn has_raid0(&self) -> bool {
        self.raid_levels.contains(RaidLevels::RAID0)
    }

    pub fn has_raid1(&self) -> bool {
        self.raid_levels.contains(RaidLevels::RAID1)
    }

    pub fn has_raid1e(&self) -> bool {
        self.raid_levels.contains(RaidLevels::RAID1E)
    }

    pub fn has_raid10(&self) -> bool {
        self.raid_levels.contains(RaidLevels::RAID10)
    }

    pub fn has_raid5(&self) -> bool {
        self.raid_levels.contains(RaidLevels::RAID5)
    }

    /// Whether only level migration is licensed.
    pub fn has_raid_cng(&self) -> bool {
        self.raid_levels.contains(RaidLevels::RAID_CNG)
    }

    /// Whether a strip of `chunk_kib` KiB is supported.
    pub fn has_chunk(&self, chunk_kib: u32) -> bool {
        if chunk_kib < 2 || !chunk_kib.is_power_of_two() {
            return false;
        }
        let bit = chunk_kib.trailing_zeros() - 1;
        bit < 16 && self.strip_sizes.bits() & (1 << bit) != 0
    }

    /// Supported strip sizes in KiB, ascending.
    pub fn chunk_sizes(&self) -> Vec<u32> {
        (0..16)
            .filter(|bit| self.strip_sizes.bits() & (1 << bit) != 0)
            .map(|bit| 1u32 << (bit + 1))
            .collect()
    }

    /// Smallest supported strip, capped at 512 KiB; 0 if none.
    pub fn default_chunk(&self) -> u32 {
        self.chunk_sizes()
            .first()
            .map(|&kib| kib.min(512))
            .unwrap_or(0)
    }

    /// Largest supported strip in KiB; 0 if none.
    pub fn max_chunk(&self) -> u32 {
        self.chunk_sizes().last().copied().unwrap_or(0)
    }

    pub fn is_enterprise(&self) -> bool {
        self.driver_features
            .contains(DriverFeatures::ENTERPRISE_SYSTEM)
    }

    pub fn is_nvme_compat(&self) -> bool {
        self.signature.0 == NVME_COMPAT_SIGNATURE
    }

    /// Built from VMD register state rather than EFI firmware.
    pub fn is_vmd_compat(&self) -> bool {
        self.signature.0 == VMD_COMPAT_SIGNATURE
    }

    pub fn has_tpv_support(&self) -> bool {
        self.driver_features.contains(DriverFeatures::TPV)
    }

    pub fn supports_2tb_volumes(&self) -> bool {
        self.attributes.contains(Attributes::TWO_TB)
    }

    pub fn supports_2tb_disks(&self) -> bool {
        self.attributes.contains(Attributes::TWO_TB_DISK)
    }

    /// Marketing name of the firmware family.
    pub fn platform_name(&self) -> String {
        if self.capabilities == 0 && self.driver_features.is_empty() {
            "Intel(R) Matrix Storage Manager".to_string()
        } else if self.is_enterprise() && self.major_ver >= 6 {
            "Intel(R) Virtual RAID on CPU".to_string()
        } else if self.is_enterprise() {
            "Intel(R) Rapid Storage Technology enterprise".to_string()
        } else {
            "Intel(R) Rapid Storage Technology".to_string()
        }
    }

    /// Firmware version, if the descriptor carries one.
    pub fn version(&self) -> Option<String> {
        if self.major_ver == 0 && self.minor_ver == 0 && self.hotfix_ver == 0 && self.build == 0 {
            return None;
        }
        Some(format!(
            "{}.{}.{}.{}",
            self.major_ver, self.minor_ver, self.hotfix_ver, self.build
        ))
    }

    /// Names of the supported RAID levels, in table order.
    pub fn level_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = LEVEL_OPS
            .iter()
            .filter(|ops| (ops.is_supported)(self))
            .map(|ops| ops.name)
            .collect();
        if self.has_raid1e() {
            names.push("raid1e");
        }
        names
    }
}

fn format_chunk(kib: u32) -> String {
    if kib >= 1024 {
        format!("{}M", kib / 1024)
    } else {
        format!("{}k", kib)
    }
}

fn supported(flag: bool) -> &'static str {
    if flag {
        "supported"
    } else {
        "not supported"
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "       Platform : {}", self.platform_name())?;
        if let Some(version) = self.version() {
            writeln!(f, "        Version : {}", version)?;
        }
        if self.has_raid_cng() && !self.raid_levels.intersects(RaidLevels::STANDARD) {
            writeln!(f, "    RAID Levels : level migration only")?;
        } else {
            writeln!(f, "    RAID Levels : {}", self.level_names().join(" "))?;
        }
        let chunks: Vec<String> = self.chunk_sizes().into_iter().map(format_chunk).collect();
        writeln!(f, "    Chunk Sizes : {}", chunks.join(" "))?;
        writeln!(f, "    2TB volumes : {}", supported(self.supports_2tb_volumes()))?;
        writeln!(f, "      2TB disks : {}", supported(self.supports_2tb_disks()))?;
        writeln!(f, "      Max Disks : {}", self.max_total_disks)?;
        write!(
            f,
            "    Max Volumes : {} per array, {} per controller",
            self.max_volumes_per_array, self.max_volumes_per_controller
        )
    }
}
