//! RAID-Level Support Predicates
//!
//! Static table consulted by array-validation code: which bit of the
//! capability descriptor licenses a level, and which member counts the
//! level accepts. Nothing here looks at disk or volume limits.

use super::Capability;

/// Support and disk-count predicates for one RAID level.
#[derive(Debug, Clone, Copy)]
pub struct LevelOps {
    pub level: u32,
    pub is_supported: fn(&Capability) -> bool,
    pub is_disk_count_valid: fn(usize) -> bool,
    pub name: &'static str,
}

fn any_count(_: usize) -> bool {
    true
}

fn mirror_count(count: usize) -> bool {
    count == 2
}

fn parity_count(count: usize) -> bool {
    count > 2
}

fn striped_mirror_count(count: usize) -> bool {
    count >= 4 && count % 2 == 0
}

/// Levels IMSM metadata can describe, in display order.
pub const LEVEL_OPS: [LevelOps; 4] = [
    LevelOps {
        level: 0,
        is_supported: Capability::has_raid0,
        is_disk_count_valid: any_count,
        name: "raid0",
    },
    LevelOps {
        level: 1,
        is_supported: Capability::has_raid1,
        is_disk_count_valid: mirror_count,
        name: "raid1",
    },
    LevelOps {
        level: 5,
        is_supported: Capability::has_raid5,
        is_disk_count_valid: parity_count,
        name: "raid5",
    },
    LevelOps {
        level: 10,
        is_supported: Capability::has_raid10,
        is_disk_count_valid: striped_mirror_count,
        name: "raid10",
    },
];

/// Table row for `level`.
pub fn level_ops(level: u32) -> Option<&'static LevelOps> {
    LEVEL_OPS.iter().find(|ops| ops.level == level)
}

/// Whether `capability` licenses RAID `level`. Unknown levels are unsupported.
pub fn is_level_supported(capability: &Capability, level: u32) -> bool {
    level_ops(level)
        .map(|ops| (ops.is_supported)(capability))
        .unwrap_or(false)
}

/// Whether `count` member disks form a valid RAID `level` volume.
pub fn is_disk_count_valid(level: u32, count: usize) -> bool {
    level_ops(level)
        .map(|ops| (ops.is_disk_count_valid)(count))
        .unwrap_or(false)
}

/// Display name of `level`, e.g. `raid10`.
pub fn level_name(level: u32) -> Option<&'static str> {
    level_ops(level).map(|ops| ops.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capability, RaidLevels, OROM_SIGNATURE};

    #[test]
    fn test_disk_counts() {
        assert!(!is_disk_count_valid(10, 5));
        assert!(is_disk_count_valid(10, 4));
        assert!(is_disk_count_valid(10, 6));
        assert!(!is_disk_count_valid(10, 2));
        assert!(is_disk_count_valid(1, 2));
        assert!(!is_disk_count_valid(1, 3));
        assert!(!is_disk_count_valid(5, 2));
        assert!(is_disk_count_valid(5, 3));
        for n in 1..32 {
            assert!(is_disk_count_valid(0, n));
        }
    }

    #[test]
    fn test_unknown_level() {
        assert!(!is_disk_count_valid(6, 4));
        assert!(!is_level_supported(&Capability::nvme_compat(), 6));
        assert_eq!(level_name(6), None);
    }

    #[test]
    fn test_level_support_follows_bits() {
        let cap = Capability {
            raid_levels: RaidLevels::RAID0 | RaidLevels::RAID10,
            ..Capability::empty(OROM_SIGNATURE)
        };
        assert!(is_level_supported(&cap, 0));
        assert!(!is_level_supported(&cap, 1));
        assert!(!is_level_supported(&cap, 5));
        assert!(is_level_supported(&cap, 10));
    }

    #[test]
    fn test_level_names() {
        assert_eq!(level_name(0), Some("raid0"));
        assert_eq!(level_name(10), Some("raid10"));
        let levels: Vec<u32> = LEVEL_OPS.iter().map(|ops| ops.level).collect();
        assert_eq!(levels, vec![0, 1, 5, 10]);
    }
}
