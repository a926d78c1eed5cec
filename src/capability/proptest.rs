//! Property-Based Tests for Capability Queries
//!
//! # Test Properties
//!
//! 1. **Disk counts**: each level's predicate matches its closed form
//! 2. **Level support**: support follows exactly the `rlc` bits
//! 3. **Registry idempotence**: repeated ids never duplicate within an entry
//! 4. **Chunk table**: `has_chunk` agrees with `chunk_sizes`

#![cfg(test)]

use proptest::prelude::*;

use super::levels::{is_disk_count_valid, is_level_supported};
use super::registry::CapabilityRegistry;
use super::{Capability, RaidLevels, StripSizes, OROM_SIGNATURE};

fn capability_strategy() -> impl Strategy<Value = Capability> {
    (any::<u16>(), any::<u16>()).prop_map(|(rlc, sss)| Capability {
        raid_levels: RaidLevels::from_bits_retain(rlc),
        strip_sizes: StripSizes::from_bits_retain(sss),
        ..Capability::empty(OROM_SIGNATURE)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: disk count predicates follow the per-level rules.
    #[test]
    fn prop_disk_counts(count in 0usize..64) {
        prop_assert!(is_disk_count_valid(0, count));
        prop_assert_eq!(is_disk_count_valid(1, count), count == 2);
        prop_assert_eq!(is_disk_count_valid(5, count), count > 2);
        prop_assert_eq!(is_disk_count_valid(10, count), count >= 4 && count % 2 == 0);
    }

    /// Property: level support reads the matching rlc bit and nothing else.
    #[test]
    fn prop_level_support_matches_bits(cap in capability_strategy()) {
        prop_assert_eq!(is_level_supported(&cap, 0), cap.raid_levels.contains(RaidLevels::RAID0));
        prop_assert_eq!(is_level_supported(&cap, 1), cap.raid_levels.contains(RaidLevels::RAID1));
        prop_assert_eq!(is_level_supported(&cap, 5), cap.raid_levels.contains(RaidLevels::RAID5));
        prop_assert_eq!(is_level_supported(&cap, 10), cap.raid_levels.contains(RaidLevels::RAID10));
    }

    /// Property: a device id added any number of times appears once.
    #[test]
    fn prop_registry_ids_unique(ids in prop::collection::vec(any::<u16>(), 1..50)) {
        let mut registry = CapabilityRegistry::new();
        let entry = registry.insert(Capability::nvme_compat(), None);
        for id in &ids {
            registry.add_device_id(entry, *id);
        }
        for id in &ids {
            registry.add_device_id(entry, *id);
        }

        let mut expected = ids.clone();
        expected.sort_unstable();
        expected.dedup();

        let stored: Vec<u16> = registry
            .entry(entry)
            .unwrap()
            .device_ids()
            .iter()
            .copied()
            .collect();
        prop_assert_eq!(stored, expected);
        for id in &ids {
            prop_assert!(registry.lookup(*id).is_some());
        }
    }

    /// Property: every listed chunk size is accepted and nothing else is.
    #[test]
    fn prop_chunk_table(cap in capability_strategy(), kib in 1u32..(1 << 17)) {
        let listed = cap.chunk_sizes().contains(&kib);
        prop_assert_eq!(cap.has_chunk(kib), listed);
    }
}
