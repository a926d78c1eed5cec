//! IMSM Platform - Hardware/Firmware RAID Capability Discovery
//!
//! Discovers Intel storage controllers (SATA, SAS, NVMe and VMD bridges) and
//! resolves the RAID capabilities their platform firmware advertises, for
//! deciding whether a controller or disk can take part in Intel Matrix
//! Storage Manager (IMSM) software RAID.
//!
//! # Architecture
//!
//! ```text
//! Enumerator (sysfs) → Platform (Registry + Firmware probes) → Predicate table
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Firmware source and event publisher implementations
//! - [`capability`] - Capability descriptor, registry and RAID-level table
//! - [`domain`] - Ports and discovery events
//! - [`error`] - Error types
//! - [`firmware`] - EFI, ACPI, option ROM and VMD register probes
//! - [`hardware`] - Controller enumeration and VMD topology
//! - [`platform`] - Capability resolution with memoisation
//! - [`sysfs`] - Attribute readers
//!
//! # Example
//!
//! ```no_run
//! use imsm_platform::{Platform, PlatformConfig};
//!
//! let platform = Platform::new(PlatformConfig::default())?;
//! for controller in platform.find_controllers() {
//!     if let Some(cap) = platform.find_capability(&controller) {
//!         println!("{} {}: raid5={}", controller.kind, controller.pci_id, cap.has_raid5());
//!     }
//! }
//! # Ok::<(), imsm_platform::Error>(())
//! ```

pub mod adapters;
pub mod capability;
pub mod domain;
pub mod error;
pub mod firmware;
pub mod hardware;
pub mod platform;
pub mod sysfs;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types
pub use capability::{is_disk_count_valid, is_level_supported, Capability};
pub use error::{Error, Result};
pub use hardware::{Controller, ControllerKind, Enumerator};
pub use platform::{Platform, PlatformConfig, PlatformReport};
