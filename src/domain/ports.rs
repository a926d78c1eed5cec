//! Domain Ports (Port/Adapter Pattern)
//!
//! The orchestrator never touches the filesystem or physical memory itself;
//! it asks a [`FirmwareSource`] and reports what happened to an
//! [`EventPublisher`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Platform (orchestrator)                  │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │         FirmwareSource │ EventPublisher              │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Adapters (Impls)                       │
//! │  SysfsFirmware │ SyntheticFirmware                           │
//! │  LoggingEventPublisher │ InMemoryEventCollector              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::events::DiscoveryEvent;
use crate::capability::Capability;
use crate::firmware::{OromMatch, VmdRegister};
use crate::hardware::Controller;

// =============================================================================
// Value Objects
// =============================================================================

/// Where a resolved capability descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilitySource {
    /// Already registered during this run
    Registry,
    /// Built-in NVMe compatibility descriptor
    NvmeBuiltIn,
    /// EFI runtime variable
    EfiVariable,
    /// ACPI UEFI table
    AcpiTable,
    /// VMD bridge configuration register
    VmdRegister,
    /// Legacy option ROM image
    OptionRom,
}

impl std::fmt::Display for CapabilitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilitySource::Registry => write!(f, "registry"),
            CapabilitySource::NvmeBuiltIn => write!(f, "nvme built-in"),
            CapabilitySource::EfiVariable => write!(f, "efi variable"),
            CapabilitySource::AcpiTable => write!(f, "acpi table"),
            CapabilitySource::VmdRegister => write!(f, "vmd register"),
            CapabilitySource::OptionRom => write!(f, "option rom"),
        }
    }
}

// =============================================================================
// Firmware Port
// =============================================================================

/// Port for reading capability descriptors out of platform firmware.
///
/// Every method reports absence as `None` or an empty list; a source never
/// fails resolution as a whole.
pub trait FirmwareSource: Send + Sync {
    /// Descriptor stored in the vendor EFI variable `name`.
    fn read_efi_variable(&self, name: &str) -> Option<Capability>;

    /// Descriptor published in an ACPI UEFI table under any of `names`.
    fn read_acpi_capability(&self, names: &[&str]) -> Option<Capability>;

    /// Capability register of the VMD bridge that owns `bus`.
    fn read_vmd_register(&self, bus: &Path) -> Option<VmdRegister>;

    /// Scan option ROMs on behalf of `controller`.
    ///
    /// ROMs whose device id satisfies `is_known` are not inspected.
    fn scan_option_roms(
        &self,
        controller: &Controller,
        is_known: &dyn Fn(u16) -> bool,
    ) -> Vec<OromMatch>;
}

// =============================================================================
// Event Port
// =============================================================================

/// Port for publishing discovery events.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: DiscoveryEvent);
}
