//! Firmware Capability Probes
//!
//! Four ways of getting a capability descriptor out of the platform, from
//! most to least preferred:
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐
//! │  EFI variables   │──▶│ ACPI UEFI tables │   (same variable names)
//! └──────────────────┘   └──────────────────┘
//!           │ none
//!           ▼
//! ┌──────────────────┐
//! │ VMD config reg.  │   (VMD bridges only)
//! └──────────────────┘
//!           │ none
//!           ▼
//! ┌──────────────────┐
//! │ Option ROM scan  │   (legacy boot only)
//! └──────────────────┘
//! ```
//!
//! The probes only read; none of them caches. Memoisation lives in
//! [`crate::platform::Platform`].

pub mod acpi;
pub mod efi;
pub mod orom;
pub mod vmd_register;

pub use acpi::AcpiTables;
pub use efi::{EfiVariables, SATA_VARIABLES, SCU_VARIABLE, VENDOR_GUID, VMD_VARIABLES};
pub use orom::{scan_option_roms, DevMemRoms, OptionRom, OromMatch, RomSource};
pub use vmd_register::{read_vmd_register, VmdRegister};
