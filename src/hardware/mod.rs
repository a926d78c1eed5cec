//! Hardware Discovery Module
//!
//! Enumeration of Intel storage controllers from Linux sysfs: SATA (AHCI),
//! SAS (isci), NVMe and VMD root-complex bridges, including the SATA and
//! NVMe controllers a VMD bridge hides behind its synthesized PCI domain.
//!
//! # Example
//!
//! ```no_run
//! use imsm_platform::hardware::Enumerator;
//!
//! let enumerator = Enumerator::new("/sys", 0x8086);
//! for controller in enumerator.find_all() {
//!     println!("{} {:04x} {}",
//!         controller.kind,
//!         controller.dev_id,
//!         controller.path.display()
//!     );
//! }
//! ```

pub mod discovery;

pub use discovery::{
    enumerator::Enumerator,
    vmd::{bus_to_controller, resolve_bus},
    Controller, ControllerKind, INTEL_VENDOR_ID,
};
