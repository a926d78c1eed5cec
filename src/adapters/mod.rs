//! Infrastructure Adapters
//!
//! Implementations of the domain ports, following the Port/Adapter
//! (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │            FirmwareSource │ EventPublisher                  │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ SysfsFirmware │ SyntheticFirmware                          │ │
//! │  │ LoggingEventPublisher │ InMemoryEventCollector             │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use imsm_platform::adapters::SysfsFirmware;
//! use imsm_platform::domain::FirmwareSource;
//! use imsm_platform::platform::PlatformConfig;
//!
//! let firmware = SysfsFirmware::new(&PlatformConfig::default());
//! let scu = firmware.read_efi_variable("RstScuV");
//! ```

mod event_publisher;
mod synthetic;
mod sysfs_firmware;

pub use event_publisher::{InMemoryEventCollector, LoggingEventPublisher};
pub use synthetic::{ProbeCalls, SyntheticFirmware};
pub use sysfs_firmware::SysfsFirmware;
