//! Domain Layer
//!
//! Abstractions the capability orchestrator depends on.
//!
//! - **Ports** (`ports.rs`) - traits for firmware access and event publishing
//! - **Events** (`events.rs`) - discovery events for tracing resolution

pub mod events;
pub mod ports;

pub use events::DiscoveryEvent;
pub use ports::{CapabilitySource, EventPublisher, FirmwareSource};
