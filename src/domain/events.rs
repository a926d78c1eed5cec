//! Discovery Events
//!
//! Immutable records of what capability resolution did. They give a trace
//! of which firmware source answered for each controller, which the
//! reporting binary logs and the tests assert on.
//!
//! # Example
//!
//! ```ignore
//! let event = DiscoveryEvent::capability_resolved(&controller, CapabilitySource::EfiVariable);
//! publisher.publish(event);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ports::CapabilitySource;
use crate::hardware::{Controller, ControllerKind};

/// Significant occurrence during discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DiscoveryEvent {
    // =========================================================================
    // Enumeration Events
    // =========================================================================
    /// The controller list was rebuilt from sysfs.
    ControllersEnumerated {
        count: usize,
        timestamp: DateTime<Utc>,
    },

    // =========================================================================
    // Resolution Events
    // =========================================================================
    /// A controller's descriptor was resolved.
    CapabilityResolved {
        dev_id: u16,
        kind: ControllerKind,
        source: CapabilitySource,
        signature: String,
        timestamp: DateTime<Utc>,
    },

    /// No source could describe a controller.
    CapabilityMissing {
        dev_id: u16,
        kind: ControllerKind,
        timestamp: DateTime<Utc>,
    },

    /// An option ROM declared support for these device ids.
    OptionRomMatched {
        device_ids: Vec<u16>,
        timestamp: DateTime<Utc>,
    },
}

impl DiscoveryEvent {
    pub fn controllers_enumerated(count: usize) -> Self {
        DiscoveryEvent::ControllersEnumerated {
            count,
            timestamp: Utc::now(),
        }
    }

    pub fn capability_resolved(
        controller: &Controller,
        source: CapabilitySource,
        signature: String,
    ) -> Self {
        DiscoveryEvent::CapabilityResolved {
            dev_id: controller.dev_id,
            kind: controller.kind,
            source,
            signature,
            timestamp: Utc::now(),
        }
    }

    pub fn capability_missing(controller: &Controller) -> Self {
        DiscoveryEvent::CapabilityMissing {
            dev_id: controller.dev_id,
            kind: controller.kind,
            timestamp: Utc::now(),
        }
    }

    pub fn option_rom_matched(device_ids: Vec<u16>) -> Self {
        DiscoveryEvent::OptionRomMatched {
            device_ids,
            timestamp: Utc::now(),
        }
    }

    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            DiscoveryEvent::ControllersEnumerated { .. } => "ControllersEnumerated",
            DiscoveryEvent::CapabilityResolved { .. } => "CapabilityResolved",
            DiscoveryEvent::CapabilityMissing { .. } => "CapabilityMissing",
            DiscoveryEvent::OptionRomMatched { .. } => "OptionRomMatched",
        }
    }

    /// Source that answered, for resolution events.
    pub fn source(&self) -> Option<CapabilitySource> {
        match self {
            DiscoveryEvent::CapabilityResolved { source, .. } => Some(*source),
            _ => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DiscoveryEvent::ControllersEnumerated { timestamp, .. }
            | DiscoveryEvent::CapabilityResolved { timestamp, .. }
            | DiscoveryEvent::CapabilityMissing { timestamp, .. }
            | DiscoveryEvent::OptionRomMatched { timestamp, .. } => *timestamp,
        }
    }
}
