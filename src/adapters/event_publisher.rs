//! Event Publisher Adapters
//!
//! `LoggingEventPublisher` turns discovery events into structured tracing
//! records; `InMemoryEventCollector` keeps them for assertions.

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::domain::events::DiscoveryEvent;
use crate::domain::ports::{CapabilitySource, EventPublisher};

/// Publishes discovery events to the tracing system.
#[derive(Debug, Clone, Copy)]
pub struct LoggingEventPublisher {
    /// Log at info instead of debug
    verbose: bool,
}

impl LoggingEventPublisher {
    /// Publisher for the reporting binary, where resolutions are user-visible.
    pub fn info_level() -> Self {
        Self { verbose: true }
    }

    pub fn debug_level() -> Self {
        Self { verbose: false }
    }
}

macro_rules! emit {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+)
        } else {
            debug!($($arg)+)
        }
    };
}

impl EventPublisher for LoggingEventPublisher {
    fn publish(&self, event: DiscoveryEvent) {
        match &event {
            DiscoveryEvent::ControllersEnumerated { count, .. } => {
                emit!(self.verbose, count, "Controllers enumerated")
            }
            DiscoveryEvent::CapabilityResolved {
                dev_id,
                kind,
                source,
                signature,
                ..
            } => emit!(
                self.verbose,
                dev_id = format_args!("{:04x}", dev_id),
                %kind,
                %source,
                signature = %signature,
                "Capability resolved"
            ),
            DiscoveryEvent::CapabilityMissing { dev_id, kind, .. } => emit!(
                self.verbose,
                dev_id = format_args!("{:04x}", dev_id),
                %kind,
                "No capability source"
            ),
            DiscoveryEvent::OptionRomMatched { device_ids, .. } => emit!(
                self.verbose,
                ?device_ids,
                "Option ROM matched"
            ),
        }
    }
}

/// Collects events in memory, for tests and embedding callers.
#[derive(Debug, Default)]
pub struct InMemoryEventCollector {
    events: RwLock<Vec<DiscoveryEvent>>,
}

impl InMemoryEventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiscoveryEvent> {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Events whose serde tag equals `event_type`.
    pub fn events_of_type(&self, event_type: &str) -> Vec<DiscoveryEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    /// Sources of every resolution, in order.
    pub fn sources(&self) -> Vec<CapabilitySource> {
        self.events.read().iter().filter_map(|e| e.source()).collect()
    }
}

impl EventPublisher for InMemoryEventCollector {
    fn publish(&self, event: DiscoveryEvent) {
        self.events.write().push(event);
    }
}
