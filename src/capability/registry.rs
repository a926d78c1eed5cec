//! Capability Registry
//!
//! Descriptors discovered during one run, each shared by every device id
//! known to use it. Entry count is bounded by the distinct controller
//! models on one host, so lookups scan linearly.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::Capability;
use crate::hardware::ControllerKind;

/// Handle to a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

/// One descriptor and the device ids that share it.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    capability: Arc<Capability>,
    device_ids: BTreeSet<u16>,
    kind: Option<ControllerKind>,
}

impl RegistryEntry {
    pub fn capability(&self) -> &Arc<Capability> {
        &self.capability
    }

    pub fn device_ids(&self) -> &BTreeSet<u16> {
        &self.device_ids
    }

    /// Controller role the entry was created for, if known.
    pub fn kind(&self) -> Option<ControllerKind> {
        self.kind
    }

    pub fn contains(&self, dev_id: u16) -> bool {
        self.device_ids.contains(&dev_id)
    }
}

/// Deduplicated collection of capability descriptors.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    entries: Vec<RegistryEntry>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Descriptor shared by `dev_id`, if any.
    pub fn lookup(&self, dev_id: u16) -> Option<Arc<Capability>> {
        self.entries
            .iter()
            .find(|entry| entry.contains(dev_id))
            .map(|entry| Arc::clone(&entry.capability))
    }

    /// Entry holding `dev_id`, if any.
    pub fn entry_for(&self, dev_id: u16) -> Option<EntryId> {
        self.entries
            .iter()
            .position(|entry| entry.contains(dev_id))
            .map(EntryId)
    }

    /// Register a descriptor.
    ///
    /// An identical descriptor already registered for the same role is
    /// reused, so the returned handle may point at an existing entry.
    pub fn insert(&mut self, capability: Capability, kind: Option<ControllerKind>) -> EntryId {
        if let Some(pos) = self
            .entries
            .iter()
            .position(|entry| entry.kind == kind && *entry.capability == capability)
        {
            return EntryId(pos);
        }

        debug!(
            signature = %capability.signature,
            kind = ?kind,
            "Registering capability descriptor"
        );
        self.entries.push(RegistryEntry {
            capability: Arc::new(capability),
            device_ids: BTreeSet::new(),
            kind,
        });
        EntryId(self.entries.len() - 1)
    }

    /// Associate `dev_id` with an entry. Returns `false` if it already was.
    pub fn add_device_id(&mut self, id: EntryId, dev_id: u16) -> bool {
        match self.entries.get_mut(id.0) {
            Some(entry) => entry.device_ids.insert(dev_id),
            None => false,
        }
    }

    pub fn entry(&self, id: EntryId) -> Option<&RegistryEntry> {
        self.entries.get(id.0)
    }

    /// Descriptor of an entry.
    pub fn capability(&self, id: EntryId) -> Option<Arc<Capability>> {
        self.entry(id).map(|entry| Arc::clone(&entry.capability))
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }
}
