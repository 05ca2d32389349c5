//! Mutation buffers and rollback records for one open transaction

use canopy_core::{DataType, NodeKind, ObjectId, Value};
use serde::{Deserialize, Serialize};

/// A buffered object creation
///
/// Recorded by `persist_object` and consumed by the commit pipeline, which
/// flips `materialized` once the node has been built and attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedObject {
    /// Parent UUID, or None for a root
    pub parent: Option<ObjectId>,
    /// Kind of the node to create
    pub kind: NodeKind,
    /// UUID the node will carry
    pub uuid: ObjectId,
    /// Declared partition-relative index under the parent
    pub index: usize,
    /// Whether the commit pipeline has already built this node
    pub materialized: bool,
}

/// A buffered property write
///
/// Multiple entries may exist for one (uuid, name) pair; the last one
/// buffered is authoritative at commit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedProperty {
    /// UUID of the object being written
    pub uuid: ObjectId,
    /// Property name
    pub name: String,
    /// Declared type of the new value
    pub data_type: DataType,
    /// Value the write expects to displace, when known
    pub old_value: Option<Value>,
    /// Value to apply at commit
    pub new_value: Value,
    /// Whether the write skipped conflict checking
    pub unconditional: bool,
}

/// Rollback record for a committed removal
///
/// Owns the detached node (subtree included) so rollback can reinsert it at
/// the exact prior partition-relative index.
#[derive(Debug)]
pub struct RemovedObjectEntry<N> {
    /// Parent the node was detached from, or None for a root
    pub parent: Option<ObjectId>,
    /// UUID of the removed node
    pub uuid: ObjectId,
    /// Partition-relative index the node occupied before removal
    pub index: usize,
    /// The detached node itself
    pub node: N,
}

/// Rollback record for a committed creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedObjectEntry {
    /// Parent the node was attached under, or None for a root
    pub parent: Option<ObjectId>,
    /// UUID of the created node
    pub child: ObjectId,
}

/// Rollback record for a committed property write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedPropertiesEntry {
    /// UUID of the object written
    pub uuid: ObjectId,
    /// Property name
    pub name: String,
    /// Declared type of the property
    pub data_type: DataType,
    /// Value the write displaced; restored on rollback
    pub rollback_value: Value,
}

/// The three mutation buffers of one open transaction
///
/// Creations and removals keep insertion order; properties form an
/// insertion-ordered multimap keyed by UUID. All three are empty before
/// `begin` and after a completed commit or rollback.
#[derive(Debug, Default)]
pub struct MutationBuffers {
    creations: Vec<PersistedObject>,
    properties: Vec<PersistedProperty>,
    removals: Vec<(ObjectId, ObjectId)>,
}

impl MutationBuffers {
    /// Create empty buffers
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pending creation
    pub fn record_creation(&mut self, pwo: PersistedObject) {
        self.creations.push(pwo);
    }

    /// The buffered creation for `uuid`, if any
    pub fn creation(&self, uuid: ObjectId) -> Option<&PersistedObject> {
        self.creations.iter().find(|p| p.uuid == uuid)
    }

    /// All buffered creations, in insertion order
    pub fn creations(&self) -> &[PersistedObject] {
        &self.creations
    }

    /// Flip the materialized flag on the creation for `uuid`
    pub fn mark_materialized(&mut self, uuid: ObjectId) {
        if let Some(pwo) = self.creations.iter_mut().find(|p| p.uuid == uuid) {
            pwo.materialized = true;
        }
    }

    /// Record a pending property write
    pub fn record_property(&mut self, wop: PersistedProperty) {
        self.properties.push(wop);
    }

    /// The authoritative (last-buffered) new value for (uuid, name)
    pub fn last_buffered_value(&self, uuid: ObjectId, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .rev()
            .find(|p| p.uuid == uuid && p.name == name)
            .map(|p| &p.new_value)
    }

    /// Drain the buffered properties for `uuid` into constructor pairs
    ///
    /// Each property name appears once with its last-buffered value.
    /// Entries for other UUIDs keep their order.
    pub fn take_properties_for(&mut self, uuid: ObjectId) -> Vec<(String, Value)> {
        let mut taken: Vec<(String, Value)> = Vec::new();
        let mut remaining = Vec::new();
        for wop in std::mem::take(&mut self.properties) {
            if wop.uuid == uuid {
                if let Some(entry) = taken.iter_mut().find(|(name, _)| *name == wop.name) {
                    entry.1 = wop.new_value;
                } else {
                    taken.push((wop.name, wop.new_value));
                }
            } else {
                remaining.push(wop);
            }
        }
        self.properties = remaining;
        taken
    }

    /// Drain all buffered properties, collapsed to one authoritative entry
    /// per (uuid, name) pair
    ///
    /// Each surviving entry keeps the position of the first write to its
    /// pair and the value of the last.
    pub fn take_last_writes(&mut self) -> Vec<PersistedProperty> {
        let mut result: Vec<PersistedProperty> = Vec::new();
        for wop in std::mem::take(&mut self.properties) {
            if let Some(entry) = result
                .iter_mut()
                .find(|p| p.uuid == wop.uuid && p.name == wop.name)
            {
                *entry = wop;
            } else {
                result.push(wop);
            }
        }
        result
    }

    /// Record a pending removal; a repeated UUID replaces the parent
    pub fn record_removal(&mut self, uuid: ObjectId, parent: ObjectId) {
        if let Some(entry) = self.removals.iter_mut().find(|(u, _)| *u == uuid) {
            entry.1 = parent;
        } else {
            self.removals.push((uuid, parent));
        }
    }

    /// Check whether a removal is buffered for `uuid`
    pub fn contains_removal(&self, uuid: ObjectId) -> bool {
        self.removals.iter().any(|(u, _)| *u == uuid)
    }

    /// Drain the buffered removals
    pub fn take_removals(&mut self) -> Vec<(ObjectId, ObjectId)> {
        std::mem::take(&mut self.removals)
    }

    /// Number of buffered creations
    pub fn creation_count(&self) -> usize {
        self.creations.len()
    }

    /// Number of buffered property writes
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Number of buffered removals
    pub fn removal_count(&self) -> usize {
        self.removals.len()
    }

    /// Check if all three buffers are empty
    pub fn is_empty(&self) -> bool {
        self.creations.is_empty() && self.properties.is_empty() && self.removals.is_empty()
    }

    /// Clear all three buffers
    pub fn clear(&mut self) {
        self.creations.clear();
        self.properties.clear();
        self.removals.clear();
    }
}
