//! Replay of saved rollback logs
//!
//! An external undo system captures the rollback logs of a committed batch
//! and hands them back here to revert that batch later. The replay runs
//! through a privileged coordinator so no conflict checking or thread
//! binding gets in the way, and it is best-effort like any rollback:
//! entries that no longer apply are logged and skipped.

use crate::buffer::{PersistedObjectEntry, PersistedPropertiesEntry, RemovedObjectEntry};
use crate::persister::SessionPersister;
use canopy_core::{ObjectTree, PropertyAccess};
use parking_lot::Mutex;
use std::sync::Arc;

/// Revert a previously committed batch from its captured rollback logs
///
/// `creations` are detached, `properties` restored, `removals` reinserted
/// at their recorded indices, in the rollback pipeline's usual order
/// (properties, then creations, then removals, each most-recent-first).
pub fn replay_undo<T, A>(
    tree: Arc<Mutex<T>>,
    accessor: A,
    creations: Vec<PersistedObjectEntry>,
    properties: Vec<PersistedPropertiesEntry>,
    removals: Vec<RemovedObjectEntry<T::Node>>,
) where
    T: ObjectTree,
    A: PropertyAccess<Node = T::Node>,
{
    let persister = SessionPersister::new("undo", tree, accessor);
    persister.set_privileged(true);
    persister.seed_rollback_logs(creations, properties, removals);
    persister.rollback_force();
}
