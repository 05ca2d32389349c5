//! The transaction coordinator
//!
//! [`SessionPersister`] buffers create/update/delete operations while a
//! transaction is open and flushes them through the commit pipeline on the
//! outermost commit, in the fixed phase order removals → creations →
//! properties. Rollback replays the per-phase inverse logs in reverse
//! phase order, best-effort.
//!
//! The coordinator is a single-writer actor: the first call on an open
//! transaction binds it to the calling thread, and a call from any other
//! thread rolls the transaction back and raises a protocol error rather
//! than interleaving.

use crate::buffer::{
    MutationBuffers, PersistedObject, PersistedObjectEntry, PersistedPropertiesEntry,
    PersistedProperty, RemovedObjectEntry,
};
use crate::ordering;
use canopy_core::{CanopyError, DataType, NodeKind, ObjectId, ObjectTree, PropertyAccess, Result, Value};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, error};

/// What the coordinator is doing right now
///
/// `RollingBack` doubles as the re-entrancy guard: a rollback entered
/// while one is already running observes a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersisterPhase {
    /// Buffering or idle between transactions
    Idle,
    /// Flushing buffers through the commit pipeline
    Committing,
    /// Replaying the rollback logs
    RollingBack,
}

/// Buffered state of the coordinator, behind the session lock
struct Inner<T: ObjectTree, A> {
    accessor: A,
    txn_count: u32,
    bound_thread: Option<ThreadId>,
    privileged: bool,
    phase: PersisterPhase,
    buffers: MutationBuffers,
    removal_log: Vec<RemovedObjectEntry<T::Node>>,
    creation_log: Vec<PersistedObjectEntry>,
    property_log: Vec<PersistedPropertiesEntry>,
}

/// Check a UUID against the buffer+tree union
///
/// A UUID buffered for removal counts as absent even while its node is
/// still live; a UUID buffered for creation counts as present before its
/// node exists.
fn exists<T: ObjectTree>(buffers: &MutationBuffers, tree: &T, uuid: ObjectId) -> bool {
    !buffers.contains_removal(uuid) && (buffers.creation(uuid).is_some() || tree.contains(uuid))
}

/// Transactional persistence coordinator over a shared object tree
///
/// All mutating calls must come from the thread that opened the
/// transaction. `begin`/`commit` nest; only the outermost commit flushes.
/// Any error raised while a transaction is open triggers an automatic
/// rollback before it propagates, so a caller never observes a half-open
/// coordinator or a half-committed tree.
pub struct SessionPersister<T, A>
where
    T: ObjectTree,
    A: PropertyAccess<Node = T::Node>,
{
    name: String,
    tree: Arc<Mutex<T>>,
    inner: Mutex<Inner<T, A>>,
}

impl<T, A> SessionPersister<T, A>
where
    T: ObjectTree,
    A: PropertyAccess<Node = T::Node>,
{
    /// Create a coordinator over the given tree
    ///
    /// The accessor is injected here and used for every property read,
    /// write, and node construction.
    pub fn new(name: impl Into<String>, tree: Arc<Mutex<T>>, accessor: A) -> Self {
        Self {
            name: name.into(),
            tree,
            inner: Mutex::new(Inner {
                accessor,
                txn_count: 0,
                bound_thread: None,
                privileged: false,
                phase: PersisterPhase::Idle,
                buffers: MutationBuffers::new(),
                removal_log: Vec::new(),
                creation_log: Vec::new(),
                property_log: Vec::new(),
            }),
        }
    }

    /// Name of this coordinator, for logs
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a transaction is currently open
    pub fn is_in_transaction(&self) -> bool {
        self.inner.lock().txn_count > 0
    }

    /// Current phase of the coordinator
    pub fn phase(&self) -> PersisterPhase {
        self.inner.lock().phase
    }

    /// Switch privileged (replay) mode on or off
    ///
    /// While set, every property write is treated as unconditional, so a
    /// replayed operation stream is never blocked by conflict checking.
    pub fn set_privileged(&self, privileged: bool) {
        self.inner.lock().privileged = privileged;
    }

    /// Whether privileged mode is set
    pub fn is_privileged(&self) -> bool {
        self.inner.lock().privileged
    }

    /// Open a transaction, or nest one deeper
    pub fn begin(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.enforce_thread_affinity(&mut inner)?;
        inner.txn_count += 1;
        debug!(persister = %self.name, txn_count = inner.txn_count, "transaction begin");
        Ok(())
    }

    /// Close one nesting level; flush the buffers when the outermost
    /// level closes
    ///
    /// # Errors
    /// - `NotInTransaction` if no transaction is open
    /// - `CommitFailure` wrapping whatever the pipeline raised; the
    ///   transaction has been rolled back when this returns
    pub fn commit(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.enforce_thread_affinity(&mut inner)?;
        debug!(persister = %self.name, txn_count = inner.txn_count, "transaction commit");

        if inner.txn_count == 0 {
            return Err(CanopyError::NotInTransaction);
        }
        if inner.txn_count > 1 {
            inner.txn_count -= 1;
            return Ok(());
        }

        debug!(
            persister = %self.name,
            creations = inner.buffers.creation_count(),
            properties = inner.buffers.property_count(),
            removals = inner.buffers.removal_count(),
            "beginning commit phase"
        );
        inner.phase = PersisterPhase::Committing;
        inner.removal_log.clear();
        inner.creation_log.clear();
        inner.property_log.clear();

        let result = {
            let mut tree = self.tree.lock();
            tree.set_replaying(true);
            tree.begin("Committing persisted operations");
            let result = inner.run_commit_pipeline(&mut tree);
            tree.commit();
            tree.set_replaying(false);
            result
        };

        match result {
            Ok(()) => {
                inner.buffers.clear();
                inner.removal_log.clear();
                inner.creation_log.clear();
                inner.property_log.clear();
                inner.txn_count = 0;
                inner.bound_thread = None;
                inner.phase = PersisterPhase::Idle;
                debug!(persister = %self.name, "commit succeeded");
                Ok(())
            }
            Err(source) => {
                error!(persister = %self.name, error = %source, "commit failed, rolling back");
                self.rollback_locked(&mut inner);
                Err(CanopyError::commit_failure(source))
            }
        }
    }

    /// Roll back the open transaction, discarding all buffered work
    ///
    /// Resets nesting to zero regardless of depth. A rollback entered
    /// while one is already running is a no-op.
    ///
    /// # Errors
    /// Returns `ThreadAffinityViolation` when called from a thread other
    /// than the bound one; the transaction has still been rolled back.
    pub fn rollback(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.enforce_thread_affinity(&mut inner)?;
        self.rollback_locked(&mut inner);
        Ok(())
    }

    /// Roll back without the thread-affinity check
    ///
    /// Used when the coordinator must recover no matter which thread
    /// noticed the failure.
    pub fn rollback_force(&self) {
        let mut inner = self.inner.lock();
        self.rollback_locked(&mut inner);
    }

    /// Buffer an object creation
    ///
    /// # Errors
    /// - `NotInTransaction` if no transaction is open
    /// - `AlreadyExists` if the UUID resolves in the buffer+tree union
    ///
    /// Either error rolls the open transaction back before propagating.
    pub fn persist_object(
        &self,
        parent: Option<ObjectId>,
        kind: NodeKind,
        uuid: ObjectId,
        index: usize,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        self.enforce_thread_affinity(&mut inner)?;
        debug!(
            persister = %self.name,
            %uuid, %kind, parent = ?parent.map(|p| p.to_string()), index,
            "buffering object creation"
        );
        if inner.txn_count == 0 {
            self.rollback_locked(&mut inner);
            return Err(CanopyError::NotInTransaction);
        }
        let present = {
            let tree = self.tree.lock();
            exists(&inner.buffers, &*tree, uuid)
        };
        if present {
            self.rollback_locked(&mut inner);
            return Err(CanopyError::AlreadyExists { uuid });
        }
        inner.buffers.record_creation(PersistedObject {
            parent,
            kind,
            uuid,
            index,
            materialized: false,
        });
        Ok(())
    }

    /// Buffer a conditional property write
    ///
    /// `old_value` is the value the caller believes it is overwriting; it
    /// is checked against the last buffered write for the same
    /// (uuid, name) pair, or against the live value when nothing is
    /// buffered. In privileged mode the check is skipped.
    ///
    /// # Errors
    /// - `NotInTransaction` if no transaction is open
    /// - `UnknownObject` if the UUID resolves nowhere
    /// - `PropertyConflict` if the expected value does not match
    ///
    /// Any error rolls the open transaction back before propagating.
    pub fn persist_property(
        &self,
        uuid: ObjectId,
        name: &str,
        data_type: DataType,
        old_value: Value,
        new_value: Value,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        self.enforce_thread_affinity(&mut inner)?;
        debug!(
            persister = %self.name,
            %uuid, property = name, %data_type,
            ?old_value, ?new_value,
            "buffering conditional property write"
        );
        if inner.txn_count == 0 {
            self.rollback_locked(&mut inner);
            return Err(CanopyError::NotInTransaction);
        }
        let unconditional = inner.privileged;
        match self.buffer_property(
            &mut inner,
            uuid,
            name,
            data_type,
            Some(old_value),
            new_value,
            unconditional,
        ) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.rollback_locked(&mut inner);
                Err(e)
            }
        }
    }

    /// Buffer an unconditional property write
    ///
    /// # Errors
    /// - `NotInTransaction` if no transaction is open
    /// - `UnknownObject` if the UUID resolves nowhere
    ///
    /// Either error rolls the open transaction back before propagating.
    pub fn persist_property_unconditional(
        &self,
        uuid: ObjectId,
        name: &str,
        data_type: DataType,
        new_value: Value,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        self.enforce_thread_affinity(&mut inner)?;
        debug!(
            persister = %self.name,
            %uuid, property = name, %data_type, ?new_value,
            "buffering unconditional property write"
        );
        if inner.txn_count == 0 {
            self.rollback_locked(&mut inner);
            return Err(CanopyError::NotInTransaction);
        }
        match self.buffer_property(&mut inner, uuid, name, data_type, None, new_value, true) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.rollback_locked(&mut inner);
                Err(e)
            }
        }
    }

    /// Buffer an object removal
    ///
    /// # Errors
    /// - `NotInTransaction` if no transaction is open
    /// - `UnknownObject` if the UUID resolves nowhere in the buffer+tree
    ///   union
    ///
    /// Either error rolls the open transaction back before propagating.
    pub fn remove_object(&self, parent: ObjectId, uuid: ObjectId) -> Result<()> {
        let mut inner = self.inner.lock();
        self.enforce_thread_affinity(&mut inner)?;
        debug!(persister = %self.name, %uuid, %parent, "buffering object removal");
        if inner.txn_count == 0 {
            self.rollback_locked(&mut inner);
            return Err(CanopyError::NotInTransaction);
        }
        let present = {
            let tree = self.tree.lock();
            exists(&inner.buffers, &*tree, uuid)
        };
        if !present {
            self.rollback_locked(&mut inner);
            return Err(CanopyError::UnknownObject { uuid });
        }
        inner.buffers.record_removal(uuid, parent);
        Ok(())
    }

    /// Seed the rollback logs for a saved-operation replay
    pub(crate) fn seed_rollback_logs(
        &self,
        creations: Vec<PersistedObjectEntry>,
        properties: Vec<PersistedPropertiesEntry>,
        removals: Vec<RemovedObjectEntry<T::Node>>,
    ) {
        let mut inner = self.inner.lock();
        inner.creation_log = creations;
        inner.property_log = properties;
        inner.removal_log = removals;
    }

    /// Bind the transaction to the calling thread, or reject the call
    ///
    /// The first call binds; a later call from another thread forces a
    /// rollback of everything buffered and fails.
    fn enforce_thread_affinity(&self, inner: &mut Inner<T, A>) -> Result<()> {
        let current = thread::current().id();
        match inner.bound_thread {
            None => {
                inner.bound_thread = Some(current);
                Ok(())
            }
            Some(bound) if bound == current => Ok(()),
            Some(_) => {
                error!(
                    persister = %self.name,
                    "call from a second thread detected, rolling back"
                );
                self.rollback_locked(inner);
                Err(CanopyError::ThreadAffinityViolation)
            }
        }
    }

    /// Resolve and buffer one property write
    ///
    /// Shared by the conditional and unconditional entry points; the
    /// caller handles rollback on error.
    fn buffer_property(
        &self,
        inner: &mut Inner<T, A>,
        uuid: ObjectId,
        name: &str,
        data_type: DataType,
        expected: Option<Value>,
        new_value: Value,
        unconditional: bool,
    ) -> Result<()> {
        let tree = self.tree.lock();
        if !exists(&inner.buffers, &*tree, uuid) {
            return Err(CanopyError::UnknownObject { uuid });
        }

        let old_value = match inner.buffers.last_buffered_value(uuid, name).cloned() {
            Some(last) => {
                if !unconditional && expected.as_ref() != Some(&last) {
                    return Err(CanopyError::PropertyConflict {
                        uuid,
                        property: name.to_string(),
                        expected: expected.unwrap_or(Value::Null),
                        actual: last,
                    });
                }
                Some(last)
            }
            None => match tree.find_by_uuid(uuid) {
                Some(node) => {
                    let live = inner.accessor.read_property(node, name)?;
                    if !unconditional && expected.as_ref() != Some(&live) {
                        return Err(CanopyError::PropertyConflict {
                            uuid,
                            property: name.to_string(),
                            expected: expected.unwrap_or(Value::Null),
                            actual: live,
                        });
                    }
                    Some(live)
                }
                // Pending creation: nothing live to compare against.
                None => expected,
            },
        };
        drop(tree);

        inner.buffers.record_property(PersistedProperty {
            uuid,
            name: name.to_string(),
            data_type,
            old_value,
            new_value,
            unconditional,
        });
        Ok(())
    }

    /// Replay the rollback logs and discard all buffered state
    fn rollback_locked(&self, inner: &mut Inner<T, A>) {
        if inner.phase == PersisterPhase::RollingBack {
            return;
        }
        inner.phase = PersisterPhase::RollingBack;
        {
            let mut tree = self.tree.lock();
            tree.set_replaying(true);
            tree.begin("Rolling back persisted operations");
            inner.rollback_properties_pass(&mut tree);
            inner.rollback_creations_pass(&mut tree);
            inner.rollback_removals_pass(&mut tree);
            tree.commit();
            tree.set_replaying(false);
        }
        inner.buffers.clear();
        inner.txn_count = 0;
        inner.bound_thread = None;
        inner.phase = PersisterPhase::Idle;
        debug!(persister = %self.name, "rolled back, all open transactions cleared");
    }
}

impl<T, A> fmt::Display for SessionPersister<T, A>
where
    T: ObjectTree,
    A: PropertyAccess<Node = T::Node>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionPersister \"{}\"", self.name)
    }
}

impl<T, A> Inner<T, A>
where
    T: ObjectTree,
    A: PropertyAccess<Node = T::Node>,
{
    /// Run the three commit phases in their fixed order
    fn run_commit_pipeline(&mut self, tree: &mut T) -> Result<()> {
        self.commit_removals(tree)?;
        self.commit_creations(tree)?;
        self.commit_properties(tree)
    }

    /// Commit phase 1: detach buffered removals, deepest first
    fn commit_removals(&mut self, tree: &mut T) -> Result<()> {
        let mut removals = self.buffers.take_removals();
        removals.sort_by(|a, b| ordering::cmp_removals(a.0, b.0, &*tree));
        for (uuid, parent) in removals {
            let placement = tree
                .placement(uuid)
                .ok_or(CanopyError::UnknownObject { uuid })?;
            let node = tree.detach(Some(parent), uuid)?;
            self.removal_log.push(RemovedObjectEntry {
                parent: Some(parent),
                uuid,
                index: placement.partition_index,
                node,
            });
        }
        Ok(())
    }

    /// Commit phase 2: build and attach buffered creations, parents first
    ///
    /// Buffered properties of a created object are consumed here as its
    /// constructor properties. The declared index is clamped to the
    /// current partition size so earlier removals cannot push an attach
    /// out of range.
    fn commit_creations(&mut self, tree: &mut T) -> Result<()> {
        let snapshot = self.buffers.creations().to_vec();
        let mut order: Vec<usize> = (0..snapshot.len()).collect();
        order.sort_by(|&i, &j| ordering::cmp_creations(&snapshot[i], &snapshot[j], &snapshot, &*tree));

        for i in order {
            let pwo = snapshot[i].clone();
            if self
                .buffers
                .creation(pwo.uuid)
                .map_or(true, |p| p.materialized)
            {
                continue;
            }
            let ctor_props = self.buffers.take_properties_for(pwo.uuid);
            let node = self.accessor.instantiate(pwo.kind, pwo.uuid, &ctor_props)?;
            let index = pwo.index.min(tree.children_count(pwo.parent, pwo.kind));
            tree.attach(pwo.parent, node, index)?;
            self.buffers.mark_materialized(pwo.uuid);
            self.creation_log.push(PersistedObjectEntry {
                parent: pwo.parent,
                child: pwo.uuid,
            });
        }
        Ok(())
    }

    /// Commit phase 3: apply the authoritative property writes
    fn commit_properties(&mut self, tree: &mut T) -> Result<()> {
        for wop in self.buffers.take_last_writes() {
            let node = tree
                .find_by_uuid_mut(wop.uuid)
                .ok_or(CanopyError::UnknownObject { uuid: wop.uuid })?;
            let displaced = self
                .accessor
                .write_property(node, &wop.name, wop.new_value.clone())?;
            debug!(uuid = %wop.uuid, property = %wop.name, "applied property");
            self.property_log.push(PersistedPropertiesEntry {
                uuid: wop.uuid,
                name: wop.name,
                data_type: wop.data_type,
                rollback_value: displaced,
            });
        }
        Ok(())
    }

    /// Undo committed property writes, most recent first
    fn rollback_properties_pass(&mut self, tree: &mut T) {
        for entry in std::mem::take(&mut self.property_log).into_iter().rev() {
            let node = match tree.find_by_uuid_mut(entry.uuid) {
                Some(node) => node,
                None => {
                    error!(
                        uuid = %entry.uuid, property = %entry.name,
                        "cannot roll back property write, object is gone"
                    );
                    continue;
                }
            };
            if let Err(e) =
                self.accessor
                    .write_property(node, &entry.name, entry.rollback_value.clone())
            {
                error!(
                    error = %e, uuid = %entry.uuid, property = %entry.name,
                    "cannot roll back property write"
                );
            }
        }
    }

    /// Undo committed creations, most recent first
    fn rollback_creations_pass(&mut self, tree: &mut T) {
        for entry in std::mem::take(&mut self.creation_log).into_iter().rev() {
            if let Err(e) = tree.detach(entry.parent, entry.child) {
                error!(error = %e, uuid = %entry.child, "cannot roll back object creation");
            }
        }
    }

    /// Undo committed removals, most recent first
    fn rollback_removals_pass(&mut self, tree: &mut T) {
        for entry in std::mem::take(&mut self.removal_log).into_iter().rev() {
            if let Err(e) = tree.attach(entry.parent, entry.node, entry.index) {
                error!(error = %e, uuid = %entry.uuid, "cannot roll back object removal");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_tree::{AccessorRegistry, Project};

    fn persister() -> SessionPersister<Project, AccessorRegistry> {
        SessionPersister::new(
            "test",
            Arc::new(Mutex::new(Project::new())),
            AccessorRegistry::standard(),
        )
    }

    #[test]
    fn test_begin_opens_transaction() {
        let persister = persister();
        assert!(!persister.is_in_transaction());
        persister.begin().unwrap();
        assert!(persister.is_in_transaction());
        assert_eq!(persister.phase(), PersisterPhase::Idle);
    }

    #[test]
    fn test_persist_object_outside_transaction() {
        let persister = persister();
        let err = persister
            .persist_object(None, NodeKind::Workspace, ObjectId::new(), 0)
            .unwrap_err();
        assert!(matches!(err, CanopyError::NotInTransaction));
    }

    #[test]
    fn test_commit_outside_transaction() {
        let persister = persister();
        let err = persister.commit().unwrap_err();
        assert!(matches!(err, CanopyError::NotInTransaction));
    }

    #[test]
    fn test_persist_duplicate_uuid_rejected() {
        let persister = persister();
        let uuid = ObjectId::new();
        persister.begin().unwrap();
        persister
            .persist_object(None, NodeKind::Workspace, uuid, 0)
            .unwrap();
        let err = persister
            .persist_object(None, NodeKind::Workspace, uuid, 1)
            .unwrap_err();
        assert!(matches!(err, CanopyError::AlreadyExists { .. }));
        // The failed call rolled the whole transaction back.
        assert!(!persister.is_in_transaction());
    }

    #[test]
    fn test_remove_unknown_object_rejected() {
        let persister = persister();
        persister.begin().unwrap();
        let err = persister
            .remove_object(ObjectId::new(), ObjectId::new())
            .unwrap_err();
        assert!(matches!(err, CanopyError::UnknownObject { .. }));
        assert!(!persister.is_in_transaction());
    }

    #[test]
    fn test_property_on_pending_creation_buffers() {
        let persister = persister();
        let uuid = ObjectId::new();
        persister.begin().unwrap();
        persister
            .persist_object(None, NodeKind::Workspace, uuid, 0)
            .unwrap();
        persister
            .persist_property_unconditional(uuid, "name", DataType::String, Value::from("w"))
            .unwrap();
        assert!(persister.is_in_transaction());
    }

    #[test]
    fn test_rollback_resets_nesting() {
        let persister = persister();
        persister.begin().unwrap();
        persister.begin().unwrap();
        persister.rollback().unwrap();
        assert!(!persister.is_in_transaction());
    }

    #[test]
    fn test_privileged_flag() {
        let persister = persister();
        assert!(!persister.is_privileged());
        persister.set_privileged(true);
        assert!(persister.is_privileged());
    }
}
