//! The live forest: a root-owning object tree addressed by UUID

use crate::node::TreeNode;
use canopy_core::{
    CanopyError, NodeKind, NodePlacement, ObjectId, ObjectTree, Result, TreeObserver, Value,
};
use std::collections::HashSet;
use tracing::warn;

/// A forest of [`TreeNode`]s implementing the [`ObjectTree`] contract
///
/// Lookup walks the descendant tree; mutation goes through the
/// allowed-child table and keeps each child list partition-ordered.
/// Observers receive structural events plus the batching brackets the
/// coordinator opens around a commit or rollback, together with the
/// replaying flag, so an event relay can tell its own echo from a foreign
/// mutation.
#[derive(Default)]
pub struct Project {
    roots: Vec<TreeNode>,
    observers: Vec<Box<dyn TreeObserver>>,
    bracket_depth: usize,
    replaying: bool,
}

impl Project {
    /// Create an empty forest
    pub fn new() -> Self {
        Self::default()
    }

    /// The root nodes, in partition order
    pub fn roots(&self) -> &[TreeNode] {
        &self.roots
    }

    /// Register an observer for structural events
    pub fn add_observer(&mut self, observer: Box<dyn TreeObserver>) {
        self.observers.push(observer);
    }

    /// UUIDs of every node in the forest
    pub fn all_ids(&self) -> Vec<ObjectId> {
        let mut ids = Vec::new();
        for root in &self.roots {
            root.subtree_ids(&mut ids);
        }
        ids
    }

    /// The parent node of `uuid`, or None if `uuid` is a root or unknown
    fn find_parent_node(&self, uuid: ObjectId) -> Option<&TreeNode> {
        fn walk(node: &TreeNode, uuid: ObjectId) -> Option<&TreeNode> {
            if node.child_position(uuid).is_some() {
                return Some(node);
            }
            node.children().iter().find_map(|c| walk(c, uuid))
        }
        self.roots.iter().find_map(|r| walk(r, uuid))
    }

    /// Absolute insertion point among roots for the nth root of `kind`
    fn root_insertion_point(&self, kind: NodeKind, index: usize) -> (usize, usize) {
        let count = self.roots.iter().filter(|r| r.kind() == kind).count();
        let index = index.min(count);
        let mut seen = 0;
        for (absolute, root) in self.roots.iter().enumerate() {
            if root.kind() == kind {
                if seen == index {
                    return (absolute, index);
                }
                seen += 1;
            }
        }
        (self.roots.len(), index)
    }

    /// First node outside `subtree` holding a Reference into it
    fn find_dependent(&self, subtree: &HashSet<ObjectId>) -> Option<ObjectId> {
        fn walk(node: &TreeNode, subtree: &HashSet<ObjectId>) -> Option<ObjectId> {
            if !subtree.contains(&node.uuid()) {
                for (_, value) in node.properties() {
                    if let Value::Reference(target) = value {
                        if subtree.contains(target) {
                            return Some(node.uuid());
                        }
                    }
                }
            }
            node.children().iter().find_map(|c| walk(c, subtree))
        }
        self.roots.iter().find_map(|r| walk(r, subtree))
    }

    fn notify_added(&mut self, parent: Option<ObjectId>, child: ObjectId, index: usize) {
        for observer in &mut self.observers {
            observer.child_added(parent, child, index);
        }
    }

    fn notify_removed(&mut self, parent: Option<ObjectId>, child: ObjectId, index: usize) {
        for observer in &mut self.observers {
            observer.child_removed(parent, child, index);
        }
    }
}

impl ObjectTree for Project {
    type Node = TreeNode;

    fn find_by_uuid(&self, uuid: ObjectId) -> Option<&TreeNode> {
        self.roots.iter().find_map(|r| r.find(uuid))
    }

    fn find_by_uuid_mut(&mut self, uuid: ObjectId) -> Option<&mut TreeNode> {
        self.roots.iter_mut().find_map(|r| r.find_mut(uuid))
    }

    fn contains(&self, uuid: ObjectId) -> bool {
        self.find_by_uuid(uuid).is_some()
    }

    fn placement(&self, uuid: ObjectId) -> Option<NodePlacement> {
        if let Some(position) = self.roots.iter().position(|r| r.uuid() == uuid) {
            let kind = self.roots[position].kind();
            let partition_index = self.roots[..position]
                .iter()
                .filter(|r| r.kind() == kind)
                .count();
            return Some(NodePlacement {
                kind,
                parent: None,
                position,
                partition_index,
            });
        }
        let parent = self.find_parent_node(uuid)?;
        let position = parent.child_position(uuid)?;
        let kind = parent.children()[position].kind();
        Some(NodePlacement {
            kind,
            parent: Some(parent.uuid()),
            position,
            partition_index: position - parent.child_position_offset(kind),
        })
    }

    fn children_count(&self, parent: Option<ObjectId>, kind: NodeKind) -> usize {
        match parent {
            None => self.roots.iter().filter(|r| r.kind() == kind).count(),
            Some(uuid) => self
                .find_by_uuid(uuid)
                .map(|n| n.children_count(kind))
                .unwrap_or(0),
        }
    }

    fn attach(&mut self, parent: Option<ObjectId>, mut node: TreeNode, index: usize) -> Result<()> {
        let child = node.uuid();
        let child_kind = node.kind();
        let used = match parent {
            Some(pid) => {
                let parent_node = self
                    .find_by_uuid_mut(pid)
                    .ok_or(CanopyError::UnknownObject { uuid: pid })?;
                if !parent_node.kind().accepts_child(child_kind) {
                    return Err(CanopyError::InvalidChildKind {
                        parent_kind: parent_node.kind(),
                        child_kind,
                    });
                }
                parent_node.insert_child(node, index)
            }
            None => {
                let (absolute, used) = self.root_insertion_point(child_kind, index);
                node.set_parent(None);
                self.roots.insert(absolute, node);
                used
            }
        };
        self.notify_added(parent, child, used);
        Ok(())
    }

    fn detach(&mut self, parent: Option<ObjectId>, uuid: ObjectId) -> Result<TreeNode> {
        let target = match parent {
            Some(pid) => self
                .find_by_uuid(pid)
                .and_then(|p| p.find(uuid))
                .filter(|n| n.parent() == Some(pid)),
            None => self.roots.iter().find(|r| r.uuid() == uuid),
        };
        let target = target.ok_or(CanopyError::UnknownObject { uuid })?;

        let mut subtree = Vec::new();
        target.subtree_ids(&mut subtree);
        let subtree: HashSet<ObjectId> = subtree.into_iter().collect();
        if let Some(dependent) = self.find_dependent(&subtree) {
            return Err(CanopyError::HasDependents { uuid, dependent });
        }

        let (node, index) = match parent {
            Some(pid) => {
                let parent_node = self
                    .find_by_uuid_mut(pid)
                    .ok_or(CanopyError::UnknownObject { uuid: pid })?;
                parent_node
                    .remove_child(uuid)
                    .ok_or(CanopyError::UnknownObject { uuid })?
            }
            None => {
                let placement = self
                    .placement(uuid)
                    .ok_or(CanopyError::UnknownObject { uuid })?;
                let absolute = placement.position;
                (self.roots.remove(absolute), placement.partition_index)
            }
        };
        self.notify_removed(parent, uuid, index);
        Ok(node)
    }

    fn begin(&mut self, label: &str) {
        self.bracket_depth += 1;
        if self.bracket_depth == 1 {
            let replaying = self.replaying;
            let label = label.to_string();
            for observer in &mut self.observers {
                observer.batch_started(&label, replaying);
            }
        }
    }

    fn commit(&mut self) {
        if self.bracket_depth == 0 {
            warn!("tree commit without a matching begin");
            return;
        }
        self.bracket_depth -= 1;
        if self.bracket_depth == 0 {
            for observer in &mut self.observers {
                observer.batch_ended();
            }
        }
    }

    fn set_replaying(&mut self, replaying: bool) {
        self.replaying = replaying;
    }

    fn is_replaying(&self) -> bool {
        self.replaying
    }
}
