//! Tree nodes with kind-partitioned child lists

use canopy_core::{NodeKind, ObjectId, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A node in the object tree
///
/// Owns its children recursively; detaching a node carries its whole
/// subtree with it, which is what lets a rollback reinsert a removed branch
/// exactly where it was.
///
/// The child list is kept in partition order: one contiguous run per
/// allowed child kind, runs ordered as [`NodeKind::allowed_children`]
/// declares them. All indices exposed here are relative to the run for the
/// child's kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    uuid: ObjectId,
    kind: NodeKind,
    parent: Option<ObjectId>,
    properties: HashMap<String, Value>,
    children: Vec<TreeNode>,
}

impl TreeNode {
    /// Create a detached node of the given kind
    pub fn new(kind: NodeKind, uuid: ObjectId) -> Self {
        Self {
            uuid,
            kind,
            parent: None,
            properties: HashMap::new(),
            children: Vec::new(),
        }
    }

    /// UUID of this node
    pub fn uuid(&self) -> ObjectId {
        self.uuid
    }

    /// Kind of this node
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Parent UUID, or None for a root or detached node
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ObjectId>) {
        self.parent = parent;
    }

    /// Stored value of a property, if set
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Iterate over the set properties of this node
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Store a property value, returning the displaced one
    ///
    /// A `Null` value clears the property. Type checking against the
    /// accessor table is the registry's job; this is raw storage.
    pub fn put_property(&mut self, name: &str, value: Value) -> Value {
        let previous = if value.is_null() {
            self.properties.remove(name)
        } else {
            self.properties.insert(name.to_string(), value)
        };
        previous.unwrap_or(Value::Null)
    }

    /// Children in partition order
    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    /// Number of children of the given kind
    pub fn children_count(&self, kind: NodeKind) -> usize {
        self.children.iter().filter(|c| c.kind == kind).count()
    }

    /// Offset of the partition for `kind` within the full child list
    pub fn child_position_offset(&self, kind: NodeKind) -> usize {
        let rank = match self.kind.partition_rank(kind) {
            Some(rank) => rank,
            None => return self.children.len(),
        };
        self.kind
            .allowed_children()
            .iter()
            .take(rank)
            .map(|k| self.children_count(*k))
            .sum()
    }

    /// Absolute position of the child with `uuid`, if present
    pub fn child_position(&self, uuid: ObjectId) -> Option<usize> {
        self.children.iter().position(|c| c.uuid == uuid)
    }

    /// Insert `node` at a partition-relative index, clamped to the run
    ///
    /// Returns the partition-relative index actually used. The caller is
    /// responsible for the allowed-child check; the partition layout is
    /// preserved unconditionally here.
    pub(crate) fn insert_child(&mut self, mut node: TreeNode, index: usize) -> usize {
        let index = index.min(self.children_count(node.kind));
        let absolute = self.child_position_offset(node.kind) + index;
        node.parent = Some(self.uuid);
        self.children.insert(absolute, node);
        index
    }

    /// Remove the child with `uuid`, returning it together with its
    /// partition-relative index
    pub(crate) fn remove_child(&mut self, uuid: ObjectId) -> Option<(TreeNode, usize)> {
        let absolute = self.child_position(uuid)?;
        let mut node = self.children.remove(absolute);
        node.parent = None;
        let offset = self.child_position_offset(node.kind);
        Some((node, absolute - offset))
    }

    /// Find a node in this subtree (including self) by UUID
    pub fn find(&self, uuid: ObjectId) -> Option<&TreeNode> {
        if self.uuid == uuid {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(uuid))
    }

    /// Find a node in this subtree (including self) by UUID, mutably
    pub fn find_mut(&mut self, uuid: ObjectId) -> Option<&mut TreeNode> {
        if self.uuid == uuid {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(uuid))
    }

    /// Collect the UUIDs of this node and every descendant
    pub fn subtree_ids(&self, into: &mut Vec<ObjectId>) {
        into.push(self.uuid);
        for child in &self.children {
            child.subtree_ids(into);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_children() -> (TreeNode, ObjectId, ObjectId, ObjectId) {
        let mut table = TreeNode::new(NodeKind::Table, ObjectId::new());
        let c1 = ObjectId::new();
        let c2 = ObjectId::new();
        let ix = ObjectId::new();
        table.insert_child(TreeNode::new(NodeKind::Column, c1), 0);
        table.insert_child(TreeNode::new(NodeKind::Column, c2), 1);
        table.insert_child(TreeNode::new(NodeKind::Index, ix), 0);
        (table, c1, c2, ix)
    }

    #[test]
    fn test_partition_layout() {
        let (table, c1, c2, ix) = table_with_children();
        let order: Vec<ObjectId> = table.children().iter().map(|c| c.uuid()).collect();
        // Columns first, then indexes, regardless of insertion interleaving.
        assert_eq!(order, vec![c1, c2, ix]);
        assert_eq!(table.child_position_offset(NodeKind::Column), 0);
        assert_eq!(table.child_position_offset(NodeKind::Index), 2);
    }

    #[test]
    fn test_insert_index_is_partition_relative() {
        let (mut table, c1, _, ix) = table_with_children();
        let c0 = ObjectId::new();
        table.insert_child(TreeNode::new(NodeKind::Column, c0), 0);
        assert_eq!(table.child_position(c0), Some(0));
        assert_eq!(table.child_position(c1), Some(1));
        // Index partition shifted but stayed last.
        assert_eq!(table.child_position(ix), Some(3));
    }

    #[test]
    fn test_insert_clamps_to_partition() {
        let (mut table, ..) = table_with_children();
        let c = ObjectId::new();
        let used = table.insert_child(TreeNode::new(NodeKind::Column, c), 99);
        assert_eq!(used, 2);
        assert_eq!(table.child_position(c), Some(2));
    }

    #[test]
    fn test_remove_child_reports_partition_index() {
        let (mut table, _, c2, ix) = table_with_children();
        let (node, index) = table.remove_child(c2).unwrap();
        assert_eq!(node.uuid(), c2);
        assert_eq!(index, 1);
        // The index child is in partition 1; its partition index is 0.
        let (_, index) = table.remove_child(ix).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn test_find_walks_subtree() {
        let (table, _, c2, _) = table_with_children();
        assert_eq!(table.find(c2).unwrap().uuid(), c2);
        assert!(table.find(ObjectId::new()).is_none());
    }

    #[test]
    fn test_put_property_roundtrip() {
        let mut node = TreeNode::new(NodeKind::Column, ObjectId::new());
        assert_eq!(node.put_property("name", Value::from("id")), Value::Null);
        assert_eq!(
            node.put_property("name", Value::from("key")),
            Value::from("id")
        );
        // Null clears.
        assert_eq!(node.put_property("name", Value::Null), Value::from("key"));
        assert!(node.property("name").is_none());
    }

    #[test]
    fn test_subtree_ids() {
        let (table, c1, c2, ix) = table_with_children();
        let mut ids = Vec::new();
        table.subtree_ids(&mut ids);
        assert_eq!(ids.len(), 4);
        assert!(ids.contains(&c1) && ids.contains(&c2) && ids.contains(&ix));
    }
}
