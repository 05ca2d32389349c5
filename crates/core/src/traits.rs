//! Collaborator contracts consumed by the persistence coordinator
//!
//! The coordinator never touches a concrete tree or accessor type; it is
//! written against the `ObjectTree` and `PropertyAccess` traits so the
//! reference implementations in `canopy-tree` can be swapped for an
//! application's own object model without changing the coordinator.

use crate::error::Result;
use crate::types::{NodeKind, ObjectId};
use crate::value::Value;

/// Where a live node sits in its tree
///
/// Returned by [`ObjectTree::placement`] and consumed by the ordering
/// comparators, which need both the absolute sibling position (removal
/// order) and the position within the same-kind run (creation order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodePlacement {
    /// Kind of the node
    pub kind: NodeKind,
    /// Parent UUID, or None for a root
    pub parent: Option<ObjectId>,
    /// Absolute position among all siblings (across kind partitions)
    pub position: usize,
    /// Position among siblings of the same kind
    pub partition_index: usize,
}

/// Contract for the live forest of domain nodes
///
/// Child lists are partitioned by kind in the order given by
/// [`NodeKind::allowed_children`]; every index accepted or reported here is
/// relative to the partition for the node's kind, except
/// [`NodePlacement::position`] which is absolute.
///
/// `begin`/`commit` are batching brackets for observers: structural events
/// raised between them belong to one logical mutation. Brackets nest; only
/// the outermost pair is reported. The `replaying` flag is carried on the
/// bracket so observers relaying changes elsewhere can suppress the echo of
/// a coordinator commit.
pub trait ObjectTree {
    /// Concrete node type owned by this tree
    type Node;

    /// Find a node by UUID anywhere in the forest
    fn find_by_uuid(&self, uuid: ObjectId) -> Option<&Self::Node>;

    /// Find a node by UUID, mutably
    fn find_by_uuid_mut(&mut self, uuid: ObjectId) -> Option<&mut Self::Node>;

    /// Check whether a node with this UUID exists
    fn contains(&self, uuid: ObjectId) -> bool;

    /// Placement of a live node, or None if the UUID does not resolve
    fn placement(&self, uuid: ObjectId) -> Option<NodePlacement>;

    /// Number of children of `kind` under `parent` (None counts roots)
    fn children_count(&self, parent: Option<ObjectId>, kind: NodeKind) -> usize;

    /// Attach a node under `parent` at a partition-relative index
    ///
    /// `parent` of None attaches a new root.
    ///
    /// # Errors
    /// - `InvalidChildKind` if the allowed-child table rejects the pairing
    /// - `UnknownObject` if `parent` does not resolve
    fn attach(&mut self, parent: Option<ObjectId>, node: Self::Node, index: usize) -> Result<()>;

    /// Detach the node with `uuid` from under `parent` and return it,
    /// subtree included
    ///
    /// # Errors
    /// - `UnknownObject` if `uuid` does not resolve under `parent`
    /// - `HasDependents` if a node outside the subtree references into it
    fn detach(&mut self, parent: Option<ObjectId>, uuid: ObjectId) -> Result<Self::Node>;

    /// Open a batching bracket for observers
    fn begin(&mut self, label: &str);

    /// Close the current batching bracket
    fn commit(&mut self);

    /// Mark subsequent brackets as replay of persisted operations
    fn set_replaying(&mut self, replaying: bool);

    /// Whether the tree is currently replaying persisted operations
    fn is_replaying(&self) -> bool;
}

/// Contract for per-kind property access
///
/// Resolves (kind, property-name) pairs against a fixed accessor table and
/// performs the actual reads, writes, and construction. The coordinator
/// funnels every property touch through this trait.
pub trait PropertyAccess {
    /// Concrete node type this accessor reads and writes
    type Node;

    /// Read a property value; `Null` if the property is unset
    ///
    /// # Errors
    /// Returns `UnknownProperty` if the name is not in the kind's table.
    fn read_property(&self, node: &Self::Node, name: &str) -> Result<Value>;

    /// Write a property value, returning the value it displaced
    ///
    /// # Errors
    /// - `UnknownProperty` if the name is not in the kind's table
    /// - `TypeMismatch` if the value's type does not match the table
    fn write_property(&self, node: &mut Self::Node, name: &str, value: Value) -> Result<Value>;

    /// Construct a node of `kind` with `uuid`, applying the given
    /// constructor properties
    ///
    /// # Errors
    /// Fails like [`PropertyAccess::write_property`] for each constructor
    /// property.
    fn instantiate(
        &self,
        kind: NodeKind,
        uuid: ObjectId,
        ctor_props: &[(String, Value)],
    ) -> Result<Self::Node>;
}

/// Observer of structural tree events
///
/// Implemented by change-event relays. All indices are partition-relative.
pub trait TreeObserver: Send {
    /// A child was attached under `parent` (None for a new root)
    fn child_added(&mut self, parent: Option<ObjectId>, child: ObjectId, index: usize);

    /// A child was detached from under `parent`
    fn child_removed(&mut self, parent: Option<ObjectId>, child: ObjectId, index: usize);

    /// An outermost batching bracket opened
    ///
    /// `replaying` is true when the bracket covers a coordinator commit or
    /// rollback replaying persisted operations.
    fn batch_started(&mut self, label: &str, replaying: bool);

    /// The outermost batching bracket closed
    fn batch_ended(&mut self);
}
