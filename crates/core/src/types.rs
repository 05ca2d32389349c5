//! Core types for the Canopy object model
//!
//! This module defines the foundational types:
//! - ObjectId: UUID identity for every node in the tree
//! - NodeKind: closed enumeration of node kinds plus the allowed-child table
//! - DataType: type discriminator for property values

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a node in the object tree
///
/// An ObjectId is a wrapper around a UUID v4. Every node carries one, and all
/// coordinator operations address nodes through it rather than through
/// references into the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    /// Create a new random ObjectId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an ObjectId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parse an ObjectId from a string representation
    ///
    /// Accepts standard UUID format. Returns None if the string is not a
    /// valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the raw bytes of this ObjectId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed enumeration of node kinds in the object tree
///
/// The kind decides which children a node may hold and how its child list is
/// partitioned. Structural mutation is checked against the allowed-child
/// table before anything is attached, so an invalid parent/child pairing is
/// rejected up front rather than discovered later by traversal code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Top-level container; the usual root of a forest
    Workspace,
    /// A database inside a workspace
    Database,
    /// A table inside a database
    Table,
    /// A column inside a table
    Column,
    /// An index inside a table; may reference sibling columns
    Index,
}

impl NodeKind {
    /// All kinds, in declaration order
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Workspace,
        NodeKind::Database,
        NodeKind::Table,
        NodeKind::Column,
        NodeKind::Index,
    ];

    /// The kinds this kind may hold as children, in partition order
    ///
    /// A node's child list is laid out as one contiguous run per allowed
    /// kind, in exactly this order. Child indices in the coordinator API are
    /// relative to the run for that kind.
    pub fn allowed_children(&self) -> &'static [NodeKind] {
        match self {
            NodeKind::Workspace => &[NodeKind::Database],
            NodeKind::Database => &[NodeKind::Table],
            NodeKind::Table => &[NodeKind::Column, NodeKind::Index],
            NodeKind::Column => &[],
            NodeKind::Index => &[],
        }
    }

    /// Check whether `child` is an allowed child kind of this kind
    pub fn accepts_child(&self, child: NodeKind) -> bool {
        self.allowed_children().contains(&child)
    }

    /// Position of `child` in this kind's partition layout
    ///
    /// Returns None if `child` is not an allowed child kind.
    pub fn partition_rank(&self, child: NodeKind) -> Option<usize> {
        self.allowed_children().iter().position(|k| *k == child)
    }

    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Workspace => "Workspace",
            NodeKind::Database => "Database",
            NodeKind::Table => "Table",
            NodeKind::Column => "Column",
            NodeKind::Index => "Index",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type discriminator for property values
///
/// Carried alongside every buffered property write so a replayed operation
/// stream can be validated without inspecting the value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Absent value
    Null,
    /// Boolean
    Bool,
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Float,
    /// UTF-8 string
    String,
    /// UUID-valued reference to another node
    Reference,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Null => "Null",
            DataType::Bool => "Bool",
            DataType::Int => "Int",
            DataType::Float => "Float",
            DataType::String => "String",
            DataType::Reference => "Reference",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_uniqueness() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_object_id_roundtrip_string() {
        let id = ObjectId::new();
        let parsed = ObjectId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_object_id_from_invalid_string() {
        assert!(ObjectId::from_string("not-a-uuid").is_none());
    }

    #[test]
    fn test_allowed_children_table() {
        assert!(NodeKind::Workspace.accepts_child(NodeKind::Database));
        assert!(NodeKind::Table.accepts_child(NodeKind::Column));
        assert!(NodeKind::Table.accepts_child(NodeKind::Index));
        assert!(!NodeKind::Workspace.accepts_child(NodeKind::Column));
        assert!(!NodeKind::Column.accepts_child(NodeKind::Column));
    }

    #[test]
    fn test_partition_rank_follows_declaration_order() {
        assert_eq!(NodeKind::Table.partition_rank(NodeKind::Column), Some(0));
        assert_eq!(NodeKind::Table.partition_rank(NodeKind::Index), Some(1));
        assert_eq!(NodeKind::Table.partition_rank(NodeKind::Table), None);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(NodeKind::Workspace.to_string(), "Workspace");
        assert_eq!(DataType::Reference.to_string(), "Reference");
    }
}
