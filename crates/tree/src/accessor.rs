//! Per-kind property accessor tables

use crate::node::TreeNode;
use canopy_core::{CanopyError, DataType, NodeKind, ObjectId, PropertyAccess, Result, Value};
use std::collections::HashMap;

/// One entry in a kind's accessor table
#[derive(Debug, Clone, Copy)]
struct PropertyDef {
    name: &'static str,
    data_type: DataType,
}

const fn def(name: &'static str, data_type: DataType) -> PropertyDef {
    PropertyDef { name, data_type }
}

const WORKSPACE_PROPS: &[PropertyDef] = &[
    def("name", DataType::String),
    def("remarks", DataType::String),
];

const DATABASE_PROPS: &[PropertyDef] = &[
    def("name", DataType::String),
    def("dialect", DataType::String),
    def("remarks", DataType::String),
];

const TABLE_PROPS: &[PropertyDef] = &[
    def("name", DataType::String),
    def("physical_name", DataType::String),
    def("remarks", DataType::String),
];

const COLUMN_PROPS: &[PropertyDef] = &[
    def("name", DataType::String),
    def("sql_type", DataType::Int),
    def("nullable", DataType::Bool),
    def("default_value", DataType::String),
    def("remarks", DataType::String),
];

const INDEX_PROPS: &[PropertyDef] = &[
    def("name", DataType::String),
    def("unique", DataType::Bool),
    def("column", DataType::Reference),
    def("remarks", DataType::String),
];

/// Registry resolving (kind, property-name) pairs to typed accessors
///
/// Built once at startup and injected wherever property access is needed;
/// there is no global instance. Each kind owns a fixed table of property
/// definitions, so dispatch is a table lookup rather than any runtime
/// inspection of the node.
pub struct AccessorRegistry {
    tables: HashMap<NodeKind, &'static [PropertyDef]>,
}

impl AccessorRegistry {
    /// Build the standard registry covering every [`NodeKind`]
    pub fn standard() -> Self {
        let mut tables: HashMap<NodeKind, &'static [PropertyDef]> = HashMap::new();
        tables.insert(NodeKind::Workspace, WORKSPACE_PROPS);
        tables.insert(NodeKind::Database, DATABASE_PROPS);
        tables.insert(NodeKind::Table, TABLE_PROPS);
        tables.insert(NodeKind::Column, COLUMN_PROPS);
        tables.insert(NodeKind::Index, INDEX_PROPS);
        Self { tables }
    }

    /// Property names defined for a kind
    pub fn property_names(&self, kind: NodeKind) -> Vec<&'static str> {
        self.tables
            .get(&kind)
            .map(|defs| defs.iter().map(|d| d.name).collect())
            .unwrap_or_default()
    }

    fn lookup(&self, kind: NodeKind, name: &str) -> Result<PropertyDef> {
        self.tables
            .get(&kind)
            .and_then(|defs| defs.iter().find(|d| d.name == name))
            .copied()
            .ok_or_else(|| CanopyError::UnknownProperty {
                kind,
                property: name.to_string(),
            })
    }
}

impl PropertyAccess for AccessorRegistry {
    type Node = TreeNode;

    fn read_property(&self, node: &TreeNode, name: &str) -> Result<Value> {
        self.lookup(node.kind(), name)?;
        Ok(node.property(name).cloned().unwrap_or(Value::Null))
    }

    fn write_property(&self, node: &mut TreeNode, name: &str, value: Value) -> Result<Value> {
        let def = self.lookup(node.kind(), name)?;
        if !value.is_null() && value.data_type() != def.data_type {
            return Err(CanopyError::TypeMismatch {
                property: name.to_string(),
                expected: def.data_type,
                actual: value.data_type(),
            });
        }
        Ok(node.put_property(name, value))
    }

    fn instantiate(
        &self,
        kind: NodeKind,
        uuid: ObjectId,
        ctor_props: &[(String, Value)],
    ) -> Result<TreeNode> {
        let mut node = TreeNode::new(kind, uuid);
        for (name, value) in ctor_props {
            self.write_property(&mut node, name, value.clone())?;
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_unset_property_is_null() {
        let registry = AccessorRegistry::standard();
        let node = TreeNode::new(NodeKind::Table, ObjectId::new());
        assert_eq!(registry.read_property(&node, "remarks").unwrap(), Value::Null);
    }

    #[test]
    fn test_write_then_read() {
        let registry = AccessorRegistry::standard();
        let mut node = TreeNode::new(NodeKind::Column, ObjectId::new());
        let displaced = registry
            .write_property(&mut node, "nullable", Value::Bool(true))
            .unwrap();
        assert_eq!(displaced, Value::Null);
        assert_eq!(
            registry.read_property(&node, "nullable").unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_unknown_property_rejected() {
        let registry = AccessorRegistry::standard();
        let node = TreeNode::new(NodeKind::Workspace, ObjectId::new());
        let err = registry.read_property(&node, "dialect").unwrap_err();
        assert!(matches!(err, CanopyError::UnknownProperty { .. }));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let registry = AccessorRegistry::standard();
        let mut node = TreeNode::new(NodeKind::Column, ObjectId::new());
        let err = registry
            .write_property(&mut node, "nullable", Value::Int(1))
            .unwrap_err();
        assert!(matches!(err, CanopyError::TypeMismatch { .. }));
    }

    #[test]
    fn test_instantiate_applies_ctor_props() {
        let registry = AccessorRegistry::standard();
        let uuid = ObjectId::new();
        let node = registry
            .instantiate(
                NodeKind::Table,
                uuid,
                &[
                    ("name".to_string(), Value::from("orders")),
                    ("remarks".to_string(), Value::from("fact table")),
                ],
            )
            .unwrap();
        assert_eq!(node.uuid(), uuid);
        assert_eq!(node.property("name"), Some(&Value::from("orders")));
        assert_eq!(node.property("remarks"), Some(&Value::from("fact table")));
    }

    #[test]
    fn test_instantiate_rejects_bad_ctor_prop() {
        let registry = AccessorRegistry::standard();
        let err = registry
            .instantiate(
                NodeKind::Index,
                ObjectId::new(),
                &[("sql_type".to_string(), Value::Int(4))],
            )
            .unwrap_err();
        assert!(matches!(err, CanopyError::UnknownProperty { .. }));
    }
}
