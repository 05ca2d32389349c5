//! Core types and traits for Canopy
//!
//! This crate defines the foundational types used throughout the system:
//! - ObjectId: UUID identity for tree nodes
//! - NodeKind: closed enumeration of node kinds with the allowed-child table
//! - DataType / Value: property value model
//! - CanopyError: error type hierarchy
//! - Traits: collaborator contracts (ObjectTree, PropertyAccess)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;
pub mod value;

// Re-export commonly used types and traits
pub use error::{CanopyError, Result};
pub use traits::{NodePlacement, ObjectTree, PropertyAccess, TreeObserver};
pub use types::{DataType, NodeKind, ObjectId};
pub use value::Value;
