//! Reference in-memory object tree for Canopy
//!
//! This crate provides the live forest the persistence coordinator mutates:
//! - TreeNode: a typed node with a kind-partitioned child list
//! - Project: the root-owning forest implementing the `ObjectTree` contract
//! - AccessorRegistry: the per-kind property accessor tables implementing
//!   the `PropertyAccess` contract
//!
//! The coordinator in `canopy-persister` depends only on the contracts in
//! `canopy-core`; this crate is one implementation of them, sufficient for
//! real use and for exercising the coordinator end-to-end.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accessor;
pub mod node;
pub mod tree;

pub use accessor::AccessorRegistry;
pub use node::TreeNode;
pub use tree::Project;
