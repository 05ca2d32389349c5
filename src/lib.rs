//! Canopy - transactional persistence coordinator for object trees
//!
//! Canopy applies batches of buffered create/update/delete operations onto
//! an in-memory, UUID-addressed tree of typed domain objects. A batch is
//! applied atomically on commit, in a structurally valid order (parents
//! before children, siblings in index order), and any mid-commit failure
//! is undone from a best-effort rollback log.
//!
//! # Quick Start
//!
//! ```
//! use canopy::{
//!     AccessorRegistry, DataType, NodeKind, ObjectId, ObjectTree, Project,
//!     SessionPersister, Value,
//! };
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! let tree = Arc::new(Mutex::new(Project::new()));
//! let persister = SessionPersister::new(
//!     "session",
//!     Arc::clone(&tree),
//!     AccessorRegistry::standard(),
//! );
//!
//! let root = ObjectId::new();
//! persister.begin()?;
//! persister.persist_object(None, NodeKind::Workspace, root, 0)?;
//! persister.persist_property_unconditional(
//!     root,
//!     "name",
//!     DataType::String,
//!     Value::from("My Workspace"),
//! )?;
//! persister.commit()?;
//!
//! assert!(tree.lock().contains(root));
//! # Ok::<(), canopy::CanopyError>(())
//! ```
//!
//! # Architecture
//!
//! The coordinator in `canopy-persister` is written against the
//! collaborator contracts in `canopy-core` ([`ObjectTree`],
//! [`PropertyAccess`]); `canopy-tree` provides the reference forest and
//! accessor registry. The coordinator is single-writer: an open
//! transaction is bound to the thread that started it.

pub use canopy_core::{
    CanopyError, DataType, NodeKind, NodePlacement, ObjectId, ObjectTree, PropertyAccess, Result,
    TreeObserver, Value,
};
pub use canopy_persister::{
    replay_undo, PersistedObject, PersistedObjectEntry, PersistedPropertiesEntry,
    PersistedProperty, PersisterPhase, RemovedObjectEntry, SessionPersister,
};
pub use canopy_tree::{AccessorRegistry, Project, TreeNode};
