//! Transactional persistence coordinator for Canopy
//!
//! This crate implements the core subsystem: a single-writer coordinator
//! that buffers create/update/delete operations while a transaction is
//! open and applies them atomically on the outermost commit.
//!
//! - [`buffer`]: the three mutation buffers and the rollback records
//! - [`ordering`]: the creation and removal total orders
//! - [`persister`]: the [`SessionPersister`] coordinator
//! - [`replay`]: reverting a committed batch from saved rollback logs
//!
//! The coordinator is written against the collaborator contracts in
//! `canopy-core`; the reference tree and accessor registry live in
//! `canopy-tree`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod ordering;
pub mod persister;
pub mod replay;

pub use buffer::{
    MutationBuffers, PersistedObject, PersistedObjectEntry, PersistedPropertiesEntry,
    PersistedProperty, RemovedObjectEntry,
};
pub use persister::{PersisterPhase, SessionPersister};
pub use replay::replay_undo;
