//! Error types for Canopy
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! Every error raised while a transaction is open triggers an automatic
//! rollback in the coordinator before it propagates; the variants here only
//! describe what went wrong, never whether recovery ran.

use crate::types::{DataType, NodeKind, ObjectId};
use crate::value::Value;
use thiserror::Error;

/// Result type alias for Canopy operations
pub type Result<T> = std::result::Result<T, CanopyError>;

/// Error types for the persistence coordinator and its collaborators
#[derive(Debug, Error)]
pub enum CanopyError {
    /// A buffering or commit call was issued outside an open transaction
    #[error("operation attempted while not in a transaction")]
    NotInTransaction,

    /// An object with this UUID already exists in the buffer+tree union
    #[error("object {uuid} already exists")]
    AlreadyExists {
        /// UUID of the conflicting object
        uuid: ObjectId,
    },

    /// No object with this UUID in the buffer+tree union
    #[error("object {uuid} could not be found")]
    UnknownObject {
        /// UUID that failed to resolve
        uuid: ObjectId,
    },

    /// A conditional property write did not match the current value
    #[error(
        "conflict on property \"{property}\" of {uuid}: expected {expected:?}, found {actual:?}"
    )]
    PropertyConflict {
        /// UUID of the object being written
        uuid: ObjectId,
        /// Property name
        property: String,
        /// Value the caller expected to overwrite
        expected: Value,
        /// Value actually found (buffered or live)
        actual: Value,
    },

    /// A mutating call arrived from a thread other than the one that
    /// opened the transaction
    #[error("mutating call from a second thread; the open transaction was rolled back")]
    ThreadAffinityViolation,

    /// A failure surfaced while flushing buffers through the commit
    /// pipeline; the transaction was rolled back
    #[error("commit failed: {source}")]
    CommitFailure {
        /// The underlying failure
        #[source]
        source: Box<CanopyError>,
    },

    /// Attach rejected by the allowed-child table
    #[error("{child_kind} is not an allowed child of {parent_kind}")]
    InvalidChildKind {
        /// Kind of the would-be parent
        parent_kind: NodeKind,
        /// Kind of the rejected child
        child_kind: NodeKind,
    },

    /// Detach rejected because another node still references the target
    /// or one of its descendants
    #[error("object {uuid} cannot be removed: {dependent} depends on it")]
    HasDependents {
        /// UUID of the object being removed
        uuid: ObjectId,
        /// UUID of the node holding the reference
        dependent: ObjectId,
    },

    /// Property name not present in the accessor table for this kind
    #[error("unknown property \"{property}\" on {kind}")]
    UnknownProperty {
        /// Kind whose table was consulted
        kind: NodeKind,
        /// The unknown property name
        property: String,
    },

    /// Property write with a value of the wrong type
    #[error("property \"{property}\" expects {expected}, got {actual}")]
    TypeMismatch {
        /// Property name
        property: String,
        /// Declared type of the property
        expected: DataType,
        /// Type of the rejected value
        actual: DataType,
    },
}

impl CanopyError {
    /// Wrap a lower-level failure surfaced during the commit pipeline
    pub fn commit_failure(source: CanopyError) -> Self {
        CanopyError::CommitFailure {
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_in_transaction() {
        let msg = CanopyError::NotInTransaction.to_string();
        assert!(msg.contains("not in a transaction"));
    }

    #[test]
    fn test_error_display_already_exists() {
        let uuid = ObjectId::new();
        let msg = CanopyError::AlreadyExists { uuid }.to_string();
        assert!(msg.contains(&uuid.to_string()));
    }

    #[test]
    fn test_error_display_property_conflict() {
        let err = CanopyError::PropertyConflict {
            uuid: ObjectId::new(),
            property: "name".to_string(),
            expected: Value::from("old"),
            actual: Value::from("other"),
        };
        let msg = err.to_string();
        assert!(msg.contains("name"));
        assert!(msg.contains("old"));
        assert!(msg.contains("other"));
    }

    #[test]
    fn test_commit_failure_wraps_source() {
        let uuid = ObjectId::new();
        let err = CanopyError::commit_failure(CanopyError::UnknownObject { uuid });
        assert!(err.to_string().contains("commit failed"));
        match err {
            CanopyError::CommitFailure { source } => {
                assert!(matches!(*source, CanopyError::UnknownObject { .. }));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_error_display_type_mismatch() {
        let err = CanopyError::TypeMismatch {
            property: "nullable".to_string(),
            expected: DataType::Bool,
            actual: DataType::Int,
        };
        let msg = err.to_string();
        assert!(msg.contains("nullable"));
        assert!(msg.contains("Bool"));
        assert!(msg.contains("Int"));
    }
}
