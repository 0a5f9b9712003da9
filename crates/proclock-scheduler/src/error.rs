//! Error types for the scheduler

use crate::scope::{ScopeKey, ScopeKind};
use proclock_primitives::{LockType, ProcId, TableName};
use thiserror::Error;

/// Scheduler errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Wake for a lock the procedure neither holds nor waits for
    #[error("procedure {proc_id} holds no {lock_type} lock on {scope} and is not waiting for it")]
    InvalidRelease {
        /// Procedure being woken
        proc_id: ProcId,
        /// Scope named by the wake call
        scope: ScopeKey,
        /// Lock type the wake call releases
        lock_type: LockType,
    },

    /// Wake for a table/region lock whose implicit enclosing lock is not held
    #[error("procedure {proc_id} holds its lock but not the implicit shared lock on {scope}")]
    ImplicitLockMissing {
        /// Procedure being woken
        proc_id: ProcId,
        /// Enclosing scope that should be shared-locked
        scope: ScopeKey,
    },

    /// Granted waiter's own hold refuses one of its enclosing locks
    #[error("procedure {proc_id} was granted {scope} but {parent} is unavailable")]
    HierarchyViolation {
        /// Procedure whose grant was rolled back
        proc_id: ProcId,
        /// Scope whose grant was rolled back
        scope: ScopeKey,
        /// Enclosing scope that refused the shared lock
        parent: ScopeKey,
    },

    /// Procedure is already suspended on a queue
    #[error("procedure {proc_id} is already waiting on {scope}")]
    AlreadyWaiting {
        /// Suspended procedure
        proc_id: ProcId,
        /// Scope it waits on
        scope: ScopeKey,
    },

    /// Request conflicts with a lock the same procedure already holds
    #[error("procedure {proc_id} already holds a conflicting lock on {scope}")]
    SelfConflict {
        /// Requesting procedure
        proc_id: ProcId,
        /// Scope locked twice
        scope: ScopeKey,
    },

    /// Lock type not available on this scope kind
    #[error("{lock_type} locks are not supported on {kind} scopes")]
    UnsupportedLockType {
        /// Requested lock type
        lock_type: LockType,
        /// Scope kind of the target
        kind: ScopeKind,
    },

    /// Region request without regions
    #[error("region lock on table {0} names no regions")]
    EmptyRegions(TableName),

    /// Target that cannot be expanded into a request
    #[error("invalid lock target: {0}")]
    InvalidTarget(String),

    /// Region belongs to another table
    #[error("region of table {found} passed for table {expected}")]
    RegionTableMismatch {
        /// Table named by the request
        expected: TableName,
        /// Table of the offending region
        found: TableName,
    },

    /// Empty or malformed namespace name
    #[error("invalid namespace: {0:?}")]
    InvalidNamespace(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Report sink failed
    #[error("failed to write lock report: {0}")]
    Report(#[from] std::io::Error),
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchedulerError::InvalidRelease {
            proc_id: ProcId::new(42),
            scope: ScopeKey::Namespace("ns1".to_string()),
            lock_type: LockType::Exclusive,
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("NAMESPACE(ns1)"));
        assert!(msg.contains("EXCLUSIVE"));

        let err = SchedulerError::UnsupportedLockType {
            lock_type: LockType::Shared,
            kind: ScopeKind::Region,
        };
        assert_eq!(err.to_string(), "SHARED locks are not supported on REGION scopes");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: SchedulerError = io.into();
        assert!(matches!(err, SchedulerError::Report(_)));
    }
}
