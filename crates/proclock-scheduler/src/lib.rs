//! # proclock-scheduler
//!
//! Hierarchical lock scheduler for administrative procedures.
//!
//! Procedures lock four nested scopes: server, namespace, table and region.
//! Locking a nested scope implicitly takes shared locks on the enclosing
//! ones, and conflicting requests queue in FIFO order until a release
//! grants them.
//!
//! Features:
//! - Exclusive/shared locks per scope with ordered waiter queues
//! - Implicit namespace/table locks for table and region requests
//! - Run queue and blocking waits for granted procedures
//! - Point-in-time lock reports (text and JSON)

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod entry;
mod error;
mod procedure;
mod registry;
mod report;
mod scheduler;
mod scope;

pub use config::SchedulerConfig;
pub use entry::{LockEntry, Waiter};
pub use error::{SchedulerError, SchedulerResult};
pub use procedure::Procedure;
pub use registry::Registry;
pub use report::{LockHolder, LockInfo, LockReport, WaitingProcedure};
pub use scheduler::{LockStatus, Scheduler};
pub use scope::{LockRequest, LockTarget, ScopeKey, ScopeKind};

pub use proclock_primitives::{LockType, ProcId, RegionInfo, ServerName, TableName};
