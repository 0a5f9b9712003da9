//! # proclock-primitives
//!
//! Identity types shared by the proclock scheduler.
//!
//! Every lock scope is named by one of these types: a [`ServerName`], a
//! namespace string, a [`TableName`] or a [`RegionInfo`] (by its encoded
//! name). Their `Display` forms are the identities printed in lock reports.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod lock_type;
mod proc_id;
mod region;
mod server_name;
mod table_name;

pub use error::PrimitiveError;
pub use lock_type::{LockType, LockTypeError};
pub use proc_id::ProcId;
pub use region::RegionInfo;
pub use server_name::{ServerName, ServerNameError};
pub use table_name::{TableName, TableNameError};

/// Namespace that holds the system tables
pub const SYSTEM_NAMESPACE: &str = "hbase";

/// Namespace assigned to tables created without one
pub const DEFAULT_NAMESPACE: &str = "default";
