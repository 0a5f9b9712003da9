//! Common error types for primitives

use crate::lock_type::LockTypeError;
use crate::server_name::ServerNameError;
use crate::table_name::TableNameError;
use thiserror::Error;

/// Primitive parsing error
#[derive(Debug, Error)]
pub enum PrimitiveError {
    /// Server name error
    #[error("server name error: {0}")]
    ServerName(#[from] ServerNameError),

    /// Table name error
    #[error("table name error: {0}")]
    TableName(#[from] TableNameError),

    /// Lock type error
    #[error("lock type error: {0}")]
    LockType(#[from] LockTypeError),
}
