//! Lock type (exclusive or shared)

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Lock type parsing error
#[derive(Debug, Error)]
#[error("unknown lock type: {0}")]
pub struct LockTypeError(pub String);

/// Kind of lock a procedure asks for
///
/// An exclusive lock conflicts with every other lock on the same scope.
/// Shared locks are compatible with each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LockType {
    /// Single holder, no concurrent shared holders
    Exclusive,
    /// Any number of holders
    Shared,
}

impl LockType {
    /// Upper-case name used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            LockType::Exclusive => "EXCLUSIVE",
            LockType::Shared => "SHARED",
        }
    }

    /// Whether a lock of this type may coexist with a held lock of `other`
    pub fn is_compatible_with(&self, other: LockType) -> bool {
        matches!((self, other), (LockType::Shared, LockType::Shared))
    }
}

impl fmt::Display for LockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LockType {
    type Err = LockTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("exclusive") {
            Ok(LockType::Exclusive)
        } else if s.eq_ignore_ascii_case("shared") {
            Ok(LockType::Shared)
        } else {
            Err(LockTypeError(s.to_string()))
        }
    }
}
