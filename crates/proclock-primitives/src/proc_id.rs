//! Procedure identifier

use std::fmt;

/// Unique identifier of a procedure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ProcId(pub u64);

impl ProcId {
    /// Create a new procedure ID
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ProcId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proc_id() {
        let id1 = ProcId::new(1);
        let id2 = ProcId::from(2u64);

        assert_eq!(id1.as_u64(), 1);
        assert_eq!(id2.to_string(), "2");
        assert!(id1 < id2);
    }
}
