//! Procedures as seen by the lock scheduler

use proclock_primitives::{LockType, ProcId, TableName};

/// A unit of work asking for locks
///
/// The scheduler reads only the id, the lock type and the optional table
/// the procedure works on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Procedure {
    proc_id: ProcId,
    lock_type: LockType,
    table: Option<TableName>,
}

impl Procedure {
    /// Create a procedure with the given id and lock type
    pub fn new(proc_id: impl Into<ProcId>, lock_type: LockType) -> Self {
        Self {
            proc_id: proc_id.into(),
            lock_type,
            table: None,
        }
    }

    /// Procedure asking for exclusive locks
    pub fn exclusive(proc_id: u64) -> Self {
        Self::new(proc_id, LockType::Exclusive)
    }

    /// Procedure asking for shared locks
    pub fn shared(proc_id: u64) -> Self {
        Self::new(proc_id, LockType::Shared)
    }

    /// Associate the procedure with a table
    pub fn with_table(mut self, table: TableName) -> Self {
        self.table = Some(table);
        self
    }

    /// Procedure ID
    pub fn proc_id(&self) -> ProcId {
        self.proc_id
    }

    /// Requested lock type
    pub fn lock_type(&self) -> LockType {
        self.lock_type
    }

    /// Table the procedure works on, if any
    pub fn table(&self) -> Option<&TableName> {
        self.table.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let p = Procedure::exclusive(1);
        assert_eq!(p.proc_id(), ProcId::new(1));
        assert_eq!(p.lock_type(), LockType::Exclusive);
        assert!(p.table().is_none());

        let table = TableName::parse("ns4:table4").unwrap();
        let p = Procedure::shared(2).with_table(table.clone());
        assert_eq!(p.lock_type(), LockType::Shared);
        assert_eq!(p.table(), Some(&table));
    }
}
