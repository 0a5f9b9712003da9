//! Per-scope lock state

use crate::procedure::Procedure;
use crate::scope::LockRequest;
use proclock_primitives::{LockType, ProcId};
use std::collections::VecDeque;
use std::time::Instant;

/// A suspended procedure in a scope's queue
#[derive(Clone, Debug)]
pub struct Waiter {
    pub(crate) proc: Procedure,
    pub(crate) lock_type: LockType,
    pub(crate) request: LockRequest,
    /// Index of this scope in the request's chain
    pub(crate) step: usize,
    pub(crate) since: Instant,
}

impl Waiter {
    /// Suspended procedure
    pub fn procedure(&self) -> &Procedure {
        &self.proc
    }

    /// Lock type it needs on this scope
    pub fn lock_type(&self) -> LockType {
        self.lock_type
    }

    /// Full request the procedure is pursuing
    pub fn request(&self) -> &LockRequest {
        &self.request
    }
}

/// Lock state of one scope instance
///
/// Holds at most one exclusive holder or any number of shared holders,
/// never both. Shared holders form a multiset: a procedure holding two
/// tables of one namespace counts twice on that namespace.
#[derive(Clone, Debug)]
pub struct LockEntry {
    /// Creation order, used to list entries in first-seen order
    seq: u64,
    exclusive: Option<ProcId>,
    shared: Vec<ProcId>,
    waiters: VecDeque<Waiter>,
}

impl LockEntry {
    pub(crate) fn new(seq: u64) -> Self {
        Self {
            seq,
            exclusive: None,
            shared: Vec::new(),
            waiters: VecDeque::new(),
        }
    }

    /// Creation sequence number
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Exclusive holder, if any
    pub fn exclusive_holder(&self) -> Option<ProcId> {
        self.exclusive
    }

    /// Shared holders in grant order
    pub fn shared_holders(&self) -> &[ProcId] {
        &self.shared
    }

    /// Number of shared holds
    pub fn shared_count(&self) -> usize {
        self.shared.len()
    }

    /// Queued procedures in FIFO order
    pub fn waiters(&self) -> impl Iterator<Item = &Waiter> {
        self.waiters.iter()
    }

    /// Number of queued procedures
    pub fn waiter_count(&self) -> usize {
        self.waiters.len()
    }

    /// No holders and no waiters
    pub fn is_empty(&self) -> bool {
        self.exclusive.is_none() && self.shared.is_empty() && self.waiters.is_empty()
    }

    /// Whether the current holders admit a lock of `lock_type`
    pub fn admits(&self, lock_type: LockType) -> bool {
        match lock_type {
            LockType::Exclusive => self.exclusive.is_none() && self.shared.is_empty(),
            LockType::Shared => self.exclusive.is_none(),
        }
    }

    /// Whether `proc_id` holds a lock of `lock_type` here
    pub fn holds(&self, proc_id: ProcId, lock_type: LockType) -> bool {
        match lock_type {
            LockType::Exclusive => self.exclusive == Some(proc_id),
            LockType::Shared => self.shared.contains(&proc_id),
        }
    }

    /// Whether `proc_id` would block itself asking for `lock_type` here
    pub fn conflicts_with_own(&self, proc_id: ProcId, lock_type: LockType) -> bool {
        match lock_type {
            LockType::Exclusive => {
                self.exclusive == Some(proc_id) || self.shared.contains(&proc_id)
            }
            LockType::Shared => self.exclusive == Some(proc_id),
        }
    }

    /// Grant when admitted; with `respect_queue` an existing queue also blocks
    pub(crate) fn try_lock(
        &mut self,
        proc_id: ProcId,
        lock_type: LockType,
        respect_queue: bool,
    ) -> bool {
        if respect_queue && !self.waiters.is_empty() {
            return false;
        }
        if !self.admits(lock_type) {
            return false;
        }
        self.grant(proc_id, lock_type);
        true
    }

    pub(crate) fn grant(&mut self, proc_id: ProcId, lock_type: LockType) {
        match lock_type {
            LockType::Exclusive => self.exclusive = Some(proc_id),
            LockType::Shared => self.shared.push(proc_id),
        }
    }

    /// Drop one hold; returns `false` when `proc_id` held no such lock
    pub(crate) fn release(&mut self, proc_id: ProcId, lock_type: LockType) -> bool {
        match lock_type {
            LockType::Exclusive if self.exclusive == Some(proc_id) => {
                self.exclusive = None;
                true
            }
            LockType::Exclusive => false,
            LockType::Shared => match self.shared.iter().position(|p| *p == proc_id) {
                Some(pos) => {
                    self.shared.remove(pos);
                    true
                }
                None => false,
            },
        }
    }

    pub(crate) fn push_waiter(&mut self, waiter: Waiter) {
        self.waiters.push_back(waiter);
    }

    pub(crate) fn push_waiter_front(&mut self, waiter: Waiter) {
        self.waiters.push_front(waiter);
    }

    /// Pop the queue head if the current holders admit it
    pub(crate) fn pop_grantable(&mut self) -> Option<Waiter> {
        let head = self.waiters.front()?;
        if !self.admits(head.lock_type) {
            return None;
        }
        self.waiters.pop_front()
    }

    /// Remove `proc_id` from the queue, keeping everyone else in order
    pub(crate) fn remove_waiter(&mut self, proc_id: ProcId) -> Option<Waiter> {
        let pos = self.waiters.iter().position(|w| w.proc.proc_id() == proc_id)?;
        self.waiters.remove(pos)
    }

    pub(crate) fn find_waiter(&self, proc_id: ProcId) -> Option<&Waiter> {
        self.waiters.iter().find(|w| w.proc.proc_id() == proc_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proclock_primitives::TableName;

    fn waiter(id: u64, lock_type: LockType) -> Waiter {
        let table = TableName::parse("ns:t").unwrap();
        Waiter {
            proc: Procedure::new(id, lock_type),
            lock_type,
            request: LockRequest::Table(table, lock_type),
            step: 1,
            since: Instant::now(),
        }
    }

    #[test]
    fn test_exclusive_excludes_everything() {
        let mut entry = LockEntry::new(0);
        assert!(entry.try_lock(ProcId::new(1), LockType::Exclusive, false));
        assert!(!entry.try_lock(ProcId::new(2), LockType::Shared, false));
        assert!(!entry.try_lock(ProcId::new(2), LockType::Exclusive, false));
        assert_eq!(entry.exclusive_holder(), Some(ProcId::new(1)));
        assert_eq!(entry.shared_count(), 0);
    }

    #[test]
    fn test_shared_locks_stack() {
        let mut entry = LockEntry::new(0);
        assert!(entry.try_lock(ProcId::new(1), LockType::Shared, false));
        assert!(entry.try_lock(ProcId::new(2), LockType::Shared, false));
        assert!(entry.try_lock(ProcId::new(1), LockType::Shared, false));
        assert!(!entry.try_lock(ProcId::new(3), LockType::Exclusive, false));
        assert_eq!(entry.shared_count(), 3);

        assert!(entry.release(ProcId::new(1), LockType::Shared));
        assert_eq!(entry.shared_holders(), &[ProcId::new(2), ProcId::new(1)]);
    }

    #[test]
    fn test_release_unknown_holder() {
        let mut entry = LockEntry::new(0);
        entry.grant(ProcId::new(1), LockType::Exclusive);
        assert!(!entry.release(ProcId::new(2), LockType::Exclusive));
        assert!(!entry.release(ProcId::new(1), LockType::Shared));
        assert!(entry.release(ProcId::new(1), LockType::Exclusive));
        assert!(entry.is_empty());
    }

    #[test]
    fn test_respect_queue() {
        let mut entry = LockEntry::new(0);
        entry.grant(ProcId::new(1), LockType::Shared);
        entry.push_waiter(waiter(2, LockType::Exclusive));

        assert!(!entry.try_lock(ProcId::new(3), LockType::Shared, true));
        assert!(entry.try_lock(ProcId::new(3), LockType::Shared, false));
    }

    #[test]
    fn test_pop_grantable_stops_at_incompatible_head() {
        let mut entry = LockEntry::new(0);
        entry.grant(ProcId::new(1), LockType::Shared);
        entry.push_waiter(waiter(2, LockType::Exclusive));
        entry.push_waiter(waiter(3, LockType::Shared));

        assert!(entry.pop_grantable().is_none());

        entry.release(ProcId::new(1), LockType::Shared);
        let head = entry.pop_grantable().unwrap();
        assert_eq!(head.procedure().proc_id(), ProcId::new(2));
        entry.grant(ProcId::new(2), LockType::Exclusive);
        assert!(entry.pop_grantable().is_none());
    }

    #[test]
    fn test_remove_waiter_keeps_order() {
        let mut entry = LockEntry::new(0);
        entry.grant(ProcId::new(9), LockType::Exclusive);
        for (id, lock_type) in [
            (1, LockType::Shared),
            (2, LockType::Exclusive),
            (3, LockType::Shared),
        ] {
            entry.push_waiter(waiter(id, lock_type));
        }

        assert!(entry.remove_waiter(ProcId::new(2)).is_some());
        assert!(entry.remove_waiter(ProcId::new(2)).is_none());
        let order: Vec<u64> = entry.waiters().map(|w| w.procedure().proc_id().as_u64()).collect();
        assert_eq!(order, vec![1, 3]);
    }

    #[test]
    fn test_conflicts_with_own() {
        let mut entry = LockEntry::new(0);
        entry.grant(ProcId::new(1), LockType::Shared);
        assert!(entry.conflicts_with_own(ProcId::new(1), LockType::Exclusive));
        assert!(!entry.conflicts_with_own(ProcId::new(1), LockType::Shared));
        assert!(!entry.conflicts_with_own(ProcId::new(2), LockType::Exclusive));
    }
}
