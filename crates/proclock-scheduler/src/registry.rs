//! Registry of live lock entries

use crate::entry::{LockEntry, Waiter};
use crate::scope::ScopeKey;
use proclock_primitives::ProcId;
use std::collections::HashMap;

/// All live lock entries, plus an index of suspended procedures
///
/// Entries are created on first use and removed as soon as they hold
/// nothing and queue nobody.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<ScopeKey, LockEntry>,
    /// Suspended procedure -> scope it is queued on
    waiting: HashMap<ProcId, ScopeKey>,
    next_seq: u64,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry for `scope`, if live
    pub fn get(&self, scope: &ScopeKey) -> Option<&LockEntry> {
        self.entries.get(scope)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No live entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scope `proc_id` is queued on
    pub fn waiting_scope(&self, proc_id: ProcId) -> Option<&ScopeKey> {
        self.waiting.get(&proc_id)
    }

    /// Number of suspended procedures
    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    /// Live entries ordered by scope kind, then first-seen order
    pub fn entries_in_report_order(&self) -> Vec<(&ScopeKey, &LockEntry)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by_key(|(scope, entry)| (scope.kind(), entry.seq()));
        entries
    }

    pub(crate) fn get_mut(&mut self, scope: &ScopeKey) -> Option<&mut LockEntry> {
        self.entries.get_mut(scope)
    }

    /// Entry for `scope`, created when missing
    pub(crate) fn entry_mut(&mut self, scope: &ScopeKey) -> &mut LockEntry {
        let next_seq = &mut self.next_seq;
        self.entries.entry(scope.clone()).or_insert_with(|| {
            let seq = *next_seq;
            *next_seq += 1;
            LockEntry::new(seq)
        })
    }

    pub(crate) fn enqueue(&mut self, scope: &ScopeKey, waiter: Waiter) {
        self.waiting.insert(waiter.proc.proc_id(), scope.clone());
        self.entry_mut(scope).push_waiter(waiter);
    }

    pub(crate) fn requeue_front(&mut self, scope: &ScopeKey, waiter: Waiter) {
        self.waiting.insert(waiter.proc.proc_id(), scope.clone());
        self.entry_mut(scope).push_waiter_front(waiter);
    }

    /// Pop the grantable head of `scope`'s queue
    pub(crate) fn pop_grantable(&mut self, scope: &ScopeKey) -> Option<Waiter> {
        let waiter = self.entries.get_mut(scope)?.pop_grantable()?;
        self.waiting.remove(&waiter.proc.proc_id());
        Some(waiter)
    }

    /// Withdraw `proc_id` from whatever queue it is on
    pub(crate) fn cancel(&mut self, proc_id: ProcId) -> Option<(ScopeKey, Waiter)> {
        let scope = self.waiting.remove(&proc_id)?;
        let waiter = self.entries.get_mut(&scope)?.remove_waiter(proc_id)?;
        Some((scope, waiter))
    }

    pub(crate) fn find_waiter(&self, proc_id: ProcId) -> Option<&Waiter> {
        let scope = self.waiting.get(&proc_id)?;
        self.entries.get(scope)?.find_waiter(proc_id)
    }

    pub(crate) fn remove_if_empty(&mut self, scope: &ScopeKey) {
        if self.entries.get(scope).is_some_and(LockEntry::is_empty) {
            self.entries.remove(scope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proclock_primitives::{LockType, ServerName, TableName};

    fn table(name: &str) -> ScopeKey {
        ScopeKey::Table(TableName::parse(name).unwrap())
    }

    #[test]
    fn test_entries_created_lazily_and_removed_when_empty() {
        let mut registry = Registry::new();
        let scope = table("ns:t");
        assert!(registry.get(&scope).is_none());

        registry.entry_mut(&scope).grant(ProcId::new(1), LockType::Exclusive);
        assert_eq!(registry.len(), 1);

        registry.remove_if_empty(&scope);
        assert_eq!(registry.len(), 1);

        registry.get_mut(&scope).unwrap().release(ProcId::new(1), LockType::Exclusive);
        registry.remove_if_empty(&scope);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_report_order_groups_kinds_then_first_seen() {
        let mut registry = Registry::new();
        let region = ScopeKey::Region("abc".to_string());
        let t2 = table("ns:b");
        let t1 = table("ns:a");
        let server = ScopeKey::Server(ServerName::new("host", 1, 0));

        for (i, scope) in [&region, &t2, &t1, &server].into_iter().enumerate() {
            registry.entry_mut(scope).grant(ProcId::new(i as u64), LockType::Shared);
        }

        let order: Vec<String> = registry
            .entries_in_report_order()
            .into_iter()
            .map(|(scope, _)| scope.to_string())
            .collect();
        assert_eq!(
            order,
            vec!["SERVER(host,1,0)", "TABLE(ns:b)", "TABLE(ns:a)", "REGION(abc)"]
        );
    }

    #[test]
    fn test_recreated_entry_moves_to_the_back() {
        let mut registry = Registry::new();
        let a = table("ns:a");
        let b = table("ns:b");
        registry.entry_mut(&a).grant(ProcId::new(1), LockType::Shared);
        registry.entry_mut(&b).grant(ProcId::new(2), LockType::Shared);

        registry.get_mut(&a).unwrap().release(ProcId::new(1), LockType::Shared);
        registry.remove_if_empty(&a);
        registry.entry_mut(&a).grant(ProcId::new(3), LockType::Shared);

        let order: Vec<&ScopeKey> = registry
            .entries_in_report_order()
            .into_iter()
            .map(|(scope, _)| scope)
            .collect();
        assert_eq!(order, vec![&b, &a]);
    }
}
