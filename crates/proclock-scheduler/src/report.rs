//! Lock reports
//!
//! A [`LockReport`] is an owned copy of the registry taken under the
//! scheduler lock, so rendering never holds it. The text form is:
//!
//! ```text
//! TABLE(ns4:table4)
//! Lock type: EXCLUSIVE, procedure: 1
//! Waiting procedures:
//! Lock type  Procedure Id
//!  SHARED 2
//! 1 row(s)
//!
//! ```

use crate::error::SchedulerResult;
use crate::registry::Registry;
use crate::scope::ScopeKind;
use proclock_primitives::{LockType, ProcId};
use serde::Serialize;
use std::fmt;
use std::io::Write;

const WAITING_TITLE: &str = "Waiting procedures:";
const WAITING_COLUMNS: [&str; 2] = ["Lock type", "Procedure Id"];

/// Who holds a scope
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LockHolder {
    /// Single exclusive holder
    Exclusive {
        /// Holding procedure
        proc_id: ProcId,
    },
    /// Shared holds; counts every hold, not distinct procedures
    Shared {
        /// Number of holds
        count: usize,
    },
}

/// One queued procedure
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WaitingProcedure {
    /// Lock type it waits for
    pub lock_type: LockType,
    /// Waiting procedure
    pub proc_id: ProcId,
}

/// State of one scope
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LockInfo {
    /// Scope kind
    pub kind: ScopeKind,
    /// Scope identity, e.g. `ns:table` or an encoded region name
    pub identity: String,
    /// Current holder; `None` when only waiters remain
    pub holder: Option<LockHolder>,
    /// Queue in FIFO order
    pub waiting: Vec<WaitingProcedure>,
}

impl LockInfo {
    /// Rendered lines of this block, ending with the blank separator
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!("{}({})", self.kind, self.identity)];
        match &self.holder {
            Some(LockHolder::Exclusive { proc_id }) => {
                lines.push(format!("Lock type: EXCLUSIVE, procedure: {}", proc_id));
            }
            Some(LockHolder::Shared { count }) => {
                lines.push(format!("Lock type: SHARED, count: {}", count));
            }
            None => {}
        }
        if !self.waiting.is_empty() {
            lines.push(WAITING_TITLE.to_string());
            lines.push(WAITING_COLUMNS.join("  "));
            for waiter in &self.waiting {
                lines.push(format!(" {} {}", waiter.lock_type, waiter.proc_id));
            }
            lines.push(format!("{} row(s)", self.waiting.len()));
        }
        lines.push(String::new());
        lines
    }
}

/// Point-in-time view of every live lock
///
/// Entries are grouped by kind (servers, namespaces, tables, regions) and
/// listed in the order each scope was first locked.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LockReport {
    /// Locks in report order
    pub locks: Vec<LockInfo>,
}

impl LockReport {
    /// Copy the registry's live entries
    pub fn from_registry(registry: &Registry) -> Self {
        let locks = registry
            .entries_in_report_order()
            .into_iter()
            .map(|(scope, entry)| {
                let holder = match entry.exclusive_holder() {
                    Some(proc_id) => Some(LockHolder::Exclusive { proc_id }),
                    None if entry.shared_count() > 0 => Some(LockHolder::Shared {
                        count: entry.shared_count(),
                    }),
                    None => None,
                };
                LockInfo {
                    kind: scope.kind(),
                    identity: scope.identity(),
                    holder,
                    waiting: entry
                        .waiters()
                        .map(|w| WaitingProcedure {
                            lock_type: w.lock_type(),
                            proc_id: w.procedure().proc_id(),
                        })
                        .collect(),
                }
            })
            .collect();
        Self { locks }
    }

    /// Number of scopes listed
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// No live locks
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Lock on the scope with this kind and identity
    pub fn find(&self, kind: ScopeKind, identity: &str) -> Option<&LockInfo> {
        self.locks
            .iter()
            .find(|l| l.kind == kind && l.identity == identity)
    }

    /// Report lines; each call starts over from the first line
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.locks.iter().flat_map(LockInfo::lines)
    }

    /// Write the text report, one line per `\n`
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> SchedulerResult<()> {
        for line in self.lines() {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Pretty JSON form
    pub fn to_json(&self) -> SchedulerResult<String> {
        Ok(serde_json::to_string_pretty(self).map_err(std::io::Error::from)?)
    }
}

impl fmt::Display for LockReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_lock(holder: Option<LockHolder>, waiting: Vec<WaitingProcedure>) -> LockInfo {
        LockInfo {
            kind: ScopeKind::Table,
            identity: "ns4:table4".to_string(),
            holder,
            waiting,
        }
    }

    #[test]
    fn test_exclusive_block() {
        let info = table_lock(Some(LockHolder::Exclusive { proc_id: ProcId::new(1) }), vec![]);
        assert_eq!(
            info.lines(),
            vec!["TABLE(ns4:table4)", "Lock type: EXCLUSIVE, procedure: 1", ""]
        );
    }

    #[test]
    fn test_waiting_block() {
        let info = table_lock(
            Some(LockHolder::Exclusive { proc_id: ProcId::new(1) }),
            vec![WaitingProcedure {
                lock_type: LockType::Shared,
                proc_id: ProcId::new(2),
            }],
        );
        let report = LockReport { locks: vec![info] };
        assert_eq!(
            report.to_string(),
            "TABLE(ns4:table4)\n\
             Lock type: EXCLUSIVE, procedure: 1\n\
             Waiting procedures:\n\
             Lock type  Procedure Id\n \
             SHARED 2\n\
             1 row(s)\n\
             \n"
        );
    }

    #[test]
    fn test_waiters_without_holder() {
        let info = table_lock(
            None,
            vec![WaitingProcedure {
                lock_type: LockType::Exclusive,
                proc_id: ProcId::new(7),
            }],
        );
        let lines = info.lines();
        assert_eq!(lines[0], "TABLE(ns4:table4)");
        assert_eq!(lines[1], "Waiting procedures:");
    }

    #[test]
    fn test_lines_restart() {
        let report = LockReport {
            locks: vec![table_lock(Some(LockHolder::Shared { count: 2 }), vec![])],
        };
        let first: Vec<String> = report.lines().collect();
        let second: Vec<String> = report.lines().collect();
        assert_eq!(first, second);
        assert_eq!(first[1], "Lock type: SHARED, count: 2");
    }

    #[test]
    fn test_write_to_matches_display() {
        let report = LockReport {
            locks: vec![table_lock(Some(LockHolder::Shared { count: 1 }), vec![])],
        };
        let mut buf = Vec::new();
        report.write_to(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), report.to_string());
    }

    #[test]
    fn test_json() {
        let report = LockReport {
            locks: vec![table_lock(
                Some(LockHolder::Exclusive {
                    proc_id: ProcId::new(3),
                }),
                vec![],
            )],
        };
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["locks"][0]["kind"], "TABLE");
        assert_eq!(value["locks"][0]["holder"]["type"], "exclusive");
        assert_eq!(value["locks"][0]["holder"]["proc_id"], 3);
    }

    #[test]
    fn test_empty_report() {
        let report = LockReport::from_registry(&Registry::new());
        assert!(report.is_empty());
        assert_eq!(report.to_string(), "");
    }
}
