//! Lock scopes and the lock chains requests expand to

use crate::error::{SchedulerError, SchedulerResult};
use proclock_primitives::{LockType, RegionInfo, ServerName, TableName};
use serde::{Serialize, Serializer};
use std::fmt;

/// Granularity a lock is held at, in report order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScopeKind {
    /// Region server
    Server,
    /// Namespace
    Namespace,
    /// Table
    Table,
    /// Region
    Region,
}

impl ScopeKind {
    /// Upper-case name used in report headers
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Server => "SERVER",
            ScopeKind::Namespace => "NAMESPACE",
            ScopeKind::Table => "TABLE",
            ScopeKind::Region => "REGION",
        }
    }

    /// Lower-case label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            ScopeKind::Server => "server",
            ScopeKind::Namespace => "namespace",
            ScopeKind::Table => "table",
            ScopeKind::Region => "region",
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ScopeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One lockable scope instance
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    /// Server lock
    Server(ServerName),
    /// Namespace lock
    Namespace(String),
    /// Table lock
    Table(TableName),
    /// Region lock, keyed by encoded region name
    Region(String),
}

impl ScopeKey {
    /// Kind of this scope
    pub fn kind(&self) -> ScopeKind {
        match self {
            ScopeKey::Server(_) => ScopeKind::Server,
            ScopeKey::Namespace(_) => ScopeKind::Namespace,
            ScopeKey::Table(_) => ScopeKind::Table,
            ScopeKey::Region(_) => ScopeKind::Region,
        }
    }

    /// Natural string identity (`host,port,startcode`, namespace, `ns:table`, encoded region)
    pub fn identity(&self) -> String {
        match self {
            ScopeKey::Server(server) => server.to_string(),
            ScopeKey::Namespace(namespace) => namespace.clone(),
            ScopeKey::Table(table) => table.to_string(),
            ScopeKey::Region(encoded) => encoded.clone(),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.identity())
    }
}

/// What a caller wants locked, independent of lock type
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockTarget {
    /// A region server
    Server(ServerName),
    /// A namespace
    Namespace(String),
    /// A table
    Table(TableName),
    /// One or more regions of a single table
    Regions(Vec<RegionInfo>),
}

impl LockTarget {
    /// Scope kind this target locks
    pub fn kind(&self) -> ScopeKind {
        match self {
            LockTarget::Server(_) => ScopeKind::Server,
            LockTarget::Namespace(_) => ScopeKind::Namespace,
            LockTarget::Table(_) => ScopeKind::Table,
            LockTarget::Regions(_) => ScopeKind::Region,
        }
    }
}

/// A complete lock request
///
/// Each request expands to a fixed chain of steps: the implicit shared
/// locks on enclosing scopes first, then the requested scope(s).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockRequest {
    /// Exclusive server lock
    Server(ServerName),
    /// Exclusive namespace lock
    Namespace(String),
    /// Table lock of the given type
    Table(TableName, LockType),
    /// Exclusive locks on regions of one table, encoded names sorted and unique
    Regions {
        /// Owning table
        table: TableName,
        /// Encoded region names
        regions: Vec<String>,
    },
}

impl LockRequest {
    /// Exclusive lock on a namespace
    pub fn namespace(namespace: &str) -> SchedulerResult<Self> {
        if namespace.is_empty() || namespace.contains(':') {
            return Err(SchedulerError::InvalidNamespace(namespace.to_string()));
        }
        Ok(LockRequest::Namespace(namespace.to_string()))
    }

    /// Exclusive locks on `regions`, all of which must belong to `table`
    ///
    /// Regions are ordered by encoded name so that two procedures locking
    /// overlapping region sets always take them in the same order.
    pub fn regions(table: &TableName, regions: &[RegionInfo]) -> SchedulerResult<Self> {
        if regions.is_empty() {
            return Err(SchedulerError::EmptyRegions(table.clone()));
        }
        if let Some(other) = regions.iter().find(|r| r.table() != table) {
            return Err(SchedulerError::RegionTableMismatch {
                expected: table.clone(),
                found: other.table().clone(),
            });
        }
        let mut encoded: Vec<String> = regions
            .iter()
            .map(|r| r.encoded_name().to_string())
            .collect();
        encoded.sort_unstable();
        encoded.dedup();
        Ok(LockRequest::Regions {
            table: table.clone(),
            regions: encoded,
        })
    }

    /// Request for `target` with `lock_type`
    ///
    /// Servers, namespaces and regions only take exclusive locks. A region
    /// target uses `table` when given, otherwise the table of its first
    /// region.
    pub fn for_target(
        target: &LockTarget,
        lock_type: LockType,
        table: Option<&TableName>,
    ) -> SchedulerResult<Self> {
        if lock_type == LockType::Shared && !matches!(target, LockTarget::Table(_)) {
            return Err(SchedulerError::UnsupportedLockType {
                lock_type,
                kind: target.kind(),
            });
        }
        match target {
            LockTarget::Server(server) => Ok(LockRequest::Server(server.clone())),
            LockTarget::Namespace(namespace) => Self::namespace(namespace),
            LockTarget::Table(table) => Ok(LockRequest::Table(table.clone(), lock_type)),
            LockTarget::Regions(regions) => {
                let table = table
                    .or_else(|| regions.first().map(|r| r.table()))
                    .cloned();
                match table {
                    Some(table) => Self::regions(&table, regions),
                    None => Err(SchedulerError::InvalidTarget(
                        "region target without regions or table".to_string(),
                    )),
                }
            }
        }
    }

    /// Scope named by this request (the first one for region sets)
    pub fn scope(&self) -> ScopeKey {
        match self {
            LockRequest::Server(server) => ScopeKey::Server(server.clone()),
            LockRequest::Namespace(namespace) => ScopeKey::Namespace(namespace.clone()),
            LockRequest::Table(table, _) => ScopeKey::Table(table.clone()),
            LockRequest::Regions { table, regions } => match regions.first() {
                Some(encoded) => ScopeKey::Region(encoded.clone()),
                None => ScopeKey::Table(table.clone()),
            },
        }
    }

    /// Lock type taken on the requested scope(s)
    pub fn lock_type(&self) -> LockType {
        match self {
            LockRequest::Table(_, lock_type) => *lock_type,
            _ => LockType::Exclusive,
        }
    }

    /// Expand into acquisition order; `system_table` is the table an
    /// exclusive namespace lock shares
    pub(crate) fn steps(&self, system_table: &TableName) -> Vec<Step> {
        match self {
            LockRequest::Server(server) => {
                vec![Step::explicit(ScopeKey::Server(server.clone()), LockType::Exclusive)]
            }
            LockRequest::Namespace(namespace) => vec![
                Step::implicit(ScopeKey::Table(system_table.clone())),
                Step::explicit(ScopeKey::Namespace(namespace.clone()), LockType::Exclusive),
            ],
            LockRequest::Table(table, lock_type) => vec![
                Step::implicit(ScopeKey::Namespace(table.namespace().to_string())),
                Step::explicit(ScopeKey::Table(table.clone()), *lock_type),
            ],
            LockRequest::Regions { table, regions } => {
                let mut steps = vec![
                    Step::implicit(ScopeKey::Namespace(table.namespace().to_string())),
                    Step::implicit(ScopeKey::Table(table.clone())),
                ];
                steps.extend(
                    regions
                        .iter()
                        .map(|r| Step::explicit(ScopeKey::Region(r.clone()), LockType::Exclusive)),
                );
                steps
            }
        }
    }
}

impl fmt::Display for LockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockRequest::Regions { regions, .. } if regions.len() > 1 => {
                write!(f, "{} region locks starting at {}", regions.len(), self.scope())
            }
            _ => write!(f, "{} lock on {}", self.lock_type(), self.scope()),
        }
    }
}

/// One scope lock within a request's chain
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Step {
    pub(crate) scope: ScopeKey,
    pub(crate) lock_type: LockType,
    /// Shared lock on an enclosing scope, taken as a side effect
    pub(crate) implicit: bool,
}

impl Step {
    fn explicit(scope: ScopeKey, lock_type: LockType) -> Self {
        Self {
            scope,
            lock_type,
            implicit: false,
        }
    }

    fn implicit(scope: ScopeKey) -> Self {
        Self {
            scope,
            lock_type: LockType::Shared,
            implicit: true,
        }
    }
}
