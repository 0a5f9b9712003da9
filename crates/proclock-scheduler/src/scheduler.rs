//! Main scheduler implementation
//!
//! Grants and queues lock requests across the server, namespace, table and
//! region scopes. All state lives in one [`Registry`] behind a single mutex;
//! every wait, wake and grant pass runs while holding it.

use crate::config::SchedulerConfig;
use crate::entry::Waiter;
use crate::error::{SchedulerError, SchedulerResult};
use crate::procedure::Procedure;
use crate::registry::Registry;
use crate::report::LockReport;
use crate::scope::{LockRequest, LockTarget, ScopeKey, Step};
use parking_lot::{Condvar, Mutex};
use proclock_metrics::{LockEvent, LockMetrics};
use proclock_primitives::{LockType, ProcId, RegionInfo, ServerName, TableName};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

/// Outcome of a wait call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockStatus {
    /// Every lock of the request is held; the procedure may run
    Granted,
    /// The procedure is suspended on a waiter queue
    Waiting,
}

impl LockStatus {
    /// Whether the request was granted
    pub fn is_granted(&self) -> bool {
        matches!(self, LockStatus::Granted)
    }

    /// Whether the procedure was suspended
    pub fn is_waiting(&self) -> bool {
        matches!(self, LockStatus::Waiting)
    }
}

struct Inner {
    registry: Registry,
    /// Procedures granted by a wake, in grant order
    runnable: VecDeque<Procedure>,
}

/// Where a chain walk ended
enum Progress {
    Granted,
    Queued(ScopeKey),
}

/// Hierarchical lock scheduler
///
/// `wait_*` calls never block the calling thread: a conflicting request
/// suspends the procedure and returns [`LockStatus::Waiting`]. A later
/// `wake_*` that frees the scope grants it, pushes it onto the run queue
/// ([`take_runnable`](Self::take_runnable)) and wakes threads parked in
/// [`await_grant`](Self::await_grant).
pub struct Scheduler {
    config: SchedulerConfig,
    system_table: TableName,
    inner: Mutex<Inner>,
    granted: Condvar,
    metrics: Option<Arc<LockMetrics>>,
}

impl Scheduler {
    /// Create a scheduler with default settings
    pub fn new() -> Self {
        Self::build(
            SchedulerConfig::default(),
            TableName::namespace_table(),
            Some(Arc::new(LockMetrics::new())),
        )
    }

    /// Create a scheduler from configuration
    pub fn with_config(config: SchedulerConfig) -> SchedulerResult<Self> {
        let system_table = config.system_table()?;
        let metrics = config.metrics.then(|| Arc::new(LockMetrics::new()));
        Ok(Self::build(config, system_table, metrics))
    }

    /// Create a scheduler recording into an existing metrics store
    pub fn with_shared_metrics(
        config: SchedulerConfig,
        metrics: Arc<LockMetrics>,
    ) -> SchedulerResult<Self> {
        let system_table = config.system_table()?;
        Ok(Self::build(config, system_table, Some(metrics)))
    }

    fn build(
        config: SchedulerConfig,
        system_table: TableName,
        metrics: Option<Arc<LockMetrics>>,
    ) -> Self {
        Self {
            config,
            system_table,
            inner: Mutex::new(Inner {
                registry: Registry::new(),
                runnable: VecDeque::new(),
            }),
            granted: Condvar::new(),
            metrics,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Metrics store, when enabled
    pub fn metrics(&self) -> Option<Arc<LockMetrics>> {
        self.metrics.clone()
    }

    // ==================== Per-scope operations ====================

    /// Exclusive lock on a region server
    pub fn wait_server_exclusive_lock(
        &self,
        proc: &Procedure,
        server: &ServerName,
    ) -> SchedulerResult<LockStatus> {
        self.wait(proc, LockRequest::Server(server.clone()))
    }

    /// Release [`wait_server_exclusive_lock`](Self::wait_server_exclusive_lock)
    pub fn wake_server_exclusive_lock(
        &self,
        proc: &Procedure,
        server: &ServerName,
    ) -> SchedulerResult<()> {
        self.wake(proc, LockRequest::Server(server.clone()))
    }

    /// Exclusive lock on a namespace, sharing the system namespace table
    pub fn wait_namespace_exclusive_lock(
        &self,
        proc: &Procedure,
        namespace: &str,
    ) -> SchedulerResult<LockStatus> {
        self.wait(proc, LockRequest::namespace(namespace)?)
    }

    /// Release [`wait_namespace_exclusive_lock`](Self::wait_namespace_exclusive_lock)
    pub fn wake_namespace_exclusive_lock(
        &self,
        proc: &Procedure,
        namespace: &str,
    ) -> SchedulerResult<()> {
        self.wake(proc, LockRequest::namespace(namespace)?)
    }

    /// Exclusive lock on a table, sharing its namespace
    pub fn wait_table_exclusive_lock(
        &self,
        proc: &Procedure,
        table: &TableName,
    ) -> SchedulerResult<LockStatus> {
        self.wait(proc, LockRequest::Table(table.clone(), LockType::Exclusive))
    }

    /// Release [`wait_table_exclusive_lock`](Self::wait_table_exclusive_lock)
    pub fn wake_table_exclusive_lock(
        &self,
        proc: &Procedure,
        table: &TableName,
    ) -> SchedulerResult<()> {
        self.wake(proc, LockRequest::Table(table.clone(), LockType::Exclusive))
    }

    /// Shared lock on a table, sharing its namespace
    pub fn wait_table_shared_lock(
        &self,
        proc: &Procedure,
        table: &TableName,
    ) -> SchedulerResult<LockStatus> {
        self.wait(proc, LockRequest::Table(table.clone(), LockType::Shared))
    }

    /// Release [`wait_table_shared_lock`](Self::wait_table_shared_lock)
    pub fn wake_table_shared_lock(
        &self,
        proc: &Procedure,
        table: &TableName,
    ) -> SchedulerResult<()> {
        self.wake(proc, LockRequest::Table(table.clone(), LockType::Shared))
    }

    /// Exclusive lock on a region, sharing its table and namespace
    pub fn wait_region(
        &self,
        proc: &Procedure,
        region: &RegionInfo,
    ) -> SchedulerResult<LockStatus> {
        self.wait(proc, LockRequest::regions(region.table(), std::slice::from_ref(region))?)
    }

    /// Release [`wait_region`](Self::wait_region)
    pub fn wake_region(&self, proc: &Procedure, region: &RegionInfo) -> SchedulerResult<()> {
        self.wake(proc, LockRequest::regions(region.table(), std::slice::from_ref(region))?)
    }

    /// Exclusive locks on several regions of `table`, taken all or nothing
    pub fn wait_regions(
        &self,
        proc: &Procedure,
        table: &TableName,
        regions: &[RegionInfo],
    ) -> SchedulerResult<LockStatus> {
        self.wait(proc, LockRequest::regions(table, regions)?)
    }

    /// Release [`wait_regions`](Self::wait_regions)
    pub fn wake_regions(
        &self,
        proc: &Procedure,
        table: &TableName,
        regions: &[RegionInfo],
    ) -> SchedulerResult<()> {
        self.wake(proc, LockRequest::regions(table, regions)?)
    }

    /// Lock `target` with the procedure's own lock type
    pub fn wait_lock(&self, proc: &Procedure, target: &LockTarget) -> SchedulerResult<LockStatus> {
        self.wait(proc, LockRequest::for_target(target, proc.lock_type(), proc.table())?)
    }

    /// Release [`wait_lock`](Self::wait_lock)
    pub fn wake_lock(&self, proc: &Procedure, target: &LockTarget) -> SchedulerResult<()> {
        self.wake(proc, LockRequest::for_target(target, proc.lock_type(), proc.table())?)
    }

    // ==================== Generic wait / wake ====================

    /// Acquire every lock of `request` or suspend the procedure
    pub fn wait(&self, proc: &Procedure, request: LockRequest) -> SchedulerResult<LockStatus> {
        let proc_id = proc.proc_id();
        let steps = request.steps(&self.system_table);
        let mut inner = self.inner.lock();

        if let Some(scope) = inner.registry.waiting_scope(proc_id) {
            return Err(SchedulerError::AlreadyWaiting {
                proc_id,
                scope: scope.clone(),
            });
        }
        if let Some(step) = steps.iter().find(|s| {
            inner
                .registry
                .get(&s.scope)
                .is_some_and(|e| e.conflicts_with_own(proc_id, s.lock_type))
        }) {
            return Err(SchedulerError::SelfConflict {
                proc_id,
                scope: step.scope.clone(),
            });
        }

        let progress = self.advance(
            &mut inner,
            proc.clone(),
            request.clone(),
            &steps,
            Vec::new(),
            Instant::now(),
        )?;
        self.update_waiting(&inner);

        match progress {
            Progress::Granted => {
                tracing::debug!("proc {} acquired {}", proc_id, request);
                Ok(LockStatus::Granted)
            }
            // Queued, then granted by the pass that ran right after queueing.
            Progress::Queued(_) if inner.registry.waiting_scope(proc_id).is_none() => {
                inner.runnable.retain(|p| p.proc_id() != proc_id);
                tracing::debug!("proc {} acquired {}", proc_id, request);
                Ok(LockStatus::Granted)
            }
            Progress::Queued(scope) => {
                tracing::debug!("proc {} waiting on {} for {}", proc_id, scope, request);
                Ok(LockStatus::Waiting)
            }
        }
    }

    /// Release every lock of `request`, or withdraw the procedure's wait
    ///
    /// Validation happens before anything is released: on error the
    /// registry is untouched.
    pub fn wake(&self, proc: &Procedure, request: LockRequest) -> SchedulerResult<()> {
        let proc_id = proc.proc_id();
        let steps = request.steps(&self.system_table);
        let mut inner = self.inner.lock();

        let queued_for_request = inner
            .registry
            .find_waiter(proc_id)
            .is_some_and(|w| w.request == request);
        if queued_for_request {
            if let Some((scope, _)) = inner.registry.cancel(proc_id) {
                tracing::debug!("proc {} stopped waiting on {}", proc_id, scope);
                self.record(LockEvent::Cancelled, &scope);
                let result = self.grant_waiters(&mut inner, &scope);
                inner.registry.remove_if_empty(&scope);
                self.update_waiting(&inner);
                self.granted.notify_all();
                return result;
            }
        }

        for step in steps.iter().filter(|s| !s.implicit) {
            let held = inner
                .registry
                .get(&step.scope)
                .is_some_and(|e| e.holds(proc_id, step.lock_type));
            if !held {
                tracing::warn!(
                    "proc {} released {} lock on {} it does not hold",
                    proc_id,
                    step.lock_type,
                    step.scope
                );
                self.record(LockEvent::InvalidRelease, &step.scope);
                return Err(SchedulerError::InvalidRelease {
                    proc_id,
                    scope: step.scope.clone(),
                    lock_type: step.lock_type,
                });
            }
        }
        for step in steps.iter().filter(|s| s.implicit) {
            let held = inner
                .registry
                .get(&step.scope)
                .is_some_and(|e| e.holds(proc_id, step.lock_type));
            if !held {
                tracing::warn!(
                    "proc {} holds {} without the implicit lock on {}",
                    proc_id,
                    request,
                    step.scope
                );
                self.record(LockEvent::InvalidRelease, &step.scope);
                return Err(SchedulerError::ImplicitLockMissing {
                    proc_id,
                    scope: step.scope.clone(),
                });
            }
        }

        for step in steps.iter().rev() {
            self.release_step(&mut inner, proc_id, step)?;
        }
        tracing::debug!("proc {} released {}", proc_id, request);
        self.update_waiting(&inner);
        Ok(())
    }

    // ==================== Run queue ====================

    /// Whether the procedure is suspended on any queue
    pub fn is_waiting(&self, proc_id: ProcId) -> bool {
        self.inner.lock().registry.waiting_scope(proc_id).is_some()
    }

    /// Number of suspended procedures
    pub fn waiting_count(&self) -> usize {
        self.inner.lock().registry.waiting_count()
    }

    /// No lock held and nobody waiting
    pub fn is_empty(&self) -> bool {
        self.inner.lock().registry.is_empty()
    }

    /// Drain procedures granted by wake calls, in grant order
    pub fn take_runnable(&self) -> Vec<Procedure> {
        self.inner.lock().runnable.drain(..).collect()
    }

    /// Block the calling thread until the procedure no longer waits
    ///
    /// Returns at once when the procedure is not suspended. There is no
    /// timeout; a wait that is never granted or cancelled blocks forever.
    pub fn await_grant(&self, proc_id: ProcId) {
        let mut inner = self.inner.lock();
        while inner.registry.waiting_scope(proc_id).is_some() {
            self.granted.wait(&mut inner);
        }
    }

    // ==================== Reporting ====================

    /// Point-in-time copy of every live lock
    pub fn snapshot(&self) -> LockReport {
        let inner = self.inner.lock();
        LockReport::from_registry(&inner.registry)
    }

    /// Write the lock report to `out`
    ///
    /// The registry is copied under the scheduler lock; rendering and I/O
    /// happen after it is released.
    pub fn list_locks<W: Write + ?Sized>(&self, out: &mut W) -> SchedulerResult<()> {
        let report = self.snapshot();
        report.write_to(out)
    }

    // ==================== Internals ====================

    /// Take the steps of `steps` not yet in `held`, in chain order
    ///
    /// When a step blocks, everything in `held` is released (children
    /// first) and the procedure is queued on the blocking scope.
    fn advance(
        &self,
        inner: &mut Inner,
        proc: Procedure,
        request: LockRequest,
        steps: &[Step],
        mut held: Vec<usize>,
        since: Instant,
    ) -> SchedulerResult<Progress> {
        let proc_id = proc.proc_id();
        for (idx, step) in steps.iter().enumerate() {
            if held.contains(&idx) {
                continue;
            }
            let entry = inner.registry.entry_mut(&step.scope);
            if entry.try_lock(proc_id, step.lock_type, self.config.fair_admission) {
                self.record(LockEvent::Granted, &step.scope);
                held.push(idx);
                continue;
            }

            self.queue_behind(inner, proc, request, steps, held, idx, since)?;
            return Ok(Progress::Queued(step.scope.clone()));
        }
        Ok(Progress::Granted)
    }

    /// Release `held` (children first) and queue the procedure on
    /// `steps[blocked]`, then run a grant pass there
    #[allow(clippy::too_many_arguments)]
    fn queue_behind(
        &self,
        inner: &mut Inner,
        proc: Procedure,
        request: LockRequest,
        steps: &[Step],
        mut held: Vec<usize>,
        blocked: usize,
        since: Instant,
    ) -> SchedulerResult<()> {
        let proc_id = proc.proc_id();
        held.sort_unstable();
        for &h in held.iter().rev() {
            self.release_step(inner, proc_id, &steps[h])?;
        }

        let step = &steps[blocked];
        tracing::debug!(
            "proc {} queued for {} lock on {}",
            proc_id,
            step.lock_type,
            step.scope
        );
        self.record(LockEvent::Queued, &step.scope);
        inner.registry.enqueue(
            &step.scope,
            Waiter {
                proc,
                lock_type: step.lock_type,
                request,
                step: blocked,
                since,
            },
        );
        // The releases above may have freed this scope.
        self.grant_waiters(inner, &step.scope)
    }

    fn release_step(&self, inner: &mut Inner, proc_id: ProcId, step: &Step) -> SchedulerResult<()> {
        if let Some(entry) = inner.registry.get_mut(&step.scope) {
            if entry.release(proc_id, step.lock_type) {
                self.record(LockEvent::Released, &step.scope);
            }
        }
        let result = self.grant_waiters(inner, &step.scope);
        inner.registry.remove_if_empty(&step.scope);
        result
    }

    /// Grant queue heads of `scope` while the holders admit them
    fn grant_waiters(&self, inner: &mut Inner, scope: &ScopeKey) -> SchedulerResult<()> {
        while let Some(waiter) = inner.registry.pop_grantable(scope) {
            let Waiter {
                proc,
                lock_type,
                request,
                step,
                since,
            } = waiter;
            let proc_id = proc.proc_id();
            let steps = request.steps(&self.system_table);
            tracing::trace!("granting {} lock on {} to proc {}", lock_type, scope, proc_id);

            inner.registry.entry_mut(scope).grant(proc_id, lock_type);
            self.record(LockEvent::Granted, scope);

            // Enclosing scopes were given back when the procedure queued;
            // re-take them ahead of any queue.
            let mut held = vec![step];
            let mut refused = None;
            for (idx, parent) in steps
                .iter()
                .enumerate()
                .filter(|(idx, s)| s.implicit && *idx != step)
            {
                let entry = inner.registry.entry_mut(&parent.scope);
                if entry.try_lock(proc_id, parent.lock_type, false) {
                    self.record(LockEvent::Granted, &parent.scope);
                    held.push(idx);
                    continue;
                }
                refused = Some((idx, entry.conflicts_with_own(proc_id, parent.lock_type)));
                break;
            }

            match refused {
                // Another procedure took the enclosing scope while this one
                // was queued: wait for it there instead.
                Some((idx, false)) => {
                    tracing::debug!(
                        "proc {} granted {} but {} is held, queueing there",
                        proc_id,
                        scope,
                        steps[idx].scope
                    );
                    self.queue_behind(inner, proc, request, &steps, held, idx, since)?;
                    continue;
                }
                // Only the procedure's own hold can refuse it; waiting would
                // never end.
                Some((idx, true)) => {
                    for &h in held.iter().skip(1) {
                        if let Some(entry) = inner.registry.get_mut(&steps[h].scope) {
                            entry.release(proc_id, steps[h].lock_type);
                        }
                        inner.registry.remove_if_empty(&steps[h].scope);
                    }
                    if let Some(entry) = inner.registry.get_mut(scope) {
                        entry.release(proc_id, lock_type);
                    }
                    tracing::warn!(
                        "proc {} granted {} but holds a conflicting lock on {}, rolled back",
                        proc_id,
                        scope,
                        steps[idx].scope
                    );
                    self.record(LockEvent::HierarchyViolation, scope);
                    inner.registry.requeue_front(
                        scope,
                        Waiter {
                            proc,
                            lock_type,
                            request,
                            step,
                            since,
                        },
                    );
                    return Err(SchedulerError::HierarchyViolation {
                        proc_id,
                        scope: scope.clone(),
                        parent: steps[idx].scope.clone(),
                    });
                }
                None => {}
            }

            if let Progress::Granted =
                self.advance(inner, proc.clone(), request, &steps, held, since)?
            {
                if let Some(metrics) = &self.metrics {
                    metrics.observe_wait(since.elapsed());
                }
                tracing::debug!("proc {} woken after waiting on {}", proc_id, scope);
                inner.runnable.push_back(proc);
                self.granted.notify_all();
            }
        }
        Ok(())
    }

    fn record(&self, event: LockEvent, scope: &ScopeKey) {
        if let Some(metrics) = &self.metrics {
            metrics.record(event, scope.kind().label());
        }
    }

    fn update_waiting(&self, inner: &Inner) {
        if let Some(metrics) = &self.metrics {
            metrics.set_waiting(inner.registry.waiting_count());
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
