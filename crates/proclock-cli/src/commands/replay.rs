//! Replay a scripted sequence of lock operations
//!
//! A script is TOML with one `[[step]]` table per operation:
//!
//! ```toml
//! [[step]]
//! action = "wait"
//! proc = 1
//! lock = "exclusive"
//! table = "ns4:table4"
//!
//! [[step]]
//! action = "list-locks"
//! ```
//!
//! `wait` and `wake` name exactly one target: `server`, `namespace`,
//! `table`, or `table` plus `regions`.

use clap::Args;
use proclock_metrics::MetricsSnapshot;
use proclock_scheduler::{
    LockStatus, LockTarget, LockType, Procedure, RegionInfo, Scheduler, ServerName, TableName,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::{config::Config, output::Output, CliError};

/// Arguments of `proclock replay`
#[derive(Debug, Args)]
pub struct ReplayCommand {
    /// Script to run
    pub script: PathBuf,
}

/// Parsed script
#[derive(Debug, Deserialize)]
pub struct Script {
    /// Steps in execution order
    #[serde(rename = "step", default)]
    pub steps: Vec<Step>,
}

/// One script step
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    /// Acquire a lock
    Wait(LockStep),
    /// Release a lock or withdraw a wait
    Wake(LockStep),
    /// Print the lock report
    ListLocks,
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Wait(_) => "wait",
            Step::Wake(_) => "wake",
            Step::ListLocks => "list-locks",
        }
    }
}

/// Procedure and target of a wait or wake step
#[derive(Debug, Deserialize)]
pub struct LockStep {
    /// Procedure id
    pub proc: u64,
    /// `exclusive` (default) or `shared`
    #[serde(default)]
    pub lock: Option<String>,
    /// Server as `host,port,startcode`
    #[serde(default)]
    pub server: Option<String>,
    /// Namespace name
    #[serde(default)]
    pub namespace: Option<String>,
    /// Table as `ns:qualifier`
    #[serde(default)]
    pub table: Option<String>,
    /// Regions of `table`
    #[serde(default)]
    pub regions: Vec<RegionSpec>,
}

/// Region of a step's table
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionSpec {
    /// Start row key
    #[serde(default)]
    pub start_key: String,
    /// End row key, empty for the end of the table
    #[serde(default)]
    pub end_key: String,
    /// Region id
    #[serde(default)]
    pub region_id: u64,
}

impl LockStep {
    fn lock_type(&self) -> Result<LockType, String> {
        match &self.lock {
            Some(lock) => lock.parse().map_err(|e| format!("{}", e)),
            None => Ok(LockType::Exclusive),
        }
    }

    fn table_name(&self) -> Result<Option<TableName>, String> {
        self.table
            .as_deref()
            .map(|t| TableName::parse(t).map_err(|e| e.to_string()))
            .transpose()
    }

    /// Procedure and target this step names
    pub fn resolve(&self) -> Result<(Procedure, LockTarget), String> {
        let table = self.table_name()?;
        let named = [self.server.is_some(), self.namespace.is_some(), table.is_some()]
            .iter()
            .filter(|n| **n)
            .count();
        if named != 1 {
            return Err("exactly one of server, namespace or table is required".to_string());
        }
        if !self.regions.is_empty() && table.is_none() {
            return Err("regions require a table".to_string());
        }

        let target = if let Some(server) = &self.server {
            LockTarget::Server(ServerName::parse(server).map_err(|e| e.to_string())?)
        } else if let Some(namespace) = &self.namespace {
            LockTarget::Namespace(namespace.clone())
        } else {
            let table = table.clone().ok_or("table is required")?;
            if self.regions.is_empty() {
                LockTarget::Table(table)
            } else {
                LockTarget::Regions(
                    self.regions
                        .iter()
                        .map(|r| {
                            RegionInfo::with_keys(
                                table.clone(),
                                r.start_key.as_bytes().to_vec(),
                                r.end_key.as_bytes().to_vec(),
                                r.region_id,
                            )
                        })
                        .collect(),
                )
            }
        };

        let mut proc = Procedure::new(self.proc, self.lock_type()?);
        if let Some(table) = table {
            proc = proc.with_table(table);
        }
        Ok((proc, target))
    }
}

impl ReplayCommand {
    /// Load and run the script
    pub fn execute(self, config: &Config, json: bool) -> Result<(), CliError> {
        let content = std::fs::read_to_string(&self.script)?;
        let script: Script = toml::from_str(&content).map_err(|e| {
            CliError::InvalidInput(format!("{}: {}", self.script.display(), e))
        })?;
        run_script(&script, config, json)
    }
}

/// Run `script` against a fresh scheduler
///
/// Text mode prints each report as it is taken; step outcomes are logged.
/// JSON mode prints one document once every step has run.
pub fn run_script(script: &Script, config: &Config, json: bool) -> Result<(), CliError> {
    let scheduler = Scheduler::with_config(config.scheduler.clone())?;
    let mut steps = Vec::new();
    let mut reports = Vec::new();

    for (index, step) in script.steps.iter().enumerate() {
        let action = step.name();
        match step {
            Step::Wait(lock) | Step::Wake(lock) => {
                let (proc, target) = lock
                    .resolve()
                    .map_err(|message| CliError::InvalidStep { index, message })?;
                let status = if matches!(step, Step::Wait(_)) {
                    match scheduler.wait_lock(&proc, &target) {
                        Ok(LockStatus::Granted) => "granted",
                        Ok(LockStatus::Waiting) => "waiting",
                        Err(source) => return Err(CliError::Step { index, action, source }),
                    }
                } else {
                    scheduler
                        .wake_lock(&proc, &target)
                        .map_err(|source| CliError::Step { index, action, source })?;
                    "released"
                };
                let woken: Vec<u64> = scheduler
                    .take_runnable()
                    .iter()
                    .map(|p| p.proc_id().as_u64())
                    .collect();
                tracing::info!(
                    "step {}: {} proc {} {} (woken: {:?})",
                    index,
                    action,
                    proc.proc_id(),
                    status,
                    woken
                );
                steps.push(json!({
                    "index": index,
                    "action": action,
                    "proc": proc.proc_id().as_u64(),
                    "status": status,
                    "woken": woken,
                }));
            }
            Step::ListLocks => {
                let report = scheduler.snapshot();
                if json {
                    reports.push(serde_json::to_value(&report)?);
                } else {
                    let stdout = std::io::stdout();
                    report.write_to(&mut stdout.lock())?;
                }
                steps.push(json!({ "index": index, "action": action }));
            }
        }
    }

    if json {
        let metrics = match scheduler.metrics() {
            Some(metrics) => serde_json::to_value(MetricsSnapshot::from_metrics(&metrics))?,
            None => Value::Null,
        };
        Output::new(true)
            .field_value("steps", Value::Array(steps))
            .field_value("reports", Value::Array(reports))
            .field_value("metrics", metrics)
            .field_bool("idle", scheduler.is_empty())
            .print();
    }
    Ok(())
}
