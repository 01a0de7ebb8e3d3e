//! Known top-level tables supplied by OS introspection.
//!
//! Roots come from an external process-listing plugin that reports, per
//! task, the physical address of its top-level table (and with kernel page
//! table isolation, the separate kernel and user copies). Process metadata
//! travels with each root as an opaque annotation.

use crate::error::{PagehuntError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Opaque process annotation attached to a root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: i64,
    pub ppid: i64,
    pub name: String,
}

/// Which copy of a process's top-level table a root refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootKind {
    /// The only top-level table (no page table isolation)
    Shared,
    /// Kernel copy under page table isolation
    Kernel,
    /// User copy under page table isolation
    User,
}

/// A physical address asserted to be a top-level table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RootSpec {
    pub address: u64,
    pub kind: RootKind,
    pub process: Option<ProcessInfo>,
}

impl RootSpec {
    /// A bare root without process metadata.
    pub fn new(address: u64) -> Self {
        Self {
            address,
            kind: RootKind::Shared,
            process: None,
        }
    }
}

/// One row of the process-listing plugin's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    #[serde(rename = "PID")]
    pub pid: i64,
    #[serde(rename = "PPID")]
    pub ppid: i64,
    #[serde(rename = "COMM")]
    pub comm: String,
    /// Negative when the plugin failed to translate the address
    #[serde(default)]
    pub phy_pgd: Option<i64>,
    #[serde(default)]
    pub phy_pgd_kernel: Option<i64>,
    #[serde(default)]
    pub phy_pgd_user: Option<i64>,
}

impl TaskInfo {
    pub fn process(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            ppid: self.ppid,
            name: self.comm.clone(),
        }
    }

    /// Roots for this task: the kernel and user tables under page table
    /// isolation, the single shared table otherwise.
    pub fn root_specs(&self, kpti: bool) -> Vec<RootSpec> {
        let candidates = if kpti {
            vec![
                (self.phy_pgd_kernel, RootKind::Kernel),
                (self.phy_pgd_user, RootKind::User),
            ]
        } else {
            vec![(self.phy_pgd, RootKind::Shared)]
        };

        candidates
            .into_iter()
            .filter_map(|(addr, kind)| match addr {
                Some(a) if a >= 0 => Some(RootSpec {
                    address: a as u64,
                    kind,
                    process: Some(self.process()),
                }),
                _ => {
                    debug!(pid = self.pid, ?kind, "Task has no usable top-level table");
                    None
                }
            })
            .collect()
    }
}

/// Parse the plugin's JSON output (an array of task rows).
pub fn parse_task_info(json: &str) -> Result<Vec<TaskInfo>> {
    serde_json::from_str(json)
        .map_err(|e| PagehuntError::Serialization(format!("task info JSON error: {}", e)))
}

/// Load task rows from a JSON file.
pub fn load_task_info<P: AsRef<Path>>(path: P) -> Result<Vec<TaskInfo>> {
    let text = std::fs::read_to_string(path)?;
    parse_task_info(&text)
}

/// Flatten task rows into roots, dropping tasks without a usable table.
pub fn roots_from_tasks(tasks: &[TaskInfo], kpti: bool) -> Vec<RootSpec> {
    let roots: Vec<RootSpec> = tasks.iter().flat_map(|t| t.root_specs(kpti)).collect();
    let expected = if kpti { tasks.len() * 2 } else { tasks.len() };
    if roots.len() < expected {
        warn!(
            tasks = tasks.len(),
            roots = roots.len(),
            kpti,
            "Some tasks did not provide a top-level table"
        );
    }
    roots
}
