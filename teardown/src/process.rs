//! Identity-based matching of running processes against a target binary.

use crate::identity::FileIdentity;
use std::path::PathBuf;
use sysinfo::{Pid, ProcessRefreshKind, System, UpdateKind};
use thiserror::Error;
use tracing::debug;

/// One entry of a process snapshot. The executable path is best effort; it
/// is unavailable for protected processes and for processes that exited
/// while the snapshot was being taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub exe: Option<PathBuf>,
    pub session_id: Option<u32>,
}

impl ProcessRecord {
    /// Whether this process runs in an interactive login session rather than
    /// in the session reserved for system services.
    pub fn is_interactive(&self) -> bool {
        self.session_id != Some(0)
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("termination request for process {0} was rejected")]
    TerminateDenied(u32),
}

/// Seam over the OS process table. Snapshots are taken fresh on every call
/// and never cached across invocations.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessEnumerator {
    /// Point-in-time snapshot of every process visible to the caller.
    fn snapshot(&mut self) -> Vec<ProcessRecord>;

    /// Forcefully terminates `pid` and blocks until the process is confirmed
    /// exited. A process that is already gone counts as success.
    fn terminate(&mut self, pid: u32) -> Result<(), ProcessError>;
}

/// Production enumerator backed by [`sysinfo::System`].
#[derive(Default)]
pub struct SystemProcesses {
    system: System,
}

impl SystemProcesses {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessEnumerator for SystemProcesses {
    fn snapshot(&mut self) -> Vec<ProcessRecord> {
        self.system
            .refresh_processes_specifics(ProcessRefreshKind::new().with_exe(UpdateKind::Always));
        self.system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessRecord {
                pid: pid.as_u32(),
                exe: process.exe().map(PathBuf::from),
                session_id: process.session_id().map(|sid| sid.as_u32()),
            })
            .collect()
    }

    fn terminate(&mut self, pid: u32) -> Result<(), ProcessError> {
        let sysinfo_pid = Pid::from_u32(pid);
        self.system.refresh_process(sysinfo_pid);
        let Some(process) = self.system.process(sysinfo_pid) else {
            // Exited between snapshot and action; nothing left to do.
            return Ok(());
        };
        if !process.kill() {
            return Err(ProcessError::TerminateDenied(pid));
        }
        process.wait();
        Ok(())
    }
}

/// Returns every process whose executable resolves to exactly `target`.
///
/// Candidates whose identity cannot be resolved are skipped silently; an
/// unavailable identity is never treated as a match and never fails the
/// overall enumeration. Matching is identity-only, never by name or by path
/// string.
pub fn find_matches(
    enumerator: &mut dyn ProcessEnumerator,
    target: &FileIdentity,
) -> Vec<ProcessRecord> {
    enumerator
        .snapshot()
        .into_iter()
        .filter(|record| {
            let Some(exe) = record.exe.as_deref() else {
                return false;
            };
            match FileIdentity::resolve(exe) {
                Ok(identity) => identity == *target,
                Err(err) => {
                    debug!(pid = record.pid, %err, "skipping process candidate");
                    false
                }
            }
        })
        .collect()
}
