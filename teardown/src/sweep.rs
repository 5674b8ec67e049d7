//! Escalating deletion of files and directory trees that may still be
//! locked.
//!
//! Deletion trades strict correctness for uninstall robustness: an absent
//! target is success, a stubborn one escalates from a standard delete to a
//! forced delete and finally to an injected operator decision. Leaving a
//! stray empty directory behind is better than aborting the uninstall.

use crate::context::{ActionError, TargetSpec};
use crate::decommission::{BatchReport, ItemOutcome};
use fs::directory_manager::DirectoryManager;
use fs::file_deleter::FileDeleter;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Files written by the application next to the binary.
pub const APP_STATE_FILES: [&str; 2] = ["app.json", "lang.config"];

/// Data directories and the file extension each one accumulates.
const RESIDUE_DIRS: [(&str, &str); 2] = [("profiles", "conf"), ("logs", "log")];

/// Operator's answer when an item resists both delete attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteDecision {
    Retry,
    GiveUp,
}

/// Decision point reached after the standard and the forced delete both
/// failed. Injected so the escalation is testable without an interactive
/// prompt; implementations may ask a human, retry on a timer, or give up
/// immediately.
#[cfg_attr(test, mockall::automock)]
pub trait DeletePrompt {
    fn locked(&mut self, path: &Path, attempt: usize) -> DeleteDecision;
}

/// Retries a fixed number of times with a pause in between, then gives up.
/// Stands in for the operator during unattended uninstalls.
pub struct AutoRetry {
    attempts: usize,
    interval: Duration,
}

impl AutoRetry {
    pub fn new(attempts: usize, interval: Duration) -> Self {
        Self { attempts, interval }
    }
}

impl DeletePrompt for AutoRetry {
    fn locked(&mut self, path: &Path, attempt: usize) -> DeleteDecision {
        if attempt >= self.attempts {
            return DeleteDecision::GiveUp;
        }
        debug!(path = %path.display(), attempt, "delete blocked, retrying");
        std::thread::sleep(self.interval);
        DeleteDecision::Retry
    }
}

/// Accepts the leftover on the first failure.
pub struct NeverRetry;

impl DeletePrompt for NeverRetry {
    fn locked(&mut self, _path: &Path, _attempt: usize) -> DeleteDecision {
        DeleteDecision::GiveUp
    }
}

/// Destructive filesystem cleanup with the escalation policy applied per
/// item: standard delete, forced delete, operator decision.
pub struct Sweeper<'a> {
    files: &'a dyn FileDeleter,
    directories: &'a dyn DirectoryManager,
    prompt: &'a mut dyn DeletePrompt,
}

impl<'a> Sweeper<'a> {
    pub fn new(
        files: &'a dyn FileDeleter,
        directories: &'a dyn DirectoryManager,
        prompt: &'a mut dyn DeletePrompt,
    ) -> Self {
        Self {
            files,
            directories,
            prompt,
        }
    }

    /// Deletes a single file. Absent is success.
    pub fn delete_file(&mut self, path: &Path) -> ItemOutcome {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match self.files.delete(path) {
                Ok(()) => return done(path),
                Err(standard_err) => match self.files.delete_forced(path) {
                    Ok(()) => {
                        debug!(path = %path.display(), %standard_err, "forced delete succeeded");
                        return done(path);
                    }
                    Err(forced_err) => forced_err,
                },
            };
            match self.prompt.locked(path, attempt) {
                DeleteDecision::Retry => continue,
                DeleteDecision::GiveUp => return skipped(path, failure.to_string()),
            }
        }
    }

    /// Deletes a whole directory tree. Absent is success.
    pub fn delete_tree(&mut self, path: &Path) -> ItemOutcome {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match self.directories.delete(path) {
                Ok(()) => return done(path),
                Err(standard_err) => match self.directories.delete_forced(path) {
                    Ok(()) => {
                        debug!(path = %path.display(), %standard_err, "forced delete succeeded");
                        return done(path);
                    }
                    Err(forced_err) => forced_err,
                },
            };
            match self.prompt.locked(path, attempt) {
                DeleteDecision::Retry => continue,
                DeleteDecision::GiveUp => return skipped(path, failure.to_string()),
            }
        }
    }
}

fn done(path: &Path) -> ItemOutcome {
    ItemOutcome::Done {
        item: path.to_string_lossy().to_string(),
    }
}

fn skipped(path: &Path, reason: String) -> ItemOutcome {
    warn!(path = %path.display(), reason, "leaving item behind");
    ItemOutcome::Skipped {
        item: path.to_string_lossy().to_string(),
        reason,
    }
}

/// Removes everything the application wrote into the install directory:
/// state files next to the binary, accumulated profile and log files, then
/// the directories themselves.
pub fn remove_residue(
    sweeper: &mut Sweeper<'_>,
    spec: &TargetSpec,
) -> Result<BatchReport, ActionError> {
    let install_dir = spec.install_dir()?;
    let mut report = BatchReport::default();

    for file in APP_STATE_FILES {
        report.record(sweeper.delete_file(&install_dir.join(file)));
    }
    for (dir, extension) in RESIDUE_DIRS {
        let dir_path = install_dir.join(dir);
        for file_path in files_with_extension(&dir_path, extension) {
            report.record(sweeper.delete_file(&file_path));
        }
        report.record(sweeper.delete_tree(&dir_path));
    }
    report.log_summary("remove-residue");
    Ok(report)
}

fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        // Absent or unreadable directory: the tree delete will handle it.
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        })
        .collect();
    paths.sort();
    paths
}
