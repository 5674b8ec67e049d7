//! Best-effort shutdown and unregistration of matched processes and
//! services.
//!
//! An uninstall must never fail because one auxiliary process refused to
//! die, so every per-item failure is absorbed into an explicit
//! [`ItemOutcome`] instead of bubbling up. Only a missing required input can
//! fail an action.

use crate::context::{ActionError, TargetSpec};
use crate::identity::FileIdentity;
use crate::process::{self, ProcessEnumerator, ProcessRecord};
use crate::service::{self, ServiceController, ServiceRecord};
use crate::utils::is_elevated::is_elevated;
use tracing::{info, warn};

/// Explicit per-item result of a match-and-act step. Suppression of
/// failures is a design choice and is kept inspectable here rather than
/// hidden in control flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Done { item: String },
    Skipped { item: String, reason: String },
}

/// Aggregated outcomes of one batch operation. The batch as a whole always
/// reports success; skipped items are visible for the audit log only.
#[derive(Debug, Default)]
pub struct BatchReport {
    outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn done(&mut self, item: impl Into<String>) {
        self.outcomes.push(ItemOutcome::Done { item: item.into() });
    }

    pub fn skipped(&mut self, item: impl Into<String>, reason: impl Into<String>) {
        self.outcomes.push(ItemOutcome::Skipped {
            item: item.into(),
            reason: reason.into(),
        });
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    pub fn done_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome, ItemOutcome::Done { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.done_count()
    }

    pub fn log_summary(&self, operation: &str) {
        info!(
            operation,
            done = self.done_count(),
            skipped = self.skipped_count(),
            "batch finished"
        );
        for outcome in &self.outcomes {
            if let ItemOutcome::Skipped { item, reason } = outcome {
                warn!(operation, item, reason, "item skipped");
            }
        }
    }
}

/// Terminates every running instance of the target binary, matched by file
/// identity.
pub fn terminate_processes(
    enumerator: &mut dyn ProcessEnumerator,
    spec: &TargetSpec,
) -> Result<BatchReport, ActionError> {
    let binary_path = spec.binary_path()?;
    let mut report = BatchReport::default();
    let target = match FileIdentity::resolve(binary_path) {
        Ok(target) => target,
        Err(err) => {
            // Without an on-disk binary there is nothing to match against.
            warn!(%err, "target binary identity unavailable, nothing to terminate");
            return Ok(report);
        }
    };

    for record in process::find_matches(enumerator, &target) {
        terminate_record(enumerator, &record, &mut report);
    }
    report.log_summary("terminate-processes");
    Ok(report)
}

/// Terminates GUI instances of the target binary in every interactive login
/// session. Reaching sessions of other users needs an elevated context;
/// without one the kill is still attempted for whatever is visible.
pub fn terminate_gui_processes(
    enumerator: &mut dyn ProcessEnumerator,
    spec: &TargetSpec,
) -> Result<BatchReport, ActionError> {
    let binary_path = spec.binary_path()?;
    match is_elevated() {
        Ok(true) => {}
        Ok(false) => warn!("not elevated, GUI instances of other sessions may survive"),
        Err(err) => warn!(%err, "could not determine elevation"),
    }

    let mut report = BatchReport::default();
    let target = match FileIdentity::resolve(binary_path) {
        Ok(target) => target,
        Err(err) => {
            warn!(%err, "target binary identity unavailable, nothing to terminate");
            return Ok(report);
        }
    };

    for record in process::find_matches(enumerator, &target) {
        // Session 0 instances are the background agent, not the GUI.
        if !record.is_interactive() {
            continue;
        }
        terminate_record(enumerator, &record, &mut report);
    }
    report.log_summary("terminate-gui-processes");
    Ok(report)
}

fn terminate_record(
    enumerator: &mut dyn ProcessEnumerator,
    record: &ProcessRecord,
    report: &mut BatchReport,
) {
    let item = format!("pid {}", record.pid);
    match enumerator.terminate(record.pid) {
        Ok(()) => {
            info!(pid = record.pid, "process terminated");
            report.done(item);
        }
        Err(err) => report.skipped(item, err.to_string()),
    }
}

/// Stops and unregisters every service registration pointing at the target
/// binary. The stop and the unregistration are independent best-effort
/// steps; a failed stop does not prevent the unregistration attempt.
pub fn decommission_services(
    controller: &mut dyn ServiceController,
    records: &[ServiceRecord],
    spec: &TargetSpec,
) -> Result<BatchReport, ActionError> {
    let target_path = spec.binary_path()?.to_string_lossy().to_string();
    let mut report = BatchReport::default();

    for record in service::find_matches(records, &target_path, spec.service_name_prefix()) {
        report.record(decommission_service(controller, &record.name));
    }
    report.log_summary("decommission-services");
    Ok(report)
}

fn decommission_service(controller: &mut dyn ServiceController, name: &str) -> ItemOutcome {
    if let Err(err) = controller.stop_and_wait(name) {
        warn!(service = name, %err, "service stop failed, unregistering anyway");
    }
    match controller.unregister(name) {
        Ok(()) => {
            info!(service = name, "service decommissioned");
            ItemOutcome::Done {
                item: name.to_string(),
            }
        }
        Err(err) => ItemOutcome::Skipped {
            item: name.to_string(),
            reason: err.to_string(),
        },
    }
}

/// Enumerates the installed tunnelmgr services and decommissions the ones
/// matching the target. Enumeration trouble is absorbed: a cleanup that
/// cannot see the service registry has nothing to act on.
#[cfg(target_family = "windows")]
pub fn decommission_installed_services(spec: &TargetSpec) -> Result<BatchReport, ActionError> {
    use crate::service::scm::{enumerate_product_services, ScManager};

    let records = match enumerate_product_services() {
        Ok(records) => records,
        Err(err) => {
            warn!(%err, "service enumeration failed, skipping service cleanup");
            return Ok(BatchReport::default());
        }
    };
    decommission_services(&mut ScManager::new(), &records, spec)
}

////////////////////////////////////////////////////////////////////////////////////
// TESTS
////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{MockProcessEnumerator, ProcessError};
    use crate::service::{MockServiceController, ServiceError, ServiceRuntimeState};
    use assert_matches::assert_matches;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::fs::write;
    use std::path::PathBuf;

    fn spec_for(binary: &std::path::Path) -> TargetSpec {
        TargetSpec::default().with_binary_path(binary)
    }

    fn running_service(name: &str, command_line: &str) -> ServiceRecord {
        ServiceRecord {
            name: name.to_string(),
            command_line: command_line.to_string(),
            state: ServiceRuntimeState::Running,
        }
    }

    #[test]
    fn test_missing_binary_path_is_fatal() {
        let mut enumerator = MockProcessEnumerator::new();

        let result = terminate_processes(&mut enumerator, &TargetSpec::default());

        assert_matches!(result, Err(ActionError::MissingInput(_)));
    }

    #[test]
    fn test_one_failed_kill_does_not_stop_the_batch() {
        let tempdir = tempfile::tempdir().unwrap();
        let binary = tempdir.path().join("tunnelmgr.exe");
        write(&binary, b"binary").unwrap();
        let exe = binary.clone();

        let mut enumerator = MockProcessEnumerator::new();
        enumerator.expect_snapshot().return_once(move || {
            [100, 101]
                .map(|pid| ProcessRecord {
                    pid,
                    exe: Some(exe.clone()),
                    session_id: Some(1),
                })
                .to_vec()
        });
        enumerator
            .expect_terminate()
            .with(eq(100u32))
            .return_once(|_| Err(ProcessError::TerminateDenied(100)));
        enumerator
            .expect_terminate()
            .with(eq(101u32))
            .return_once(|_| Ok(()));

        let report = terminate_processes(&mut enumerator, &spec_for(&binary)).unwrap();

        assert_eq!(report.done_count(), 1);
        assert_eq!(report.skipped_count(), 1);
    }

    #[test]
    fn test_unresolvable_target_terminates_nothing() {
        let mut enumerator = MockProcessEnumerator::new();
        let spec = spec_for(&PathBuf::from("/does/not/exist/tunnelmgr.exe"));

        let report = terminate_processes(&mut enumerator, &spec).unwrap();

        assert_eq!(report.outcomes().len(), 0);
    }

    #[test]
    fn test_gui_kill_spares_the_service_session() {
        let tempdir = tempfile::tempdir().unwrap();
        let binary = tempdir.path().join("tunnelmgr.exe");
        write(&binary, b"binary").unwrap();
        let exe = binary.clone();

        let mut enumerator = MockProcessEnumerator::new();
        enumerator.expect_snapshot().return_once(move || {
            vec![
                ProcessRecord {
                    pid: 40,
                    exe: Some(exe.clone()),
                    session_id: Some(0),
                },
                ProcessRecord {
                    pid: 41,
                    exe: Some(exe.clone()),
                    session_id: Some(2),
                },
            ]
        });
        enumerator
            .expect_terminate()
            .with(eq(41u32))
            .once()
            .return_once(|_| Ok(()));

        let report = terminate_gui_processes(&mut enumerator, &spec_for(&binary)).unwrap();

        assert_eq!(report.done_count(), 1);
    }

    #[test]
    fn test_failed_stop_still_attempts_unregistration() {
        let records = [running_service("tunnelmgr_main", r"C:\Prog\tunnelmgr.exe -c main")];
        let spec = TargetSpec::default().with_binary_path(r"C:\Prog\tunnelmgr.exe");

        let mut controller = MockServiceController::new();
        let mut sequence = Sequence::new();
        controller
            .expect_stop_and_wait()
            .with(eq("tunnelmgr_main"))
            .once()
            .in_sequence(&mut sequence)
            .return_once(|name| {
                Err(ServiceError::Stop(name.to_string(), "timeout".to_string()))
            });
        controller
            .expect_unregister()
            .with(eq("tunnelmgr_main"))
            .once()
            .in_sequence(&mut sequence)
            .return_once(|_| Ok(()));

        let report = decommission_services(&mut controller, &records, &spec).unwrap();

        assert_eq!(report.done_count(), 1);
        assert_eq!(report.skipped_count(), 0);
    }

    #[test]
    fn test_unmatched_services_are_left_alone() {
        let records = [
            running_service("tunnelmgr_main", r"C:\Prog\tunnelmgr.exe"),
            running_service("OtherSvc", r"C:\Other\daemon.exe"),
        ];
        let spec = TargetSpec::default()
            .with_binary_path(r"C:\Prog\tunnelmgr.exe")
            .with_service_name_prefix("tunnelmgr_");

        let mut controller = MockServiceController::new();
        controller
            .expect_stop_and_wait()
            .with(eq("tunnelmgr_main"))
            .once()
            .return_once(|_| Ok(()));
        controller
            .expect_unregister()
            .with(eq("tunnelmgr_main"))
            .once()
            .return_once(|_| Ok(()));

        let report = decommission_services(&mut controller, &records, &spec).unwrap();

        assert_eq!(report.done_count(), 1);
    }
}
