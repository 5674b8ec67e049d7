//! Matching of installed services against the target binary path.
//!
//! A service's registered command line cannot be opened as a live file
//! handle the way a running process's executable can, so matching here is
//! *normalized-string* based. That is strictly weaker than the identity
//! matching in [`crate::process`] and is kept explicitly separate: string
//! matching is documented as a heuristic, not silently promoted to
//! identity-equivalence.

#[cfg(target_family = "windows")]
pub mod scm;

use thiserror::Error;

/// Name prefix used by service registrations of the previous product
/// generation.
pub const LEGACY_SERVICE_PREFIX: &str = "TUNNEL$";
/// Name prefix used by current service registrations.
pub const SERVICE_PREFIX: &str = "tunnelmgr_";

/// Coarse runtime state of a registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRuntimeState {
    Running,
    Stopped,
    Other,
}

/// A service registration as read from the OS service registry. This crate
/// only reads and eventually deletes entries, never creates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub name: String,
    pub command_line: String,
    pub state: ServiceRuntimeState,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("could not connect to the service manager: {0}")]
    Manager(String),

    #[error("could not enumerate services: {0}")]
    Enumerate(String),

    #[error("service `{0}` could not be stopped: {1}")]
    Stop(String, String),

    #[error("service `{0}` could not be unregistered: {1}")]
    Unregister(String, String),
}

/// Seam over the OS service manager for the decommission steps.
#[cfg_attr(test, mockall::automock)]
pub trait ServiceController {
    /// Requests a stop and waits for the stopped state. A service that is
    /// already stopped or already gone counts as success.
    fn stop_and_wait(&mut self, name: &str) -> Result<(), ServiceError>;

    /// Removes the registration from the service registry. An absent
    /// registration counts as success.
    fn unregister(&mut self, name: &str) -> Result<(), ServiceError>;
}

/// Whether `name` belongs to either product generation of tunnelmgr service
/// registrations.
pub fn matches_generation(name: &str) -> bool {
    starts_with_ignore_case(name, LEGACY_SERVICE_PREFIX)
        || starts_with_ignore_case(name, SERVICE_PREFIX)
}

/// Whether a registered service points at `target_path`.
///
/// The registry stores command lines with optional quoting and trailing
/// arguments, so two candidate forms of the stored string are compared
/// case-insensitively against the target: the command line truncated to the
/// target's length, and the same with a one-character offset to absorb a
/// leading quote. This dual-prefix comparison survives the two formatting
/// variations observed in practice; it can over- or under-match on
/// pathological inputs and is a documented limitation, not to be widened
/// without new requirements.
///
/// A non-empty `name_prefix` additionally requires the service name to start
/// with it, scoping the match to one product generation.
pub fn matches_target(record: &ServiceRecord, target_path: &str, name_prefix: &str) -> bool {
    if !name_prefix.is_empty() && !starts_with_ignore_case(&record.name, name_prefix) {
        return false;
    }
    let target_chars = target_path.chars().count();
    [0usize, 1].into_iter().any(|skip| {
        truncate_chars(&record.command_line, skip, target_chars)
            .is_some_and(|candidate| eq_ignore_case(&candidate, target_path))
    })
}

/// Filters a service snapshot down to the registrations matching the target
/// path and optional name prefix.
pub fn find_matches<'a>(
    records: &'a [ServiceRecord],
    target_path: &str,
    name_prefix: &str,
) -> Vec<&'a ServiceRecord> {
    records
        .iter()
        .filter(|record| matches_target(record, target_path, name_prefix))
        .collect()
}

fn truncate_chars(value: &str, skip: usize, len: usize) -> Option<String> {
    let chars: Vec<char> = value.chars().skip(skip).collect();
    if chars.len() < len {
        return None;
    }
    Some(chars[..len].iter().collect())
}

fn eq_ignore_case(left: &str, right: &str) -> bool {
    left.to_lowercase() == right.to_lowercase()
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    truncate_chars(value, 0, prefix.chars().count())
        .is_some_and(|head| eq_ignore_case(&head, prefix))
}

////////////////////////////////////////////////////////////////////////////////////
// TESTS
////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(name: &str, command_line: &str) -> ServiceRecord {
        ServiceRecord {
            name: name.to_string(),
            command_line: command_line.to_string(),
            state: ServiceRuntimeState::Running,
        }
    }

    #[rstest]
    #[case::unquoted_with_args(r"C:\Prog\app.exe --flag", true)]
    #[case::quoted_with_args(r#""C:\Prog\app.exe" --flag"#, true)]
    #[case::exact(r"C:\Prog\app.exe", true)]
    #[case::case_insensitive(r"c:\prog\APP.EXE -c main.conf", true)]
    #[case::other_binary(r"C:\Other\app.exe --flag", false)]
    #[case::shorter_than_target(r"C:\Prog", false)]
    fn test_command_line_matching(#[case] command_line: &str, #[case] expected: bool) {
        let record = record("TUNNEL$main", command_line);

        assert_eq!(
            matches_target(&record, r"C:\Prog\app.exe", ""),
            expected
        );
    }

    #[test]
    fn test_name_prefix_scopes_matches_to_one_generation() {
        let records = [
            record("Svc1", r"C:\Prog\app.exe"),
            record("OtherSvc", r"C:\Prog\app.exe"),
        ];

        let matched = find_matches(&records, r"C:\Prog\app.exe", "Svc");

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name, "Svc1");
    }

    #[test]
    fn test_empty_prefix_matches_any_name() {
        let records = [
            record("TUNNEL$main", r#""C:\Prog\app.exe" -c main.conf"#),
            record("tunnelmgr_edge", r"C:\Prog\app.exe -c edge.conf"),
        ];

        assert_eq!(find_matches(&records, r"C:\Prog\app.exe", "").len(), 2);
    }

    #[rstest]
    #[case("TUNNEL$main", true)]
    #[case("tunnel$legacy", true)]
    #[case("Tunnelmgr_edge", true)]
    #[case("OtherSvc", false)]
    fn test_generation_prefixes(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(matches_generation(name), expected);
    }
}
