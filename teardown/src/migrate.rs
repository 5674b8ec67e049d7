//! One-shot migration of legacy profile files into the current layout.
//!
//! Earlier releases kept tunnel profiles as `*.ini` files next to the
//! binary; the application now reads `profiles/*.conf`. Run during an
//! upgrade, before the old version's residue is swept.

use crate::context::{ActionError, TargetSpec};
use crate::decommission::BatchReport;
use fs::directory_manager::DirectoryManager;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory holding the application's tunnel profiles.
pub const PROFILES_DIR: &str = "profiles";
const LEGACY_EXTENSION: &str = "ini";
const PROFILE_EXTENSION: &str = "conf";

/// Moves every legacy `*.ini` profile from the install root and from the
/// profiles directory into `profiles/*.conf`. Each file is migrated
/// independently; a file that cannot be moved is skipped and stays where it
/// was. An existing destination is never overwritten.
pub fn migrate_profiles(
    directories: &dyn DirectoryManager,
    spec: &TargetSpec,
) -> Result<BatchReport, ActionError> {
    let install_dir = spec.install_dir()?;
    let profiles_dir = install_dir.join(PROFILES_DIR);
    let mut report = BatchReport::default();

    if let Err(err) = directories.create(&profiles_dir) {
        warn!(%err, "could not create the profiles directory, nothing to migrate into");
        report.log_summary("migrate-profiles");
        return Ok(report);
    }

    for source in legacy_profiles(install_dir)
        .into_iter()
        .chain(legacy_profiles(&profiles_dir))
    {
        migrate_profile(&source, &profiles_dir, &mut report);
    }
    report.log_summary("migrate-profiles");
    Ok(report)
}

fn migrate_profile(source: &Path, profiles_dir: &Path, report: &mut BatchReport) {
    let item = source.to_string_lossy().to_string();
    // Swap only the final extension so dotted names keep their full stem.
    let renamed = source.with_extension(PROFILE_EXTENSION);
    let Some(file_name) = renamed.file_name() else {
        report.skipped(item, "file has no name");
        return;
    };
    let destination = profiles_dir.join(file_name);
    if destination.exists() {
        report.skipped(item, "destination already exists");
        return;
    }
    match std::fs::rename(source, &destination) {
        Ok(()) => {
            info!(from = %source.display(), to = %destination.display(), "profile migrated");
            report.done(item);
        }
        Err(err) => report.skipped(item, err.to_string()),
    }
}

fn legacy_profiles(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(LEGACY_EXTENSION))
        })
        .collect();
    paths.sort();
    paths
}

////////////////////////////////////////////////////////////////////////////////////
// TESTS
////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use fs::directory_manager::DirectoryManagerFs;
    use std::fs::{create_dir_all, read_to_string, write};

    #[test]
    fn test_legacy_profiles_move_into_the_profiles_dir() {
        let tempdir = tempfile::tempdir().unwrap();
        let install_dir = tempdir.path();
        write(install_dir.join("main.ini"), "[common]\nserver_addr = a").unwrap();
        write(install_dir.join("edge.ini"), "[common]\nserver_addr = b").unwrap();
        write(install_dir.join("app.json"), "{}").unwrap();

        let spec = TargetSpec::default().with_install_dir(install_dir);
        let report = migrate_profiles(&DirectoryManagerFs, &spec).unwrap();

        assert_eq!(report.done_count(), 2);
        assert_eq!(report.skipped_count(), 0);
        assert!(!install_dir.join("main.ini").exists());
        assert_eq!(
            read_to_string(install_dir.join("profiles").join("main.conf")).unwrap(),
            "[common]\nserver_addr = a"
        );
        // Unrelated files stay untouched.
        assert!(install_dir.join("app.json").exists());
    }

    #[test]
    fn test_ini_files_already_under_profiles_are_renamed() {
        let tempdir = tempfile::tempdir().unwrap();
        let profiles = tempdir.path().join(PROFILES_DIR);
        create_dir_all(&profiles).unwrap();
        write(profiles.join("main.ini"), "[common]").unwrap();

        let spec = TargetSpec::default().with_install_dir(tempdir.path());
        let report = migrate_profiles(&DirectoryManagerFs, &spec).unwrap();

        assert_eq!(report.done_count(), 1);
        assert!(!profiles.join("main.ini").exists());
        assert!(profiles.join("main.conf").exists());
    }

    #[test]
    fn test_dotted_profile_names_keep_their_full_stem() {
        let tempdir = tempfile::tempdir().unwrap();
        let install_dir = tempdir.path();
        write(install_dir.join("edge.v2.ini"), "[common]\nserver_addr = a").unwrap();
        write(install_dir.join("edge.v3.ini"), "[common]\nserver_addr = b").unwrap();

        let spec = TargetSpec::default().with_install_dir(install_dir);
        let report = migrate_profiles(&DirectoryManagerFs, &spec).unwrap();

        assert_eq!(report.done_count(), 2);
        assert_eq!(report.skipped_count(), 0);
        let profiles = install_dir.join(PROFILES_DIR);
        assert_eq!(
            read_to_string(profiles.join("edge.v2.conf")).unwrap(),
            "[common]\nserver_addr = a"
        );
        assert_eq!(
            read_to_string(profiles.join("edge.v3.conf")).unwrap(),
            "[common]\nserver_addr = b"
        );
    }

    #[test]
    fn test_existing_destination_is_not_overwritten() {
        let tempdir = tempfile::tempdir().unwrap();
        let install_dir = tempdir.path();
        let profiles = install_dir.join(PROFILES_DIR);
        create_dir_all(&profiles).unwrap();
        write(install_dir.join("main.ini"), "old content").unwrap();
        write(profiles.join("main.conf"), "new content").unwrap();

        let spec = TargetSpec::default().with_install_dir(install_dir);
        let report = migrate_profiles(&DirectoryManagerFs, &spec).unwrap();

        assert_eq!(report.done_count(), 0);
        assert_eq!(report.skipped_count(), 1);
        assert!(install_dir.join("main.ini").exists());
        assert_eq!(
            read_to_string(profiles.join("main.conf")).unwrap(),
            "new content"
        );
    }

    #[test]
    fn test_nothing_to_migrate_is_an_empty_report() {
        let tempdir = tempfile::tempdir().unwrap();
        let spec = TargetSpec::default().with_install_dir(tempdir.path());

        let report = migrate_profiles(&DirectoryManagerFs, &spec).unwrap();

        assert_eq!(report.outcomes().len(), 0);
        assert!(tempdir.path().join(PROFILES_DIR).exists());
    }

    #[test]
    fn test_missing_install_dir_is_fatal() {
        let result = migrate_profiles(&DirectoryManagerFs, &TargetSpec::default());

        assert_matches!(result, Err(ActionError::MissingInput(_)));
    }
}
