use crate::LocalFile;
use std::fs::{metadata, remove_file, set_permissions};
use std::io;
use std::path::Path;
use tracing::instrument;

pub trait FileDeleter {
    /// Removes a single file. An already-absent path is success, not an
    /// error; uninstall must be re-runnable.
    fn delete(&self, file_path: &Path) -> io::Result<()>;

    /// Removes a file after clearing a read-only attribute that would make
    /// the standard delete fail.
    fn delete_forced(&self, file_path: &Path) -> io::Result<()>;
}

impl FileDeleter for LocalFile {
    #[instrument(skip_all, fields(path = %file_path.display()))]
    fn delete(&self, file_path: &Path) -> io::Result<()> {
        match remove_file(file_path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    #[instrument(skip_all, fields(path = %file_path.display()))]
    fn delete_forced(&self, file_path: &Path) -> io::Result<()> {
        match metadata(file_path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
            Ok(meta) => {
                let mut permissions = meta.permissions();
                if permissions.readonly() {
                    make_writable(&mut permissions);
                    set_permissions(file_path, permissions)?;
                }
            }
        }
        match remove_file(file_path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(target_family = "unix")]
fn make_writable(permissions: &mut std::fs::Permissions) {
    use std::os::unix::fs::PermissionsExt;
    permissions.set_mode(permissions.mode() | 0o200);
}

#[cfg(target_family = "windows")]
fn make_writable(permissions: &mut std::fs::Permissions) {
    permissions.set_readonly(false);
}

////////////////////////////////////////////////////////////////////////////////////
// Mock
////////////////////////////////////////////////////////////////////////////////////
#[cfg(feature = "mocks")]
pub mod mock {
    use super::*;
    use mockall::mock;

    mock! {
        pub FileDeleter {}

        impl FileDeleter for FileDeleter {
            fn delete(&self, file_path: &Path) -> io::Result<()>;
            fn delete_forced(&self, file_path: &Path) -> io::Result<()>;
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////
// TESTS
////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
pub mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_delete_missing_file_is_success() {
        let deleter = LocalFile;
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("never-created.conf");

        assert!(deleter.delete(&path).is_ok());
        assert!(deleter.delete(&path).is_ok());
    }

    #[test]
    fn test_delete_removes_existing_file() {
        let deleter = LocalFile;
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("app.json");
        File::create(&path).unwrap();

        assert!(deleter.delete(&path).is_ok());
        assert!(!path.exists());
    }

    #[test]
    fn test_forced_delete_clears_readonly_attribute() {
        let deleter = LocalFile;
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("main.conf");
        File::create(&path).unwrap();
        let mut permissions = metadata(&path).unwrap().permissions();
        permissions.set_readonly(true);
        set_permissions(&path, permissions).unwrap();

        assert!(deleter.delete_forced(&path).is_ok());
        assert!(!path.exists());
    }
}
