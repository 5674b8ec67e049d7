use super::utils::{validate_path, FsError};
use std::fs::{metadata, read_dir, remove_dir_all, set_permissions, DirBuilder};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum DirectoryManagementError {
    #[error("cannot create directory '{0}': {1}")]
    ErrorCreatingDirectory(String, String),

    #[error("cannot delete directory '{0}': {1}")]
    ErrorDeletingDirectory(String, String),

    #[error("invalid directory: {0}")]
    InvalidDirectory(#[from] FsError),
}

pub trait DirectoryManager {
    /// Creates the directory and any missing parents.
    fn create(&self, path: &Path) -> Result<(), DirectoryManagementError>;

    /// Deletes the directory and its contents. An absent directory is
    /// success.
    fn delete(&self, path: &Path) -> Result<(), DirectoryManagementError>;

    /// Deletes the directory tree after stripping read-only attributes from
    /// every entry, so a tree the standard delete gives up on can still be
    /// reclaimed.
    fn delete_forced(&self, path: &Path) -> Result<(), DirectoryManagementError>;
}

pub struct DirectoryManagerFs;

impl DirectoryManager for DirectoryManagerFs {
    fn create(&self, path: &Path) -> Result<(), DirectoryManagementError> {
        validate_path(path)?;
        let mut directory_builder = DirBuilder::new();
        directory_builder.recursive(true);
        directory_builder.create(path).map_err(|e| {
            DirectoryManagementError::ErrorCreatingDirectory(
                path.to_string_lossy().to_string(),
                e.to_string(),
            )
        })
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn delete(&self, path: &Path) -> Result<(), DirectoryManagementError> {
        validate_path(path)?;
        if !path.exists() {
            return Ok(());
        }
        remove_dir_all(path).map_err(|e| {
            DirectoryManagementError::ErrorDeletingDirectory(
                path.to_string_lossy().to_string(),
                e.to_string(),
            )
        })
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn delete_forced(&self, path: &Path) -> Result<(), DirectoryManagementError> {
        validate_path(path)?;
        if !path.exists() {
            return Ok(());
        }
        strip_readonly_recursive(path)
            .and_then(|_| remove_dir_all(path))
            .map_err(|e| {
                DirectoryManagementError::ErrorDeletingDirectory(
                    path.to_string_lossy().to_string(),
                    e.to_string(),
                )
            })
    }
}

fn strip_readonly_recursive(path: &Path) -> io::Result<()> {
    for entry in read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            strip_readonly_recursive(&entry_path)?;
            continue;
        }
        let mut permissions = metadata(&entry_path)?.permissions();
        if permissions.readonly() {
            make_writable(&mut permissions);
            set_permissions(&entry_path, permissions)?;
        }
    }
    Ok(())
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
        pub DirectoryManager {}

        impl DirectoryManager for DirectoryManager {
            fn create(&self, path: &Path) -> Result<(), DirectoryManagementError>;
            fn delete(&self, path: &Path) -> Result<(), DirectoryManagementError>;
            fn delete_forced(&self, path: &Path) -> Result<(), DirectoryManagementError>;
        }
    }
}
