//! Filesystem-level identity of a binary, stable across path aliasing.
//!
//! Two paths denote the same file on disk iff their [`FileIdentity`] tuples
//! are equal. This is the strong form of matching used for processes; string
//! comparison of paths is never trusted when a live handle can be obtained.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Volume serial number plus file index, the pair that uniquely identifies a
/// file within a volume. Survives hard links, relative paths and drive
/// substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    volume_serial: u64,
    file_index: u64,
}

/// A path whose identity could not be read. Deliberately a distinct outcome
/// from "not a match": a candidate with unavailable identity is skipped,
/// never matched, and never compared as a zeroed tuple.
#[derive(Debug, Error)]
#[error("file identity unavailable for `{path}`: {source}")]
pub struct IdentityUnavailable {
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl FileIdentity {
    /// Opens `path` for attribute-only access, reads back the identity tuple
    /// and closes the handle immediately. No read or write access is
    /// requested, so this succeeds even while another process holds the file
    /// open. Any failure to open or query yields [`IdentityUnavailable`];
    /// the result is never partially populated.
    pub fn resolve(path: &Path) -> Result<Self, IdentityUnavailable> {
        Self::read_identity(path).map_err(|source| IdentityUnavailable {
            path: path.to_path_buf(),
            source,
        })
    }

    #[cfg(target_family = "unix")]
    fn read_identity(path: &Path) -> io::Result<Self> {
        use std::os::unix::fs::MetadataExt;

        let metadata = std::fs::metadata(path)?;
        Ok(Self {
            volume_serial: metadata.dev(),
            file_index: metadata.ino(),
        })
    }

    #[cfg(target_family = "windows")]
    fn read_identity(path: &Path) -> io::Result<Self> {
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Foundation::{CloseHandle, INVALID_HANDLE_VALUE};
        use windows_sys::Win32::Storage::FileSystem::{
            CreateFileW, GetFileInformationByHandle, BY_HANDLE_FILE_INFORMATION,
            FILE_ATTRIBUTE_NORMAL, FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE,
            OPEN_EXISTING,
        };

        let wide_path: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        unsafe {
            // Zero desired access: the handle can only query attributes, so
            // the open works regardless of locks held by the running agent.
            let handle = CreateFileW(
                wide_path.as_ptr(),
                0,
                FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                std::ptr::null(),
                OPEN_EXISTING,
                FILE_ATTRIBUTE_NORMAL,
                std::ptr::null_mut(),
            );
            if handle == INVALID_HANDLE_VALUE {
                return Err(io::Error::last_os_error());
            }

            let mut info: BY_HANDLE_FILE_INFORMATION = std::mem::zeroed();
            let queried = GetFileInformationByHandle(handle, &mut info);
            CloseHandle(handle);
            if queried == 0 {
                return Err(io::Error::last_os_error());
            }

            Ok(Self {
                volume_serial: u64::from(info.dwVolumeSerialNumber),
                file_index: (u64::from(info.nFileIndexHigh) << 32)
                    | u64::from(info.nFileIndexLow),
            })
        }
    }
}
