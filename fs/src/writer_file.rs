use super::utils::{validate_path, FsError};
use super::LocalFile;
use std::io::Write;
use std::path::Path;
use std::{fs, io};
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("error creating file: {0}")]
    ErrorCreatingFile(#[from] io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(#[from] FsError),
}

pub trait FileWriter {
    fn write(&self, path: &Path, buf: String) -> Result<(), WriteError>;
}

impl FileWriter for LocalFile {
    #[instrument(skip_all, fields(path = %path.display()))]
    fn write(&self, path: &Path, content: String) -> Result<(), WriteError> {
        validate_path(path)?;

        let mut file_options = fs::OpenOptions::new();
        file_options.create(true).write(true).truncate(true);

        file_options.open(path)?.write_all(content.as_bytes())?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////
// Mock
////////////////////////////////////////////////////////////////////////////////////
#[cfg(feature = "mocks")]
pub mod mock {
    use super::*;
    use mockall::{mock, predicate};
    use std::io::ErrorKind;
    use std::path::PathBuf;

    mock! {
        pub FileWriter {}

        impl FileWriter for FileWriter {
            fn write(&self, path: &Path, buf: String) -> Result<(), WriteError>;
        }
    }

    impl MockFileWriter {
        pub fn should_write(&mut self, path: &Path, content: String) {
            let path_clone = PathBuf::from(path);
            self.expect_write()
                .with(predicate::eq(path_clone), predicate::eq(content))
                .once()
                .returning(|_, _| Ok(()));
        }

        pub fn should_not_write(&mut self, path: &Path) {
            let path_clone = PathBuf::from(path);
            self.expect_write()
                .with(predicate::eq(path_clone), predicate::always())
                .once()
                .returning(|_, _| {
                    Err(WriteError::ErrorCreatingFile(io::Error::from(
                        ErrorKind::PermissionDenied,
                    )))
                });
        }
    }
}
