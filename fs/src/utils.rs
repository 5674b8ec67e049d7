use std::path::{Component, Path};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum FsError {
    #[error("invalid path: `{0}`")]
    InvalidPath(String),

    #[error("dots disallowed in path `{0}`")]
    DotsDisallowed(String),
}

/// Rejects paths that are not valid unicode or that climb out of their root
/// with `..` components. Destructive operations refuse such paths outright.
pub fn validate_path(path: &Path) -> Result<(), FsError> {
    if path.to_str().is_none() {
        return Err(FsError::InvalidPath(format!(
            "{} is not valid unicode",
            path.to_string_lossy()
        )));
    }
    if path
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(FsError::DotsDisallowed(
            path.to_string_lossy().to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_dir_components_are_rejected() {
        let result = validate_path(Path::new("some/path/../with/../dots"));
        assert!(result.is_err());
        assert_eq!(
            "dots disallowed in path `some/path/../with/../dots`",
            result.unwrap_err().to_string()
        );
    }

    #[test]
    fn test_plain_paths_are_accepted() {
        assert!(validate_path(Path::new("install/dir/profiles")).is_ok());
    }
}
