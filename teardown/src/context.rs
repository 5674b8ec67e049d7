//! The opaque per-action input handed over by the installer engine.
//!
//! The engine only knows how to pass a flat key-value blob; everything the
//! teardown logic needs is projected into a [`TargetSpec`] so the core stays
//! independent of how and when it is invoked.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Context key carrying the absolute path of the installed agent binary.
pub const BINARY_PATH_KEY: &str = "BinaryPath";
/// Context key carrying the installation directory.
pub const INSTALL_DIR_KEY: &str = "InstallDir";
/// Context key carrying the installer locale name (e.g. `zh-CN`).
pub const LOCALE_KEY: &str = "Locale";
/// Context key narrowing service matching to one product generation.
pub const SERVICE_PREFIX_KEY: &str = "ServicePrefix";

#[derive(Debug, Error)]
pub enum ActionError {
    /// The only fatal outcome of an action: the engine did not supply a
    /// required input, so no side effect is attempted.
    #[error("required input `{0}` missing from the installer context")]
    MissingInput(&'static str),
}

/// The single external input of every teardown stage.
#[derive(Debug, Clone, Default)]
pub struct TargetSpec {
    binary_path: Option<PathBuf>,
    install_dir: Option<PathBuf>,
    locale: Option<String>,
    service_name_prefix: Option<String>,
}

impl TargetSpec {
    /// Builds a spec from the raw `KEY=value` entries of the installer
    /// context. Unknown keys are ignored, empty values count as absent.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut spec = TargetSpec::default();
        for pair in pairs {
            let Some((key, value)) = pair.as_ref().split_once('=') else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            match key {
                k if k == BINARY_PATH_KEY => spec.binary_path = Some(PathBuf::from(value)),
                k if k == INSTALL_DIR_KEY => spec.install_dir = Some(PathBuf::from(value)),
                k if k == LOCALE_KEY => spec.locale = Some(value.to_string()),
                k if k == SERVICE_PREFIX_KEY => {
                    spec.service_name_prefix = Some(value.to_string())
                }
                _ => {}
            }
        }
        spec
    }

    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_path = Some(path.into());
        self
    }

    pub fn with_install_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(path.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_service_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.service_name_prefix = Some(prefix.into());
        self
    }

    pub fn binary_path(&self) -> Result<&Path, ActionError> {
        self.binary_path
            .as_deref()
            .ok_or(ActionError::MissingInput(BINARY_PATH_KEY))
    }

    pub fn install_dir(&self) -> Result<&Path, ActionError> {
        self.install_dir
            .as_deref()
            .ok_or(ActionError::MissingInput(INSTALL_DIR_KEY))
    }

    pub fn locale(&self) -> Result<&str, ActionError> {
        self.locale
            .as_deref()
            .ok_or(ActionError::MissingInput(LOCALE_KEY))
    }

    /// The optional service-name filter. Empty means "match any name".
    pub fn service_name_prefix(&self) -> &str {
        self.service_name_prefix.as_deref().unwrap_or_default()
    }
}
