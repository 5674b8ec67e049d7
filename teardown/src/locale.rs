//! Persists the installer's language choice for the application.

use crate::context::{ActionError, TargetSpec};
use fs::writer_file::FileWriter;
use tracing::{info, warn};

/// Marker file the application reads on startup to pick its UI language.
pub const LOCALE_MARKER_FILE: &str = "lang.config";

/// Writes the locale marker into the install directory so the application's
/// first start comes up in the installer's language. A failed write is
/// absorbed: the application falls back to its own locale detection.
pub fn persist_locale<W: FileWriter>(writer: &W, spec: &TargetSpec) -> Result<(), ActionError> {
    let install_dir = spec.install_dir()?;
    let locale = spec.locale()?;
    let marker = install_dir.join(LOCALE_MARKER_FILE);

    match writer.write(&marker, locale.to_string()) {
        Ok(()) => info!(locale, path = %marker.display(), "locale marker written"),
        Err(err) => warn!(locale, %err, "could not write locale marker"),
    }
    Ok(())
}
