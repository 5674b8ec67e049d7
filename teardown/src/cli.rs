//! Command line surface of the teardown binary.
//!
//! Every subcommand maps to one installer stage. Batch operations exit
//! successfully even when individual items were skipped; only a missing
//! required input or a broken logging setup fails the process.

use crate::context::{ActionError, TargetSpec};
use crate::decommission::{terminate_gui_processes, terminate_processes};
use crate::instrumentation::{try_init_tracing, TracingConfig, TracingError};
use crate::locale::persist_locale;
use crate::migrate::migrate_profiles;
use crate::process::SystemProcesses;
use crate::sweep::{remove_residue, AutoRetry, Sweeper};
use clap::{Args, Parser, Subcommand};
use fs::directory_manager::DirectoryManagerFs;
use fs::LocalFile;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to initialize logs: {0}")]
    Tracing(#[from] TracingError),

    #[error("failed to start the command: {0}")]
    Precondition(String),
}

impl From<ActionError> for CliError {
    fn from(value: ActionError) -> Self {
        Self::Precondition(value.to_string())
    }
}

impl From<CliError> for ExitCode {
    /// Converts the error to an exit code, following the BSD `sysexits`
    /// convention the installer engine understands.
    fn from(value: CliError) -> Self {
        match value {
            CliError::Precondition(_) => Self::from(69),
            CliError::Tracing(_) => Self::from(70),
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory receiving the teardown audit log. Logging stays on stderr
    /// only when unset.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log filter directives, e.g. `debug` or `tunnelmgr_teardown=trace`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct BinaryArgs {
    /// Absolute path of the installed agent binary.
    #[arg(long)]
    binary_path: PathBuf,
}

#[derive(Args, Debug)]
struct InstallDirArgs {
    /// Root directory of the installation.
    #[arg(long)]
    install_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Terminate every running instance of the agent binary.
    KillProcesses(BinaryArgs),

    /// Terminate GUI instances in interactive login sessions, sparing the
    /// background service.
    KillGuiProcesses(BinaryArgs),

    /// Stop and unregister every service registration pointing at the agent
    /// binary.
    DecommissionServices {
        #[command(flatten)]
        binary: BinaryArgs,

        /// Restrict matching to service names starting with this prefix.
        #[arg(long)]
        service_prefix: Option<String>,
    },

    /// Delete the application's state files, profiles and logs.
    RemoveFiles {
        #[command(flatten)]
        install_dir: InstallDirArgs,

        /// How often to retry an item that resists deletion.
        #[arg(long, default_value_t = 3)]
        retries: usize,

        /// Seconds to wait between retries.
        #[arg(long, default_value_t = 1)]
        retry_interval: u64,
    },

    /// Record the installer's locale for the application's first start.
    SetLocale {
        #[command(flatten)]
        install_dir: InstallDirArgs,

        /// Locale name, e.g. `zh-CN`.
        #[arg(long)]
        locale: String,
    },

    /// Move legacy `*.ini` profiles into the current `profiles/*.conf`
    /// layout.
    MigrateProfiles(InstallDirArgs),
}

impl Cli {
    /// Parses the command line, initializes logging and runs the requested
    /// stage to completion.
    pub fn run() -> Result<(), CliError> {
        let cli = Self::parse();

        let mut tracing_config = TracingConfig::default();
        if let Some(level) = &cli.log_level {
            tracing_config = tracing_config.with_level(level);
        }
        if let Some(dir) = &cli.log_dir {
            tracing_config = tracing_config.with_log_dir(dir);
        }
        let _tracing_guard = try_init_tracing(tracing_config)?;

        cli.command.execute()
    }
}

impl Command {
    fn execute(self) -> Result<(), CliError> {
        match self {
            Command::KillProcesses(binary) => {
                let spec = TargetSpec::default().with_binary_path(binary.binary_path);
                terminate_processes(&mut SystemProcesses::new(), &spec)?;
            }
            Command::KillGuiProcesses(binary) => {
                let spec = TargetSpec::default().with_binary_path(binary.binary_path);
                terminate_gui_processes(&mut SystemProcesses::new(), &spec)?;
            }
            Command::DecommissionServices {
                binary,
                service_prefix,
            } => {
                let mut spec = TargetSpec::default().with_binary_path(binary.binary_path);
                if let Some(prefix) = service_prefix {
                    spec = spec.with_service_name_prefix(prefix);
                }
                decommission_installed_services(&spec)?;
            }
            Command::RemoveFiles {
                install_dir,
                retries,
                retry_interval,
            } => {
                let spec = TargetSpec::default().with_install_dir(install_dir.install_dir);
                let files = LocalFile;
                let directories = DirectoryManagerFs;
                let mut prompt = AutoRetry::new(retries, Duration::from_secs(retry_interval));
                let mut sweeper = Sweeper::new(&files, &directories, &mut prompt);
                remove_residue(&mut sweeper, &spec)?;
            }
            Command::SetLocale {
                install_dir,
                locale,
            } => {
                let spec = TargetSpec::default()
                    .with_install_dir(install_dir.install_dir)
                    .with_locale(locale);
                persist_locale(&LocalFile, &spec)?;
            }
            Command::MigrateProfiles(install_dir) => {
                let spec = TargetSpec::default().with_install_dir(install_dir.install_dir);
                migrate_profiles(&DirectoryManagerFs, &spec)?;
            }
        }
        Ok(())
    }
}

#[cfg(target_family = "windows")]
fn decommission_installed_services(spec: &TargetSpec) -> Result<(), CliError> {
    crate::decommission::decommission_installed_services(spec)?;
    Ok(())
}

#[cfg(not(target_family = "windows"))]
fn decommission_installed_services(_spec: &TargetSpec) -> Result<(), CliError> {
    Err(CliError::Precondition(
        "service decommissioning is only available on Windows".to_string(),
    ))
}

////////////////////////////////////////////////////////////////////////////////////
// TESTS
////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_cli_declaration_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_missing_input_maps_to_a_precondition_failure() {
        let error = CliError::from(ActionError::MissingInput("BinaryPath"));

        assert_matches!(error, CliError::Precondition(_));
        // ExitCode has no equality; the mapping itself must at least build.
        let _exit: ExitCode = error.into();
    }

    #[test]
    fn test_remove_files_parses_retry_settings() {
        let cli = Cli::try_parse_from([
            "tunnelmgr-teardown",
            "remove-files",
            "--install-dir",
            "/opt/tunnelmgr",
            "--retries",
            "5",
            "--retry-interval",
            "2",
        ])
        .unwrap();

        assert_matches!(
            cli.command,
            Command::RemoveFiles {
                retries: 5,
                retry_interval: 2,
                ..
            }
        );
    }

    #[test]
    fn test_set_locale_requires_the_locale_argument() {
        let result = Cli::try_parse_from([
            "tunnelmgr-teardown",
            "set-locale",
            "--install-dir",
            "/opt/tunnelmgr",
        ]);

        assert!(result.is_err());
    }
}
