use std::process::ExitCode;
use tunnelmgr_teardown::cli::Cli;

fn main() -> ExitCode {
    match Cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err)
        }
    }
}
