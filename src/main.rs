use std::process::ExitCode;

fn main() -> ExitCode {
    match freefall_fit::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(exit_code = err.exit_code(), "{err}");
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
