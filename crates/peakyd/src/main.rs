use std::process::ExitCode;

fn main() -> ExitCode {
    match peakyd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("peakyd: {error}");
            ExitCode::FAILURE
        }
    }
}
