use std::process::ExitCode;

fn main() -> ExitCode {
    rfq_tracker_cli::run()
}
