use std::process::ExitCode;

fn main() -> ExitCode {
    harvest_cli::run()
}
