use std::process::ExitCode;

fn main() -> ExitCode {
    corner_cli::run()
}
