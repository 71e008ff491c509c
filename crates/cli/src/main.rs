use std::process::ExitCode;

fn main() -> ExitCode {
    lucia_cli::run()
}
