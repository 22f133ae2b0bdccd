use std::process::ExitCode;

fn main() -> ExitCode {
    innkeep_cli::run()
}
