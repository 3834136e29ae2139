use std::process::ExitCode;

fn main() -> ExitCode {
    parchi_cli::run()
}
