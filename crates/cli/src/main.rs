use std::process::ExitCode;

fn main() -> ExitCode {
    yambot_cli::run()
}
