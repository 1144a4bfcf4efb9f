use std::process::ExitCode;

fn main() -> ExitCode {
    notemark_cli::run()
}
