use std::process::ExitCode;

fn main() -> ExitCode {
    refdict_cli::run()
}
