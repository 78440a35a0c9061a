use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = pulmoscan_lib::cli::Cli::parse();
    match pulmoscan_lib::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pulmoscan: {e}");
            ExitCode::FAILURE
        }
    }
}
