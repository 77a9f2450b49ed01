//! treesift - content-based deduplication and reconciliation of directory trees
//!
//! Entry point for the treesift CLI application.

use clap::Parser;
use treesift::{cli::Cli, error::ExitCode};

fn main() {
    let cli = Cli::parse();

    match treesift::run_app(cli) {
        Ok(code) => std::process::exit(code.as_i32()),
        Err(err) => {
            let exit_code = ExitCode::Failure;
            eprintln!("[{}] Error: {:#}", exit_code.code_prefix(), err);
            std::process::exit(exit_code.as_i32());
        }
    }
}
