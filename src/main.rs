//! meshproxy command-line entry point.
//!
//! Reads `config.json` (or the file given with `--config`), binds the local
//! listener and tunnels every accepted client through a relay session.

use std::process::ExitCode;

use clap::Parser;
use meshproxy_client::ClientArgs;

#[tokio::main]
async fn main() -> ExitCode {
    let args = ClientArgs::parse();

    match meshproxy_client::cli::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
