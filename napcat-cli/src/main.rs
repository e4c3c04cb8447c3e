//! napcat: command-line client for OneBot-style WebSocket peers
//!
//! Dials a peer to stream events or call actions, or runs a reverse server
//! that peers dial into.

mod cli;
mod commands;

use clap::Parser;
use cli::Cli;
use napcat_utils::init_logging_with_config;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging_with_config(cli.command.log_config()) {
        eprintln!("warning: logging disabled: {}", e);
    }

    let exit_code = match commands::execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!("command failed: {:?}", e);
            eprintln!("error: {}", e);
            if e.is_retryable() {
                eprintln!("hint: the peer may be temporarily unreachable, try again");
            }
            1
        }
    };

    std::process::exit(exit_code);
}
