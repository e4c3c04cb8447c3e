//! CLI argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use napcat_utils::LogConfig;

/// Talk to a OneBot-style WebSocket peer
#[derive(Parser, Debug)]
#[command(name = "napcat")]
#[command(about = "Client and reverse server for OneBot-style WebSocket peers")]
#[command(version)]
pub struct Cli {
    /// WebSocket URL of the peer (ws://host:port or wss://...)
    ///
    /// Falls back to `client.url` from the config file.
    #[arg(long, env = "NAPCAT_URL", global = true)]
    pub url: Option<String>,

    /// Access token, sent as a bearer token (or required from peers by `serve`)
    #[arg(long, env = "NAPCAT_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Print incoming events, one per line
    Events {
        /// Print raw JSON frames instead of summaries
        #[arg(long)]
        raw: bool,

        /// Exit after this many events
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Call an action and print its response data
    Call {
        /// Action name (e.g. get_login_info)
        action: String,

        /// Parameters as a JSON object
        #[arg(short = 'p', long, default_value = "{}")]
        params: String,

        /// Request timeout in seconds
        #[arg(short = 't', long)]
        timeout: Option<u64>,
    },

    /// Accept reverse WebSocket connections and print their events
    Serve {
        /// Address to listen on
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short = 'P', long)]
        port: Option<u16>,
    },
}

impl Command {
    /// Logging setup for this command; the reverse server logs to a file
    pub fn log_config(&self) -> LogConfig {
        match self {
            Self::Serve { .. } => LogConfig::server(),
            Self::Events { .. } | Self::Call { .. } => LogConfig::cli(),
        }
    }
}
