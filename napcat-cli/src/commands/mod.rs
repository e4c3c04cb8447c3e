//! Command implementations

mod call;
mod events;
mod serve;

use std::path::Path;
use std::time::Duration;

use napcat_client::{ClientConfig, Config, NapCatClient, ServerConfig};
use napcat_utils::Result;

use crate::cli::{Cli, Command};

/// Run a parsed command; returns the process exit code
pub async fn execute(cli: Cli) -> Result<i32> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Events { raw, count } => {
            let client_config = client_config(&config, cli.url, cli.token, None);
            let client = connect(&client_config).await?;
            let code = events::run(&client, raw, count).await;
            client.close().await;
            code
        }
        Command::Call {
            action,
            params,
            timeout,
        } => {
            let params = match call::parse_params(&params) {
                Ok(params) => params,
                Err(message) => {
                    eprintln!("error: {}", message);
                    return Ok(2);
                }
            };
            let client_config = client_config(&config, cli.url, cli.token, timeout);
            let client = connect(&client_config).await?;
            let code = call::run(&client, &action, params).await;
            client.close().await;
            code
        }
        Command::Serve { host, port } => {
            let server_config = server_config(&config, host, port, cli.token);
            serve::run(server_config).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Command-line flags (and their env fallbacks) win over the config file
fn client_config(
    config: &Config,
    url: Option<String>,
    token: Option<String>,
    timeout_secs: Option<u64>,
) -> ClientConfig {
    let mut client = config.client.clone();
    if let Some(url) = url {
        client.url = url;
    }
    if token.is_some() {
        client.token = token;
    }
    if let Some(secs) = timeout_secs.filter(|s| *s > 0) {
        client.connection.request_timeout = Duration::from_secs(secs);
    }
    client
}

fn server_config(
    config: &Config,
    host: Option<String>,
    port: Option<u16>,
    token: Option<String>,
) -> ServerConfig {
    let mut server = config.server.clone();
    if let Some(host) = host {
        server.host = host;
    }
    if let Some(port) = port {
        server.port = port;
    }
    if token.is_some() {
        server.token = token;
    }
    server
}

async fn connect(config: &ClientConfig) -> Result<NapCatClient> {
    tracing::debug!("Connecting to {}", config.url);
    NapCatClient::connect_with(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_config() -> Config {
        Config::parse(
            r#"
            [client]
            url = "ws://10.0.0.2:3001"
            token = "from-file"

            [server]
            port = 6700
            token = "server-file"

            [connection]
            request_timeout_secs = 20
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_client_config_falls_back_to_file() {
        let config = client_config(&file_config(), None, None, None);
        assert_eq!(config.url, "ws://10.0.0.2:3001");
        assert_eq!(config.token.as_deref(), Some("from-file"));
        assert_eq!(config.connection.request_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_flags_override_file() {
        let config = client_config(
            &file_config(),
            Some("ws://127.0.0.1:9000".into()),
            Some("flag".into()),
            Some(3),
        );
        assert_eq!(config.url, "ws://127.0.0.1:9000");
        assert_eq!(config.token.as_deref(), Some("flag"));
        assert_eq!(config.connection.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_zero_timeout_flag_ignored() {
        let config = client_config(&file_config(), None, None, Some(0));
        assert_eq!(config.connection.request_timeout, Duration::from_secs(20));
    }

    #[test]
    fn test_server_config_overrides() {
        let config = server_config(&file_config(), Some("127.0.0.1".into()), None, None);
        assert_eq!(config.bind_addr(), "127.0.0.1:6700");
        assert_eq!(config.token.as_deref(), Some("server-file"));

        let config = server_config(&file_config(), None, Some(1), Some("t".into()));
        assert_eq!(config.port, 1);
        assert_eq!(config.token.as_deref(), Some("t"));
    }

    #[test]
    fn test_load_config_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("napcat.toml");
        std::fs::write(&path, "[server]\nport = 7000\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.server.port, 7000);
    }
}
