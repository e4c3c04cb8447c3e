//! `napcat serve`

use napcat_client::{NapCatClient, ReverseServer, ServerConfig};
use napcat_utils::Result;
use serde_json::json;

/// Run a reverse server until Ctrl-C, printing every event as a JSON line
pub async fn run(config: ServerConfig) -> Result<i32> {
    let server = ReverseServer::bind(config).await?;
    eprintln!("listening on {}", server.local_addr()?);

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, shutting down");
                shutdown.cancel();
            }
            Err(e) => tracing::warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run(print_events).await?;
    Ok(0)
}

async fn print_events(client: NapCatClient) -> Result<()> {
    let connection_id = client.connection().id().to_string();
    let mut events = client.raw_events();

    while let Some(frame) = events.recv().await {
        println!(
            "{}",
            json!({"connection": connection_id, "event": frame.into_value()})
        );
    }
    Ok(())
}
