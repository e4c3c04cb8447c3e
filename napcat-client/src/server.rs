//! Reverse WebSocket server
//!
//! Peers dial in; each accepted socket is authenticated, wrapped in a
//! running [`NapCatClient`] and handed to the user's handler. The client is
//! closed when the handler returns or the server shuts down.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use napcat_utils::{NapcatError, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{header, StatusCode};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::client::NapCatClient;
use crate::config::{ConnectionOptions, ServerConfig};
use crate::transport::WsTransport;

/// Accept-style server for OneBot reverse WebSocket connections
pub struct ReverseServer {
    listener: TcpListener,
    token: Option<String>,
    options: ConnectionOptions,
    shutdown: CancellationToken,
}

impl ReverseServer {
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| NapcatError::connection(format!("Failed to bind {}: {}", addr, e)))?;

        info!("Reverse server listening on {}", addr);
        Ok(Self {
            listener,
            token: config.token.filter(|t| !t.is_empty()),
            options: config.connection,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Cancel this token to stop the server
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the accept loop until shutdown
    ///
    /// Returns once every per-connection task has finished closing.
    pub async fn run<H, Fut>(self, handler: H) -> Result<()>
    where
        H: Fn(NapCatClient) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let tracker = TaskTracker::new();
        let token: Option<Arc<str>> = self.token.as_deref().map(Arc::from);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            debug!("New connection from {}", peer_addr);
                            tracker.spawn(serve_connection(
                                stream,
                                peer_addr,
                                token.clone(),
                                self.options,
                                Arc::clone(&handler),
                                self.shutdown.child_token(),
                            ));
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping accept loop");
                    break;
                }
            }
        }

        drop(self.listener);
        tracker.close();
        tracker.wait().await;
        info!("Reverse server stopped");
        Ok(())
    }
}

async fn serve_connection<H, Fut>(
    stream: TcpStream,
    peer_addr: SocketAddr,
    token: Option<Arc<str>>,
    options: ConnectionOptions,
    handler: Arc<H>,
    shutdown: CancellationToken,
) where
    H: Fn(NapCatClient) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let handshake = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        authorize(req, resp, token.as_deref())
    });

    let socket = tokio::select! {
        result = handshake => match result {
            Ok(socket) => socket,
            Err(e) => {
                warn!("Handshake with {} failed: {}", peer_addr, e);
                return;
            }
        },
        _ = shutdown.cancelled() => return,
    };

    let client = match NapCatClient::from_transport(WsTransport::new(socket), options) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to start connection for {}: {}", peer_addr, e);
            return;
        }
    };
    let connection_id = client.connection().id();
    info!(%peer_addr, %connection_id, "peer connected");

    tokio::select! {
        result = (handler.as_ref())(client.clone()) => {
            if let Err(e) = result {
                error!(%peer_addr, %connection_id, error = %e, "handler failed");
            }
        }
        _ = shutdown.cancelled() => {
            debug!(%peer_addr, %connection_id, "server shutting down, closing peer");
        }
    }

    client.close().await;
    info!(%peer_addr, %connection_id, "peer disconnected");
}

/// Check the bearer token of an upgrade request
fn authorize(
    req: &Request,
    resp: Response,
    expected: Option<&str>,
) -> std::result::Result<Response, ErrorResponse> {
    let Some(expected) = expected else {
        return Ok(resp);
    };

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim());

    if presented == Some(expected) {
        Ok(resp)
    } else {
        warn!(uri = %req.uri(), "rejecting peer with missing or wrong token");
        let mut rejection = ErrorResponse::new(Some("Unauthorized".into()));
        *rejection.status_mut() = StatusCode::UNAUTHORIZED;
        Err(rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::websocket;
    use crate::transport::Transport;
    use futures::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    fn config(token: Option<&str>) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            token: token.map(str::to_string),
            connection: ConnectionOptions {
                close_grace: Duration::from_millis(200),
                ..ConnectionOptions::default()
            },
        }
    }

    async fn start(
        token: Option<&str>,
    ) -> (
        SocketAddr,
        CancellationToken,
        tokio::sync::mpsc::UnboundedReceiver<Value>,
        tokio::task::JoinHandle<Result<()>>,
    ) {
        let server = ReverseServer::bind(config(token)).await.unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_token();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        // Ask the peer who it is, report the answer, then wait for one event
        let handle = tokio::spawn(server.run(move |client: NapCatClient| {
            let tx = tx.clone();
            async move {
                let mut events = client.raw_events();
                let info = client.call_action_ok("get_login_info", json!({})).await?;
                let _ = tx.send(info);
                if let Some(event) = events.recv().await {
                    let _ = tx.send(event.into_value());
                }
                Ok(())
            }
        }));

        (addr, shutdown, rx, handle)
    }

    /// Plays the OneBot implementation side
    async fn run_peer(addr: SocketAddr, token: Option<&str>) -> Result<()> {
        let transport = websocket::connect(&format!("ws://{}", addr), token).await?;
        let (mut sink, mut stream) = transport.split();

        let request = stream.next().await.unwrap()?;
        let request: Value = serde_json::from_str(&request).unwrap();
        assert_eq!(request["action"], "get_login_info");

        let response = json!({
            "status": "ok",
            "retcode": 0,
            "data": {"user_id": 10001, "nickname": "bot"},
            "echo": request["echo"]
        });
        sink.send_text(response.to_string()).await?;
        sink.send_text(json!({"post_type": "notice", "notice_type": "notify"}).to_string())
            .await?;

        // Server closes once the handler returns
        while let Some(item) = stream.next().await {
            if item.is_err() {
                break;
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_handler_receives_running_client() {
        let (addr, shutdown, mut rx, handle) = start(Some("secret")).await;

        run_peer(addr, Some("secret")).await.unwrap();

        let info = rx.recv().await.unwrap();
        assert_eq!(info["nickname"], "bot");
        let event = rx.recv().await.unwrap();
        assert_eq!(event["notice_type"], "notify");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_wrong_token_rejected() {
        let (addr, shutdown, _rx, handle) = start(Some("secret")).await;

        let result = websocket::connect(&format!("ws://{}", addr), Some("wrong")).await;
        match result {
            Err(NapcatError::Connection(message)) => assert!(message.contains("401")),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("handshake should have been rejected"),
        }

        let result = websocket::connect(&format!("ws://{}", addr), None).await;
        assert!(result.is_err());

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_no_token_configured_accepts_anyone() {
        let (addr, shutdown, mut rx, handle) = start(None).await;

        run_peer(addr, None).await.unwrap();
        assert_eq!(rx.recv().await.unwrap()["user_id"], 10001);

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_closes_active_connections() {
        let server = ReverseServer::bind(config(None)).await.unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_token();

        // Handler that never returns on its own
        let handle = tokio::spawn(server.run(|client: NapCatClient| async move {
            let mut events = client.raw_events();
            while events.recv().await.is_some() {}
            Ok(())
        }));

        let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .unwrap();
        socket
            .send(Message::Text(json!({"post_type": "meta_event"}).to_string()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown.cancel();

        // The peer sees the server close its side
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(msg) = socket.next().await {
                match msg {
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
        })
        .await;
        assert!(closed.is_ok());

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_authorize_header_forms() {
        let request = |value: Option<&str>| {
            let mut builder = Request::builder().uri("/");
            if let Some(value) = value {
                builder = builder.header("Authorization", value);
            }
            builder.body(()).unwrap()
        };

        assert!(authorize(&request(Some("Bearer abc")), Response::new(()), Some("abc")).is_ok());
        assert!(authorize(&request(Some("abc")), Response::new(()), Some("abc")).is_ok());
        assert!(authorize(&request(None), Response::new(()), None).is_ok());

        let rejected = authorize(&request(Some("Bearer nope")), Response::new(()), Some("abc"));
        assert_eq!(rejected.unwrap_err().status(), StatusCode::UNAUTHORIZED);
        assert!(authorize(&request(None), Response::new(()), Some("abc")).is_err());
    }
}
