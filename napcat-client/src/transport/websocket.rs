//! WebSocket transport over `tokio-tungstenite`
//!
//! Works for both sides of the handshake: [`connect`] dials a peer as a
//! client, and the reverse server wraps sockets it accepted.

use async_trait::async_trait;
use futures::stream::{self, SplitSink, StreamExt};
use futures::SinkExt;
use napcat_utils::{NapcatError, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use super::{FrameSink, FrameStream, Transport};

/// Client-side stream type produced by [`connect`]
pub type ClientStream = MaybeTlsStream<TcpStream>;

/// A WebSocket carrying one JSON text frame per message
pub struct WsTransport<S> {
    socket: WebSocketStream<S>,
}

impl<S> WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(socket: WebSocketStream<S>) -> Self {
        Self { socket }
    }
}

impl<S> Transport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn split(self) -> (Box<dyn FrameSink>, FrameStream) {
        let (sink, reader) = self.socket.split();

        let stream = stream::unfold(reader, |mut reader| async move {
            loop {
                match reader.next().await? {
                    Ok(Message::Text(text)) => return Some((Ok(text), reader)),
                    Ok(Message::Binary(data)) => {
                        let text = String::from_utf8_lossy(&data).into_owned();
                        return Some((Ok(text), reader));
                    }
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "peer closed websocket");
                        return None;
                    }
                    // Pings are answered by tungstenite itself
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {
                        trace!("skipping control frame");
                        continue;
                    }
                    Err(tungstenite::Error::ConnectionClosed) => return None,
                    Err(e) => {
                        let err = NapcatError::transport(format!("websocket read failed: {}", e));
                        return Some((Err(err), reader));
                    }
                }
            }
        })
        .boxed();

        (Box::new(WsSink { sink, closed: false }), stream)
    }
}

struct WsSink<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
    closed: bool,
}

#[async_trait]
impl<S> FrameSink for WsSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| NapcatError::transport(format!("websocket send failed: {}", e)))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        match self.sink.close().await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(NapcatError::transport(format!("websocket close failed: {}", e))),
        }
    }
}

/// Dial a WebSocket peer
///
/// When `token` is set it is sent as `Authorization: Bearer <token>`.
pub async fn connect(url: &str, token: Option<&str>) -> Result<WsTransport<ClientStream>> {
    use tungstenite::client::IntoClientRequest;
    use tungstenite::http::HeaderValue;

    let mut request = url
        .into_client_request()
        .map_err(|e| NapcatError::connection(format!("Invalid WebSocket URL '{}': {}", url, e)))?;

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| NapcatError::connection(format!("Invalid access token: {}", e)))?;
        request.headers_mut().insert("Authorization", value);
    }

    let (socket, response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| NapcatError::connection(format!("Failed to connect to {}: {}", url, e)))?;

    debug!(url, status = %response.status(), "websocket handshake complete");
    Ok(WsTransport::new(socket))
}
