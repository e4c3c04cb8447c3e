//! Request-style client facade
//!
//! [`NapCatClient`] wraps a started [`ConnectionCore`] and speaks the
//! action/event dialect on top of it.

use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use napcat_protocol::{ActionRequest, ActionResponse, Event, Frame};
use napcat_utils::{NapcatError, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{validate_ws_url, ClientConfig, ConnectionOptions};
use crate::connection::{ConnectionCore, ConnectionState, Subscription};
use crate::transport::{websocket, Transport};

/// Client for one OneBot-style peer
///
/// Call [`close`](Self::close) when done. Dropping the last clone aborts the
/// connection without a close handshake.
#[derive(Clone, Debug)]
pub struct NapCatClient {
    core: ConnectionCore,
}

impl NapCatClient {
    /// Dial `url` with default connection options
    pub async fn connect(url: &str, token: Option<&str>) -> Result<Self> {
        let config = ClientConfig {
            url: url.to_string(),
            token: token.map(str::to_string),
            ..ClientConfig::default()
        };
        Self::connect_with(&config).await
    }

    pub async fn connect_with(config: &ClientConfig) -> Result<Self> {
        validate_ws_url(&config.url).map_err(|e| NapcatError::connection(e.to_string()))?;

        let transport = websocket::connect(&config.url, config.token.as_deref()).await?;
        let client = Self::from_transport(transport, config.connection)?;
        info!(
            url = %config.url,
            connection_id = %client.core.id(),
            "connected"
        );
        Ok(client)
    }

    /// Wrap an already established transport and start reading from it
    pub fn from_transport<T: Transport>(transport: T, options: ConnectionOptions) -> Result<Self> {
        let core = ConnectionCore::new(transport, options);
        core.start()?;
        Ok(Self { core })
    }

    /// Wrap a core that is already running
    pub fn from_core(core: ConnectionCore) -> Self {
        Self { core }
    }

    pub fn connection(&self) -> &ConnectionCore {
        &self.core
    }

    pub fn is_connected(&self) -> bool {
        self.core.state() == ConnectionState::Running
    }

    /// Send a raw request frame with the default timeout
    pub async fn send(&self, payload: Frame) -> Result<Frame> {
        self.core.send_default(payload).await
    }

    pub async fn send_with_timeout(&self, payload: Frame, timeout: Duration) -> Result<Frame> {
        self.core.send(payload, timeout).await
    }

    /// Call an action and parse the response
    ///
    /// A non-object `params` is sent as `{}`.
    pub async fn call_action(&self, action: &str, params: Value) -> Result<ActionResponse> {
        let request = ActionRequest::with_params(action, params);
        let response = self.send(request.into_frame()).await?;
        let response = ActionResponse::from_frame(&response);
        debug!(
            action,
            status = ?response.status,
            retcode = response.retcode,
            "action response"
        );
        Ok(response)
    }

    /// Call an action and return its `data`, failing unless it succeeded
    pub async fn call_action_ok(&self, action: &str, params: Value) -> Result<Value> {
        let response = self.call_action(action, params).await?;
        if response.is_ok() {
            Ok(response.data)
        } else {
            Err(NapcatError::ActionFailed {
                action: action.to_string(),
                retcode: response.retcode,
                message: response.error_message().to_string(),
            })
        }
    }

    /// Typed view of events arriving from now on
    pub fn events(&self) -> EventStream {
        EventStream {
            subscription: self.core.subscribe(),
        }
    }

    /// Untyped event frames arriving from now on
    pub fn raw_events(&self) -> Subscription {
        self.core.subscribe()
    }

    pub async fn close(&self) {
        self.core.close().await;
    }
}

/// Stream of classified events
///
/// Frames that do not fit a known event shape come through as
/// [`Event::Unknown`].
#[derive(Debug)]
pub struct EventStream {
    subscription: Subscription,
}

impl EventStream {
    pub async fn next(&mut self) -> Option<Event> {
        let frame = self.subscription.recv().await?;
        Some(Event::from_frame(&frame))
    }

    pub fn into_stream(self) -> BoxStream<'static, Event> {
        self.subscription
            .into_stream()
            .map(|frame| Event::from_frame(&frame))
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::{self, MemoryPeer};
    use napcat_protocol::event::MessageType;
    use serde_json::json;

    fn client() -> (NapCatClient, MemoryPeer) {
        let (transport, peer) = memory::pair();
        let client = NapCatClient::from_transport(transport, ConnectionOptions::default()).unwrap();
        (client, peer)
    }

    #[tokio::test]
    async fn test_call_action_ok() {
        let (client, mut peer) = client();

        let responder = tokio::spawn(async move {
            let request = peer.recv_frame().await.unwrap();
            assert_eq!(request.get_str("action"), Some("get_login_info"));
            peer.send_json(json!({
                "status": "ok",
                "retcode": 0,
                "data": {"user_id": 10001, "nickname": "bot"},
                "echo": request.get_str("echo").unwrap()
            }));
            peer
        });

        let data = client.call_action_ok("get_login_info", json!({})).await.unwrap();
        assert_eq!(data["nickname"], "bot");
        let _peer = responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_call_action_failed() {
        let (client, mut peer) = client();

        let responder = tokio::spawn(async move {
            let request = peer.recv_frame().await.unwrap();
            assert_eq!(request.get("params"), Some(&json!({"group_id": 1})));
            peer.send_json(json!({
                "status": "failed",
                "retcode": 1404,
                "data": null,
                "message": "group not found",
                "wording": "群不存在",
                "echo": request.get_str("echo").unwrap()
            }));
            peer
        });

        let err = client
            .call_action_ok("get_group_info", json!({"group_id": 1}))
            .await
            .unwrap_err();
        match err {
            NapcatError::ActionFailed {
                action,
                retcode,
                message,
            } => {
                assert_eq!(action, "get_group_info");
                assert_eq!(retcode, 1404);
                assert_eq!(message, "群不存在");
            }
            other => panic!("expected ActionFailed, got {:?}", other),
        }
        let _peer = responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_typed_events() {
        let (client, peer) = client();
        let mut events = client.events();

        peer.send_json(json!({
            "time": 1700000000,
            "self_id": 10001,
            "post_type": "message",
            "message_type": "private",
            "sub_type": "friend",
            "message_id": 1,
            "user_id": 20002,
            "sender": {"user_id": 20002, "nickname": "alice"},
            "raw_message": "hi",
            "message": [{"type": "text", "data": {"text": "hi"}}],
            "font": 0
        }));
        peer.send_json(json!({"post_type": "something_new", "time": 5}));

        match events.next().await.unwrap() {
            Event::Message(msg) => {
                assert_eq!(msg.message_type, MessageType::Private);
                assert_eq!(msg.plain_text(), "hi");
            }
            other => panic!("expected message, got {:?}", other),
        }
        let unknown = events.next().await.unwrap();
        assert!(unknown.is_unknown());
        assert_eq!(unknown.post_type(), "something_new");
    }

    #[tokio::test]
    async fn test_event_stream_ends_on_close() {
        let (client, peer) = client();
        let events = client.events().into_stream();

        peer.send_json(json!({"post_type": "meta_event", "meta_event_type": "heartbeat"}));
        let raw = client.raw_events();
        drop(raw);

        let closer = client.clone();
        let collected = tokio::spawn(async move { events.collect::<Vec<_>>().await });
        while closer.connection().stats().events_broadcast < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        closer.close().await;

        let collected = collected.await.unwrap();
        assert_eq!(collected.len(), 1);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_connect_rejects_non_ws_url() {
        let err = NapCatClient::connect("http://127.0.0.1:1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, NapcatError::Connection(_)));
    }
}
