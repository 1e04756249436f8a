//! WebSocket mock of the OpenAI Realtime API
//!
//! Accepts a single connection, records the handshake and every client event,
//! and sends whatever the test pushes through [`MockRealtime::send`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};

/// Handshake details captured by the mock
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    pub uri: String,
    pub authorization: Option<String>,
}

pub struct MockRealtime {
    pub addr: SocketAddr,
    pub handshake: Arc<Mutex<Option<Handshake>>>,
    received: mpsc::UnboundedReceiver<Value>,
    outbound: mpsc::UnboundedSender<Message>,
    closed: Option<oneshot::Receiver<()>>,
}

impl MockRealtime {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handshake = Arc::new(Mutex::new(None));
        let (received_tx, received) = mpsc::unbounded_channel();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (closed_tx, closed) = oneshot::channel();

        let captured = handshake.clone();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = |req: &Request, resp: Response| {
                *captured.lock() = Some(Handshake {
                    uri: req.uri().to_string(),
                    authorization: req
                        .headers()
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string),
                });
                Ok(resp)
            };
            let ws = accept_hdr_async(stream, callback).await.unwrap();
            let (mut write, mut read) = ws.split();

            loop {
                tokio::select! {
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                                let _ = received_tx.send(value);
                            }
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                    Some(msg) = outbound_rx.recv() => {
                        let is_close = matches!(msg, Message::Close(_));
                        if write.send(msg).await.is_err() || is_close {
                            break;
                        }
                    }
                }
            }
            let _ = closed_tx.send(());
        });

        Self {
            addr,
            handshake,
            received,
            outbound,
            closed: Some(closed),
        }
    }

    /// URL to configure as the realtime endpoint
    pub fn url(&self) -> String {
        format!("ws://{}/v1/realtime", self.addr)
    }

    /// Send a JSON event to the relay
    pub fn send(&self, event: Value) {
        self.outbound
            .send(Message::Text(event.to_string().into()))
            .unwrap();
    }

    /// Close the connection from the server side
    pub fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
    }

    /// Next client event, or `None` after a timeout
    pub async fn next_event(&mut self) -> Option<Value> {
        tokio::time::timeout(Duration::from_secs(5), self.received.recv())
            .await
            .ok()
            .flatten()
    }

    /// Skip client events until one of type `kind` arrives
    pub async fn expect_event(&mut self, kind: &str) -> Value {
        loop {
            let event = self
                .next_event()
                .await
                .unwrap_or_else(|| panic!("timed out waiting for {kind}"));
            if event["type"] == kind {
                return event;
            }
        }
    }

    /// Wait until the relay's connection to the mock has ended
    pub async fn wait_closed(&mut self) -> bool {
        match self.closed.take() {
            Some(closed) => tokio::time::timeout(Duration::from_secs(5), closed)
                .await
                .is_ok(),
            None => true,
        }
    }
}
