//! Transport adapter
//!
//! Wraps one bidirectional WebSocket connection. The socket is split: the
//! write half serializes outbound intents behind a mutex, a background
//! task classifies raw inbound messages into typed events. Connection
//! failures and closures of any kind surface as `InboundEvent::Error`
//! through the same event channel, so the session tears down uniformly
//! regardless of failure cause.

use crate::error::SessionError;
use crate::protocol::{decode_inbound, encode_outbound, InboundEvent, OutboundIntent};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info};

use std::sync::Arc;

type WsSink = Arc<
    Mutex<
        futures_util::stream::SplitSink<
            tokio_tungstenite::WebSocketStream<
                tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
            >,
            Message,
        >,
    >,
>;

pub struct Transport {
    writer: WsSink,
    events: mpsc::Receiver<InboundEvent>,
    _rx_task: JoinHandle<()>,
}

impl Transport {
    /// Open the connection and start the inbound classification task.
    /// `sample_rate` is the session-level constant applied to every decoded
    /// audio frame.
    pub async fn connect(url: &str, sample_rate: u32) -> Result<Self, SessionError> {
        info!(%url, "connecting transport");
        let (ws_stream, response) = connect_async(url).await?;
        debug!(status = ?response.status(), "websocket handshake complete");

        let (sink, mut stream) = ws_stream.split();
        let writer: WsSink = Arc::new(Mutex::new(sink));
        let (event_tx, event_rx) = mpsc::channel::<InboundEvent>(100);

        let rx_task = tokio::spawn(async move {
            let mut signaled = false;
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if !forward_raw(text.as_str(), sample_rate, &event_tx).await {
                            signaled = true;
                            break;
                        }
                    }
                    Ok(Message::Binary(bytes)) => {
                        // Some agents send JSON envelopes as binary frames.
                        match std::str::from_utf8(&bytes) {
                            Ok(text) => {
                                if !forward_raw(text, sample_rate, &event_tx).await {
                                    signaled = true;
                                    break;
                                }
                            }
                            Err(_) => debug!(len = bytes.len(), "ignoring non-UTF-8 binary frame"),
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let reason = match frame {
                            Some(f) => {
                                format!("connection closed ({}: {})", u16::from(f.code), f.reason)
                            }
                            None => "connection closed".to_string(),
                        };
                        let _ = event_tx.send(InboundEvent::Error(reason)).await;
                        signaled = true;
                        break;
                    }
                    Ok(_) => {} // ping/pong
                    Err(e) => {
                        let _ = event_tx
                            .send(InboundEvent::Error(format!("websocket error: {e}")))
                            .await;
                        signaled = true;
                        break;
                    }
                }
            }
            if !signaled {
                let _ = event_tx
                    .send(InboundEvent::Error("connection lost".into()))
                    .await;
            }
            debug!("transport read task finished");
        });

        Ok(Self {
            writer,
            events: event_rx,
            _rx_task: rx_task,
        })
    }

    /// Serialize and send one intent.
    pub async fn send(&self, intent: &OutboundIntent) -> Result<(), SessionError> {
        let json = encode_outbound(intent)?;
        let mut writer = self.writer.lock().await;
        writer.send(Message::Text(json.into())).await?;
        Ok(())
    }

    /// Next typed inbound event; `None` once the read task has shut down
    /// and all buffered events were consumed.
    pub async fn next_event(&mut self) -> Option<InboundEvent> {
        self.events.recv().await
    }

    /// Best-effort close of the write half.
    pub async fn close(&self) {
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.send(Message::Close(None)).await {
            debug!("close frame not delivered: {e}");
        }
    }
}

/// Decode and forward one raw message. Returns `false` once the event
/// receiver is gone, so the caller can abandon the socket instead of
/// reading into a dead channel.
async fn forward_raw(raw: &str, sample_rate: u32, event_tx: &mpsc::Sender<InboundEvent>) -> bool {
    match decode_inbound(raw, sample_rate) {
        Ok(Some(event)) => {
            if event_tx.send(event).await.is_err() {
                debug!("event receiver dropped, abandoning read task");
                return false;
            }
            true
        }
        Ok(None) => true, // unknown type, already logged
        Err(e) => {
            error!("dropping unusable inbound message: {e}");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn classifies_inbound_and_surfaces_close_as_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            // First client message must be the setup envelope.
            let msg = ws.next().await.unwrap().unwrap();
            let value: Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
            assert_eq!(value["type"], "setup");
            assert_eq!(value["config"]["voice"], "robin");

            for envelope in [
                json!({"type": "text", "text": "hello there"}),
                json!({"type": "bogus_unknown_type"}),
                json!({"type": "turn_complete"}),
            ] {
                ws.send(Message::Text(envelope.to_string().into()))
                    .await
                    .unwrap();
            }
            ws.close(None).await.unwrap();
        });

        let mut transport = Transport::connect(&format!("ws://{addr}"), 16_000)
            .await
            .unwrap();
        transport
            .send(&OutboundIntent::Setup(json!({"voice": "robin"})))
            .await
            .unwrap();

        assert_eq!(
            transport.next_event().await,
            Some(InboundEvent::Text("hello there".into()))
        );
        // The bogus envelope is swallowed; turn_complete comes straight after.
        assert_eq!(
            transport.next_event().await,
            Some(InboundEvent::TurnComplete)
        );
        match transport.next_event().await {
            Some(InboundEvent::Error(_)) => {}
            other => panic!("expected close to surface as Error, got {other:?}"),
        }

        server.await.unwrap();
    }

    #[tokio::test]
    async fn read_task_exits_once_receiver_is_dropped() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // A chatty peer that never closes on its own.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            loop {
                let envelope = json!({"type": "text", "text": "still here"});
                if ws
                    .send(Message::Text(envelope.to_string().into()))
                    .await
                    .is_err()
                {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        });

        let transport = Transport::connect(&format!("ws://{addr}"), 16_000)
            .await
            .unwrap();
        let Transport {
            writer,
            events,
            _rx_task: task,
        } = transport;

        // Keep the socket open via the writer, abandon only the events side.
        drop(events);
        tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .expect("read task kept running without a receiver")
            .unwrap();

        drop(writer);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn failed_connect_returns_transport_error() {
        // Nothing is listening here.
        let err = Transport::connect("ws://127.0.0.1:1/agent", 16_000)
            .await
            .err()
            .expect("connect must fail");
        assert!(matches!(err, SessionError::Transport(_)));
    }
}
