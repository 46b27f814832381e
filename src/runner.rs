//! Session driver
//!
//! Connects the transport, capture ticker, and playback completions to the
//! session state machine on one task, draining its effects after every
//! event. Playback rendering is the only blocking work and runs on a
//! dedicated thread fed by a channel; completions come back as events.

use crate::capture::AudioSource;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::pcm::AudioFrame;
use crate::playback::PlaybackSink;
use crate::protocol::InboundEvent;
use crate::session::{ConnState, SessionOutput, VoiceSession};
use crate::transport::Transport;
use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, warn};

/// Handle to a running session, owned by the caller. Dropping it stops the
/// session; [`SessionHandle::stop`] does so explicitly and waits for the
/// teardown to finish.
pub struct SessionHandle {
    stop_tx: mpsc::Sender<()>,
    text_tx: mpsc::UnboundedSender<String>,
    task: JoinHandle<Result<(), SessionError>>,
}

impl SessionHandle {
    /// Spawn a session. The returned receiver yields display-level outputs
    /// (agent text, transcripts, end-of-session).
    pub fn spawn(
        config: SessionConfig,
        source: Box<dyn AudioSource>,
        sink: Box<dyn PlaybackSink>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionOutput>) {
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let (text_tx, text_rx) = mpsc::unbounded_channel();
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(config, source, sink, stop_rx, text_rx, notice_tx));
        (
            Self {
                stop_tx,
                text_tx,
                task,
            },
            notice_rx,
        )
    }

    /// Queue a typed test message (the `text_input` envelope).
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.text_tx.send(text.into());
    }

    /// Stop the session and wait for full teardown.
    pub async fn stop(self) -> anyhow::Result<()> {
        // Send failure just means the session already ended on its own.
        let _ = self.stop_tx.send(()).await;
        self.task.await.context("session task panicked")??;
        Ok(())
    }
}

/// Drive one session to completion: dial, hand the microphone to the
/// session, then loop over stop requests, capture ticks, transport events,
/// and playback completions until the session reaches `Disconnected`.
pub async fn run_session(
    config: SessionConfig,
    source: Box<dyn AudioSource>,
    sink: Box<dyn PlaybackSink>,
    mut stop_rx: mpsc::Receiver<()>,
    mut text_rx: mpsc::UnboundedReceiver<String>,
    notice_tx: mpsc::UnboundedSender<SessionOutput>,
) -> Result<(), SessionError> {
    let mut session = VoiceSession::new(config.clone());
    session.start();

    let mut transport = Transport::connect(&config.url, config.sample_rate).await?;

    // Playback thread: render frames in order, acknowledge each one.
    let (play_tx, mut play_rx) = mpsc::unbounded_channel::<AudioFrame>();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<()>();
    let player = std::thread::spawn(move || {
        let mut sink = sink;
        while let Some(frame) = play_rx.blocking_recv() {
            if let Err(e) = sink.play(&frame) {
                // One bad frame never halts the queue.
                error!("playback failed, skipping frame: {e}");
            }
            if done_tx.send(()).is_err() {
                break;
            }
        }
    });

    session.on_open(source);
    flush(&mut session, &transport, &play_tx, &notice_tx).await;

    let mut ticker = interval(config.tick_interval());
    while session.conn_state() != ConnState::Disconnected {
        tokio::select! {
            _ = stop_rx.recv() => {
                info!("stop requested");
                session.stop();
            }
            _ = ticker.tick() => {
                if let Err(e) = session.on_capture_tick() {
                    warn!("capture tick failed: {e}");
                }
            }
            event = transport.next_event() => match event {
                Some(event) => session.on_inbound(event),
                None => session.stop(),
            },
            Some(text) = text_rx.recv() => session.send_text(text),
            Some(_) = done_rx.recv() => session.on_playback_done(),
        }
        flush(&mut session, &transport, &play_tx, &notice_tx).await;
    }

    drop(play_tx);
    if player.join().is_err() {
        error!("playback thread panicked");
    }
    Ok(())
}

/// Pump the session's queued intents to the transport and its effects to
/// the player thread / embedder. A failed send is fed back into the
/// session as a transport error so teardown stays uniform.
async fn flush(
    session: &mut VoiceSession,
    transport: &Transport,
    play_tx: &mpsc::UnboundedSender<AudioFrame>,
    notice_tx: &mpsc::UnboundedSender<SessionOutput>,
) {
    for intent in session.drain_outbound() {
        if let Err(e) = transport.send(&intent).await {
            session.on_inbound(InboundEvent::Error(format!("send failed: {e}")));
            break;
        }
    }
    for output in session.drain_outputs() {
        match output {
            SessionOutput::Play(frame) => {
                if play_tx.send(frame).is_err() {
                    warn!("playback thread gone, frame discarded");
                }
            }
            SessionOutput::CloseTransport => transport.close().await,
            other => {
                let _ = notice_tx.send(other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    struct ToneSource;

    impl AudioSource for ToneSource {
        fn read(&mut self, buf: &mut [f32]) -> Result<usize, SessionError> {
            buf.fill(0.25);
            Ok(buf.len())
        }
    }

    /// Records played frames, completes instantly.
    struct CollectSink(Arc<Mutex<Vec<AudioFrame>>>);

    impl PlaybackSink for CollectSink {
        fn play(&mut self, frame: &AudioFrame) -> Result<(), SessionError> {
            self.0.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn full_session_against_local_agent() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let agent = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let msg = ws.next().await.unwrap().unwrap();
            let setup: Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
            assert_eq!(setup["type"], "setup");
            assert_eq!(setup["config"]["system_prompt"], "test");

            // Speak one chunk of agent audio.
            let pcm: Vec<i16> = vec![1000; 160];
            let envelope = json!({
                "type": "audio",
                "audio_data": BASE64.encode(bytemuck::cast_slice::<i16, u8>(&pcm)),
            });
            ws.send(Message::Text(envelope.to_string().into()))
                .await
                .unwrap();

            // Read mic chunks until the client confirms it heard the agent,
            // then hang up.
            let mut saw_mic_audio = false;
            loop {
                let msg = ws.next().await.unwrap().unwrap();
                let value: Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
                match value["type"].as_str().unwrap() {
                    "audio_stream" => {
                        assert_eq!(value["format"], "pcm");
                        assert_eq!(value["sample_rate"], 16_000);
                        saw_mic_audio = true;
                    }
                    "text_input" => {
                        assert_eq!(value["text"], "heard it");
                        break;
                    }
                    other => panic!("unexpected client envelope: {other}"),
                }
            }
            assert!(saw_mic_audio);
            ws.close(None).await.unwrap();
        });

        let played = Arc::new(Mutex::new(Vec::new()));
        let config = SessionConfig {
            url: format!("ws://{addr}"),
            setup: json!({"system_prompt": "test"}),
            frame_samples: 160, // 10ms ticks keep the test fast
            ..Default::default()
        };
        let (handle, mut notices) = SessionHandle::spawn(
            config,
            Box::new(ToneSource),
            Box::new(CollectSink(played.clone())),
        );

        let mut seen = Vec::new();
        let collect = async {
            while let Some(notice) = notices.recv().await {
                if notice == SessionOutput::AgentFinished {
                    // Let a few mic ticks reach the wire before confirming,
                    // so the server sees the capture stream resume.
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    handle.send_text("heard it");
                }
                let ended = matches!(notice, SessionOutput::Ended(_));
                seen.push(notice);
                if ended {
                    break;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(5), collect)
            .await
            .expect("session did not end in time");

        assert!(seen.contains(&SessionOutput::AgentFinished));
        assert!(seen
            .iter()
            .any(|n| matches!(n, SessionOutput::Ended(Some(_)))));
        assert_eq!(played.lock().unwrap().len(), 1);
        assert_eq!(played.lock().unwrap()[0].samples, vec![1000i16; 160]);

        agent.await.unwrap();
        handle.stop().await.unwrap();
    }
}
