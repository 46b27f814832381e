//! Session state machine
//!
//! One `VoiceSession` tracks the connection lifecycle
//! (`Disconnected → Connecting → Connected → Disconnected`) and the turn
//! flag (`Listening ⇄ AgentSpeaking`) over one persistent socket, and
//! composes the playback queue and capture pipeline. It is a synchronous
//! event-in/effects-out machine: the driver feeds it transport events,
//! capture ticks, and playback completions, then drains the outbound
//! intents and local effects it produced. All mutation happens on the
//! driver's single task, so no locking is needed.

use crate::capture::{AudioSource, CapturePipeline};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::pcm::AudioFrame;
use crate::playback::{PlaybackAdvance, PlaybackQueue};
use crate::protocol::{InboundEvent, OutboundIntent};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
}

/// Which party is currently permitted to transmit audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Listening,
    AgentSpeaking,
}

/// Local effects for the driver: frames to render, text to surface,
/// lifecycle notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutput {
    /// Start rendering this frame on the playback sink.
    Play(AudioFrame),
    /// Agent utterance text, for display.
    AgentText(String),
    /// Recognized user speech echoed back by the agent.
    UserTranscript(String),
    /// The playback queue drained; the agent finished speaking.
    AgentFinished,
    /// Close the transport if still open.
    CloseTransport,
    /// The session reached its terminal state. Carries the failure reason,
    /// or `None` for an explicit stop.
    Ended(Option<String>),
}

pub struct VoiceSession {
    config: SessionConfig,
    conn: ConnState,
    turn: Turn,
    setup_sent: bool,
    playback: PlaybackQueue,
    capture: CapturePipeline,
    outbound: Vec<OutboundIntent>,
    outputs: Vec<SessionOutput>,
}

impl VoiceSession {
    pub fn new(config: SessionConfig) -> Self {
        let playback = PlaybackQueue::new(config.max_queue_depth);
        let capture = CapturePipeline::new(config.sample_rate, config.frame_samples);
        Self {
            config,
            conn: ConnState::Disconnected,
            turn: Turn::Listening,
            setup_sent: false,
            playback,
            capture,
            outbound: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// User-initiated start: begin the transport handshake.
    pub fn start(&mut self) {
        if self.conn != ConnState::Disconnected {
            debug!(state = ?self.conn, "start ignored, session already active");
            return;
        }
        self.conn = ConnState::Connecting;
        info!(url = %self.config.url, "session connecting");
    }

    /// The transport opened: take ownership of the microphone source and
    /// send the setup intent exactly once.
    pub fn on_open(&mut self, source: Box<dyn AudioSource>) {
        if self.conn != ConnState::Connecting {
            warn!(state = ?self.conn, "transport opened in unexpected state");
            return;
        }
        self.conn = ConnState::Connected;
        self.turn = Turn::Listening;
        if !self.setup_sent {
            self.outbound
                .push(OutboundIntent::Setup(self.config.setup.clone()));
            self.setup_sent = true;
        }
        self.capture.start(source);
        info!("session connected");
    }

    /// One typed event from the transport.
    pub fn on_inbound(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::Error(reason) => {
                warn!(%reason, "transport error, ending session");
                self.teardown(Some(reason));
            }
            _ if self.conn != ConnState::Connected => {
                debug!(state = ?self.conn, "inbound event outside Connected, ignoring");
            }
            InboundEvent::Audio(frame) => {
                self.turn = Turn::AgentSpeaking;
                if let Some(frame) = self.playback.enqueue(frame) {
                    self.outputs.push(SessionOutput::Play(frame));
                }
            }
            InboundEvent::Text(text) => self.outputs.push(SessionOutput::AgentText(text)),
            InboundEvent::Transcript(text) => {
                self.outputs.push(SessionOutput::UserTranscript(text))
            }
            InboundEvent::TurnComplete => {
                self.turn = Turn::Listening;
                debug!("agent signalled turn complete");
            }
        }
    }

    /// One frame finished rendering on the playback sink.
    pub fn on_playback_done(&mut self) {
        match self.playback.on_frame_done() {
            PlaybackAdvance::Next(frame) => self.outputs.push(SessionOutput::Play(frame)),
            PlaybackAdvance::Drained => {
                // Self-healing turn-taking: no turn_complete required.
                self.turn = Turn::Listening;
                self.outputs.push(SessionOutput::AgentFinished);
            }
            PlaybackAdvance::Idle => {}
        }
    }

    /// One capture tick fired. Emits an audio intent only while listening;
    /// the half-duplex gate lives in the capture pipeline.
    pub fn on_capture_tick(&mut self) -> Result<(), SessionError> {
        if self.conn != ConnState::Connected {
            return Ok(());
        }
        if let Some(frame) = self.capture.tick(self.turn)? {
            self.outbound.push(OutboundIntent::AudioChunk(frame));
        }
        Ok(())
    }

    /// Queue a typed test message.
    pub fn send_text(&mut self, text: impl Into<String>) {
        if self.conn != ConnState::Connected {
            debug!("send_text ignored, not connected");
            return;
        }
        self.outbound.push(OutboundIntent::TextMessage(text.into()));
    }

    /// Explicit stop: the single cancellation point. Idempotent.
    pub fn stop(&mut self) {
        self.teardown(None);
    }

    fn teardown(&mut self, reason: Option<String>) {
        let was_active = self.conn != ConnState::Disconnected;
        self.capture.stop();
        self.playback.clear();
        self.turn = Turn::Listening;
        if was_active {
            self.conn = ConnState::Disconnected;
            self.outputs.push(SessionOutput::CloseTransport);
            self.outputs.push(SessionOutput::Ended(reason));
            info!("session ended");
        }
    }

    /// Drain intents for the transport, in send order.
    pub fn drain_outbound(&mut self) -> Vec<OutboundIntent> {
        std::mem::take(&mut self.outbound)
    }

    /// Drain local effects, in occurrence order.
    pub fn drain_outputs(&mut self) -> Vec<SessionOutput> {
        std::mem::take(&mut self.outputs)
    }

    pub fn conn_state(&self) -> ConnState {
        self.conn
    }

    pub fn turn(&self) -> Turn {
        self.turn
    }

    /// Frames pending playback, including the one currently rendering.
    pub fn playback_depth(&self) -> usize {
        self.playback.depth()
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_running()
    }
}
