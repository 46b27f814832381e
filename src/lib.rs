//! voxlink - real-time half-duplex voice session client
//!
//! One persistent WebSocket carries JSON envelopes in both directions:
//! microphone audio goes out as base64 PCM, agent speech comes back the
//! same way and is played gaplessly in arrival order. A turn flag gates
//! the microphone while the agent speaks so the agent never hears itself.
//! Sessions are explicit values (no globals); everything is parameterized
//! by one [`SessionConfig`], including the sample rate, which is fixed for
//! the whole session.

#![forbid(unsafe_code)]

/// Microphone ownership, tick framing, and the half-duplex gate
pub mod capture;
/// Per-session configuration
pub mod config;
/// PulseAudio microphone/speaker (feature `pulse`)
#[cfg(feature = "pulse")]
pub mod device;
/// Error taxonomy
pub mod error;
/// Float <-> 16-bit PCM conversion and the audio frame type
pub mod pcm;
/// Sequential playback queue
pub mod playback;
/// Wire envelope encode/decode
pub mod protocol;
/// Async driver and session handle
pub mod runner;
/// Session state machine
pub mod session;
/// WebSocket transport adapter
pub mod transport;

pub use capture::{AudioSource, CapturePipeline, WavSource};
pub use config::SessionConfig;
pub use error::SessionError;
pub use pcm::AudioFrame;
pub use playback::{PlaybackQueue, PlaybackSink};
pub use protocol::{InboundEvent, OutboundIntent};
pub use runner::SessionHandle;
pub use session::{ConnState, SessionOutput, Turn, VoiceSession};
pub use transport::Transport;
