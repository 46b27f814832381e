//! Wire envelopes
//!
//! JSON envelopes over one WebSocket, dispatched on a `"type"` field.
//! Outbound: `setup` (once), `audio_stream` (one per capture tick),
//! `text_input`. Inbound: `audio`, `text`, `turn_complete`, `transcript`.
//! Unrecognized inbound types are ignored, not errors.

use crate::error::SessionError;
use crate::pcm::AudioFrame;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tracing::debug;

/// Typed events decoded from inbound envelopes.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Agent speech chunk, already decoded to PCM.
    Audio(AudioFrame),
    /// Agent's textual utterance, for display.
    Text(String),
    /// Recognized echo of the user's own speech.
    Transcript(String),
    /// The agent finished its turn.
    TurnComplete,
    /// Transport failure or closure; ends the session.
    Error(String),
}

/// Intents serialized into outbound envelopes.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundIntent {
    /// Agent configuration, sent exactly once after connect.
    Setup(Value),
    /// One capture tick of microphone audio.
    AudioChunk(AudioFrame),
    /// User-typed test input.
    TextMessage(String),
}

/// Serialize an intent to its wire envelope.
pub fn encode_outbound(intent: &OutboundIntent) -> Result<String, SessionError> {
    let envelope = match intent {
        OutboundIntent::Setup(config) => json!({
            "type": "setup",
            "config": config,
        }),
        OutboundIntent::AudioChunk(frame) => json!({
            "type": "audio_stream",
            "audio_data": BASE64.encode(frame.as_bytes()),
            "format": "pcm",
            "sample_rate": frame.sample_rate,
        }),
        OutboundIntent::TextMessage(text) => json!({
            "type": "text_input",
            "text": text,
        }),
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Classify one raw inbound message.
///
/// `Ok(None)` means a structurally valid envelope of an unknown type
/// (ignored for forward compatibility). Errors mean the single message is
/// unusable; the caller logs it and moves on, the session keeps running.
pub fn decode_inbound(raw: &str, sample_rate: u32) -> Result<Option<InboundEvent>, SessionError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| SessionError::Protocol(format!("invalid envelope: {e}")))?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| SessionError::Protocol("envelope missing type discriminator".into()))?;

    match kind {
        "audio" => {
            let data = value
                .get("audio_data")
                .and_then(Value::as_str)
                .ok_or_else(|| SessionError::Protocol("audio envelope missing audio_data".into()))?;
            let bytes = BASE64
                .decode(data)
                .map_err(|e| SessionError::Decode(format!("invalid base64 audio: {e}")))?;
            let frame = AudioFrame::from_le_bytes(&bytes, sample_rate)?;
            Ok(Some(InboundEvent::Audio(frame)))
        }
        "text" => {
            let text = value
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| SessionError::Protocol("text envelope missing text".into()))?;
            Ok(Some(InboundEvent::Text(text.to_string())))
        }
        "turn_complete" => Ok(Some(InboundEvent::TurnComplete)),
        "transcript" => {
            let text = value
                .get("user_text")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    SessionError::Protocol("transcript envelope missing user_text".into())
                })?;
            Ok(Some(InboundEvent::Transcript(text.to_string())))
        }
        other => {
            debug!(kind = other, "ignoring unrecognized envelope type");
            Ok(None)
        }
    }
}
