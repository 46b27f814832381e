//! Capture pipeline
//!
//! Owns the microphone source for the lifetime of one session and frames
//! outgoing audio at a fixed tick size. Each tick is gated on the turn
//! flag: while the agent is speaking the tick is read and discarded, so no
//! microphone audio leaves the pipeline (half-duplex, avoids the agent
//! hearing itself).

use crate::error::SessionError;
use crate::pcm::AudioFrame;
use crate::session::Turn;
use std::path::Path;
use tracing::{debug, info, warn};

/// One tick's worth of microphone samples.
///
/// `read` fills up to `buf.len()` float samples and returns how many were
/// written; 0 means the source is exhausted (file sources only — live
/// devices block until a full buffer is available).
pub trait AudioSource: Send {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize, SessionError>;
}

pub struct CapturePipeline {
    source: Option<Box<dyn AudioSource>>,
    sample_rate: u32,
    frame_samples: usize,
    scratch: Vec<f32>,
}

impl CapturePipeline {
    pub fn new(sample_rate: u32, frame_samples: usize) -> Self {
        Self {
            source: None,
            sample_rate,
            frame_samples,
            scratch: vec![0.0; frame_samples],
        }
    }

    /// Install the microphone source. A previously installed source is
    /// released first; the device must never be held twice.
    pub fn start(&mut self, source: Box<dyn AudioSource>) {
        if self.source.take().is_some() {
            warn!("capture already running, releasing previous source");
        }
        self.source = Some(source);
        info!(
            sample_rate = self.sample_rate,
            frame_samples = self.frame_samples,
            "capture started"
        );
    }

    /// Release the source and halt capture. Safe to call when already
    /// stopped.
    pub fn stop(&mut self) {
        if self.source.take().is_some() {
            info!("microphone released");
        }
    }

    pub fn is_running(&self) -> bool {
        self.source.is_some()
    }

    /// Process one capture tick. Returns an encoded frame when the session
    /// is listening; while the agent speaks the tick is consumed but
    /// nothing is emitted.
    pub fn tick(&mut self, turn: Turn) -> Result<Option<AudioFrame>, SessionError> {
        let Some(source) = self.source.as_mut() else {
            return Ok(None);
        };
        self.scratch.resize(self.frame_samples, 0.0);
        let n = source.read(&mut self.scratch)?;
        if n == 0 {
            debug!("capture source exhausted");
            return Ok(None);
        }
        if turn == Turn::AgentSpeaking {
            return Ok(None);
        }
        Ok(Some(AudioFrame::from_f32(
            &self.scratch[..n],
            self.sample_rate,
        )))
    }
}

/// A WAV file standing in for a live microphone, for offline runs and
/// tests. Samples are converted to float once at open.
pub struct WavSource {
    samples: Vec<f32>,
    pos: usize,
}

impl WavSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let mut reader = hound::WavReader::open(path.as_ref())
            .map_err(|e| SessionError::Device(format!("failed to open WAV: {e}")))?;
        let spec = reader.spec();
        if spec.channels != 1 {
            return Err(SessionError::Device(format!(
                "expected mono WAV, got {} channels",
                spec.channels
            )));
        }
        let samples: Result<Vec<i16>, _> = reader.samples::<i16>().collect();
        let samples = samples
            .map_err(|e| SessionError::Device(format!("failed to read WAV samples: {e}")))?;
        Ok(Self {
            samples: crate::pcm::decode(&samples),
            pos: 0,
        })
    }
}

impl AudioSource for WavSource {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize, SessionError> {
        let remaining = &self.samples[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}
