//! PulseAudio device layer
//!
//! Microphone source and playback sink over PulseAudio's simple API,
//! S16LE mono at the session sample rate. Enabled with the `pulse`
//! feature; everything else in the crate is device-free.

use crate::capture::AudioSource;
use crate::error::SessionError;
use crate::pcm::AudioFrame;
use crate::playback::PlaybackSink;
use libpulse_binding::sample::{Format, Spec};
use libpulse_binding::stream::Direction;
use libpulse_simple_binding::Simple;
use tracing::info;

fn spec(sample_rate: u32) -> Spec {
    Spec {
        format: Format::S16le,
        channels: 1,
        rate: sample_rate,
    }
}

/// Microphone input from the default PulseAudio source.
pub struct PulseSource {
    simple: Simple,
    pcm: Vec<i16>,
}

impl PulseSource {
    pub fn new(app_name: &str, sample_rate: u32) -> Result<Self, SessionError> {
        let simple = Simple::new(
            None, // default server
            app_name,
            Direction::Record,
            None, // default device
            "record",
            &spec(sample_rate),
            None, // default channel map
            None, // default buffering
        )
        .map_err(|e| SessionError::Device(format!("failed to open microphone: {e}")))?;
        info!(sample_rate, "microphone opened");
        Ok(Self {
            simple,
            pcm: Vec::new(),
        })
    }
}

impl AudioSource for PulseSource {
    fn read(&mut self, buf: &mut [f32]) -> Result<usize, SessionError> {
        self.pcm.resize(buf.len(), 0);
        self.simple
            .read(bytemuck::cast_slice_mut(&mut self.pcm))
            .map_err(|e| SessionError::Device(format!("microphone read failed: {e}")))?;
        for (dst, &s) in buf.iter_mut().zip(&self.pcm) {
            *dst = s as f32 / 32768.0;
        }
        Ok(buf.len())
    }
}

/// Speaker output to the default PulseAudio sink. `play` blocks until the
/// frame has drained, which is what drives the queue's completion events.
pub struct PulseSink {
    simple: Simple,
}

impl PulseSink {
    pub fn new(app_name: &str, sample_rate: u32) -> Result<Self, SessionError> {
        let simple = Simple::new(
            None,
            app_name,
            Direction::Playback,
            None,
            "playback",
            &spec(sample_rate),
            None,
            None,
        )
        .map_err(|e| SessionError::Device(format!("failed to open playback device: {e}")))?;
        info!(sample_rate, "playback device opened");
        Ok(Self { simple })
    }
}

impl PlaybackSink for PulseSink {
    fn play(&mut self, frame: &AudioFrame) -> Result<(), SessionError> {
        self.simple
            .write(frame.as_bytes())
            .map_err(|e| SessionError::Device(format!("playback write failed: {e}")))?;
        self.simple
            .drain()
            .map_err(|e| SessionError::Device(format!("playback drain failed: {e}")))?;
        Ok(())
    }
}
