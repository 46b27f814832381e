//! PCM codec
//!
//! Converts between float samples in `[-1, 1]` and the 16-bit little-endian
//! PCM used on the wire. Mono only. Conversion is lossy to 16-bit
//! quantization and nothing else: sample count and order are preserved.

use crate::error::SessionError;
use std::time::Duration;

/// A fixed-format chunk of linear PCM audio: mono, 16-bit signed samples
/// at `sample_rate` Hz. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub sample_rate: u32,
    pub samples: Vec<i16>,
}

impl AudioFrame {
    /// Encode float samples into a frame, clamping to the signed 16-bit
    /// range via `round(sample * 32768)` with saturation.
    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: encode(samples),
        }
    }

    /// Decode back to float samples (`sample / 32768.0`).
    pub fn to_f32(&self) -> Vec<f32> {
        decode(&self.samples)
    }

    /// Raw little-endian bytes of the samples, as sent on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.samples)
    }

    /// Rebuild a frame from wire bytes. An odd byte count cannot be a
    /// whole number of 16-bit samples and is rejected.
    pub fn from_le_bytes(bytes: &[u8], sample_rate: u32) -> Result<Self, SessionError> {
        if bytes.len() % 2 != 0 {
            return Err(SessionError::Decode(format!(
                "PCM payload of {} bytes is not a whole number of 16-bit samples",
                bytes.len()
            )));
        }
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Self {
            sample_rate,
            samples,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback duration of this frame at its sample rate.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Scale float samples to 16-bit with saturation.
pub fn encode(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s * 32768.0).round().clamp(-32768.0, 32767.0) as i16)
        .collect()
}

/// Inverse scaling of [`encode`].
pub fn decode(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}
