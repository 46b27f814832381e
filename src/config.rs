//! Session configuration
//!
//! One `SessionConfig` parameterizes a whole session: endpoint, setup
//! payload, and the audio format constants. The sample rate is set here
//! once and applies to every frame in both directions; it is never
//! inferred from chunk sizes.

use serde_json::Value;
use std::time::Duration;

/// Configuration for one voice session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket endpoint of the voice agent.
    pub url: String,
    /// Payload of the `setup` envelope sent once after connect
    /// (agent id, system prompt, voice settings).
    pub setup: Value,
    /// PCM sample rate for both captured and played audio, in Hz.
    pub sample_rate: u32,
    /// Samples per capture tick.
    pub frame_samples: usize,
    /// Maximum queued (not yet playing) frames before drop-oldest kicks in.
    pub max_queue_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            setup: Value::Object(Default::default()),
            sample_rate: 16_000,
            frame_samples: 1024,
            max_queue_depth: 64,
        }
    }
}

impl SessionConfig {
    /// Wall-clock duration of one capture tick at the configured rate.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.frame_samples as f64 / self.sample_rate as f64)
    }
}
