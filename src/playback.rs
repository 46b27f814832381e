//! Audio playback queue
//!
//! Serializes arbitrary-size incoming frames into gapless sequential
//! playback: at most one frame is active at any instant, the rest wait in
//! FIFO order. The queue itself is a synchronous state-holder; the caller
//! renders the frames it hands out and reports each completion back via
//! [`PlaybackQueue::on_frame_done`].

use crate::error::SessionError;
use crate::pcm::AudioFrame;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Renders one frame to the output device, returning once it has played
/// out. The driver runs the sink on its own thread and reports each
/// completion back to the queue.
pub trait PlaybackSink: Send {
    fn play(&mut self, frame: &AudioFrame) -> Result<(), SessionError>;
}

/// What to do after one frame finishes rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackAdvance {
    /// Start this frame immediately.
    Next(AudioFrame),
    /// The queue went from non-empty to empty: the agent finished speaking.
    Drained,
    /// Nothing was playing (completion after a clear, or spurious).
    Idle,
}

pub struct PlaybackQueue {
    queue: VecDeque<AudioFrame>,
    playing: bool,
    max_depth: usize,
    dropped: u64,
}

impl PlaybackQueue {
    pub fn new(max_depth: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            playing: false,
            max_depth,
            dropped: 0,
        }
    }

    /// Append a frame. Returns the frame to start rendering right away if
    /// nothing is currently playing; otherwise it waits its turn. When the
    /// queue is full the oldest pending frame is dropped.
    pub fn enqueue(&mut self, frame: AudioFrame) -> Option<AudioFrame> {
        if !self.playing {
            self.playing = true;
            return Some(frame);
        }
        if self.queue.len() >= self.max_depth {
            self.queue.pop_front();
            self.dropped += 1;
            warn!(
                dropped = self.dropped,
                max_depth = self.max_depth,
                "playback queue full, dropping oldest frame"
            );
        }
        self.queue.push_back(frame);
        None
    }

    /// Report that the active frame finished rendering.
    pub fn on_frame_done(&mut self) -> PlaybackAdvance {
        if !self.playing {
            debug!("playback completion with nothing active, ignoring");
            return PlaybackAdvance::Idle;
        }
        match self.queue.pop_front() {
            Some(frame) => PlaybackAdvance::Next(frame),
            None => {
                self.playing = false;
                PlaybackAdvance::Drained
            }
        }
    }

    /// Discard all pending frames and forget the active one.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.playing = false;
    }

    /// Pending frames including the one currently playing.
    pub fn depth(&self) -> usize {
        self.queue.len() + usize::from(self.playing)
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: i16) -> AudioFrame {
        AudioFrame {
            sample_rate: 16_000,
            samples: vec![tag; 4],
        }
    }

    #[test]
    fn plays_frames_in_fifo_order() {
        let mut queue = PlaybackQueue::new(8);

        assert_eq!(queue.enqueue(frame(1)), Some(frame(1)));
        assert_eq!(queue.enqueue(frame(2)), None);
        assert_eq!(queue.enqueue(frame(3)), None);

        assert_eq!(queue.on_frame_done(), PlaybackAdvance::Next(frame(2)));
        assert_eq!(queue.on_frame_done(), PlaybackAdvance::Next(frame(3)));
        assert_eq!(queue.on_frame_done(), PlaybackAdvance::Drained);
    }

    #[test]
    fn only_one_frame_active_at_a_time() {
        let mut queue = PlaybackQueue::new(8);
        assert!(queue.enqueue(frame(1)).is_some());
        // Everything enqueued while a frame is active must wait.
        for tag in 2..10 {
            assert!(queue.enqueue(frame(tag)).is_none());
        }
        assert_eq!(queue.depth(), 9);
    }

    #[test]
    fn drained_only_after_last_frame() {
        let mut queue = PlaybackQueue::new(8);
        queue.enqueue(frame(1));
        queue.enqueue(frame(2));
        assert_ne!(queue.on_frame_done(), PlaybackAdvance::Drained);
        assert_eq!(queue.on_frame_done(), PlaybackAdvance::Drained);
        assert_eq!(queue.depth(), 0);
    }

    #[test]
    fn drops_oldest_when_full() {
        let mut queue = PlaybackQueue::new(2);
        queue.enqueue(frame(1)); // active
        queue.enqueue(frame(2));
        queue.enqueue(frame(3));
        queue.enqueue(frame(4)); // evicts 2

        assert_eq!(queue.on_frame_done(), PlaybackAdvance::Next(frame(3)));
        assert_eq!(queue.on_frame_done(), PlaybackAdvance::Next(frame(4)));
        assert_eq!(queue.on_frame_done(), PlaybackAdvance::Drained);
    }

    #[test]
    fn clear_discards_everything() {
        let mut queue = PlaybackQueue::new(8);
        queue.enqueue(frame(1));
        queue.enqueue(frame(2));
        queue.clear();

        assert_eq!(queue.depth(), 0);
        assert!(!queue.is_playing());
        // A stale completion from the cleared frame is ignored.
        assert_eq!(queue.on_frame_done(), PlaybackAdvance::Idle);
        // And the queue starts fresh afterwards.
        assert_eq!(queue.enqueue(frame(5)), Some(frame(5)));
    }
}
