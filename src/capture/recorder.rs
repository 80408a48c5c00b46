//! Tick-driven recording state machine.
//!
//! The recorder owns the frame buffer for one session and is driven by an
//! external clock: the caller invokes [`Recorder::tick`] at the capture
//! cadence with a monotonic timestamp and the latest observation. All
//! session errors resolve here; the machine always lands back in `Idle`.

use std::time::Duration;

use thiserror::Error;

use crate::config::CaptureSettings;
use crate::landmarks::{LandmarkFrame, normalize_frame};
use crate::store::SequenceMetadata;

use super::source::Observation;

/// Recoverable session failures. Both abort the session and discard the
/// buffer; the user simply retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("No hand detected within {waited_ms}ms")]
    CaptureTimeout { waited_ms: u64 },
    #[error("Too few frames captured: got {got}, need at least {min}")]
    TooFewFrames { got: usize, min: usize },
}

/// A completed recording window, ready to persist.
#[derive(Debug, Clone)]
pub struct CapturedSequence {
    pub frames: Vec<LandmarkFrame>,
    pub metadata: SequenceMetadata,
}

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Countdown { started_at: Duration },
    WaitForHand { started_at: Duration },
    Recording { started_at: Duration },
}

/// What one tick produced, for the caller to surface.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// No session in progress.
    Idle,
    Countdown { seconds_left: u64 },
    WaitingForHand,
    Recording { frames_captured: usize },
    /// The window elapsed with enough frames; the session is over.
    Saved(CapturedSequence),
    /// The session aborted; the buffer was discarded.
    Rejected(CaptureError),
}

pub struct Recorder {
    settings: CaptureSettings,
    /// Recording window for the class being captured.
    window: Duration,
    phase: Phase,
    frames: Vec<LandmarkFrame>,
}

impl Recorder {
    pub fn new(settings: CaptureSettings, duration_seconds: f32) -> Self {
        Self {
            settings,
            window: Duration::from_secs_f32(duration_seconds.max(0.0)),
            phase: Phase::Idle,
            frames: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Begin a session at `now`. Any previous buffer is discarded.
    pub fn start(&mut self, now: Duration) {
        self.frames.clear();
        self.phase = Phase::Countdown { started_at: now };
    }

    /// Abort the session and discard buffered frames.
    pub fn cancel(&mut self) {
        if self.is_active() {
            tracing::debug!(buffered = self.frames.len(), "recording cancelled");
        }
        self.frames.clear();
        self.phase = Phase::Idle;
    }

    /// Advance the machine one tick.
    ///
    /// `now` is a monotonic timestamp; `observation` is whatever the pose
    /// estimator most recently produced. During `Recording` every tick
    /// appends exactly one frame, hands present or not, so timing alignment
    /// survives detection dropouts.
    pub fn tick(&mut self, now: Duration, observation: Option<&Observation>) -> TickOutcome {
        match self.phase {
            Phase::Idle => TickOutcome::Idle,
            Phase::Countdown { started_at } => {
                let countdown = Duration::from_secs(self.settings.countdown_seconds);
                let elapsed = now.saturating_sub(started_at);
                if elapsed >= countdown {
                    self.phase = Phase::WaitForHand { started_at: now };
                    TickOutcome::WaitingForHand
                } else {
                    // Clamp so a tick sharing the start timestamp still
                    // reports the top of the 3-2-1 count, not one above it.
                    let seconds_left =
                        ((countdown - elapsed).as_secs() + 1).min(self.settings.countdown_seconds);
                    TickOutcome::Countdown { seconds_left }
                }
            }
            Phase::WaitForHand { started_at } => {
                let frame = observation
                    .map(|observation| normalize_frame(&observation.hands))
                    .unwrap_or_default();
                if frame.has_any_hand() {
                    self.phase = Phase::Recording { started_at: now };
                    self.frames.push(frame);
                    return TickOutcome::Recording {
                        frames_captured: self.frames.len(),
                    };
                }
                let waited = now.saturating_sub(started_at);
                if waited >= Duration::from_millis(self.settings.wait_for_hand_timeout_ms) {
                    self.cancel();
                    return TickOutcome::Rejected(CaptureError::CaptureTimeout {
                        waited_ms: waited.as_millis() as u64,
                    });
                }
                TickOutcome::WaitingForHand
            }
            Phase::Recording { started_at } => {
                if now.saturating_sub(started_at) >= self.window {
                    return self.finish();
                }
                let frame = observation
                    .map(|observation| normalize_frame(&observation.hands))
                    .unwrap_or_default();
                self.frames.push(frame);
                TickOutcome::Recording {
                    frames_captured: self.frames.len(),
                }
            }
        }
    }

    fn finish(&mut self) -> TickOutcome {
        let frames = std::mem::take(&mut self.frames);
        self.phase = Phase::Idle;
        let min = self.settings.min_sequence_frames;
        if frames.len() < min {
            return TickOutcome::Rejected(CaptureError::TooFewFrames {
                got: frames.len(),
                min,
            });
        }
        let metadata = SequenceMetadata {
            fps: 1000.0 / self.settings.tick_interval_ms.max(1) as f32,
            duration_ms: self.window.as_millis() as u64,
            frame_count: frames.len(),
        };
        tracing::debug!(frames = metadata.frame_count, "recording window complete");
        TickOutcome::Saved(CapturedSequence { frames, metadata })
    }
}
