//! Sequence capture: the pose-estimator boundary and the recording
//! state machine that turns observations into stored-ready sequences.

mod recorder;
mod source;

pub use recorder::{CaptureError, CapturedSequence, Recorder, TickOutcome};
pub use source::{ChannelSource, Observation, ObservationSender, ObservationSource, observation_channel};
