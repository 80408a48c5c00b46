//! Boundary to the external pose estimator.
//!
//! The estimator runs its own detection loop and pushes whatever it sees;
//! the recorder pulls the most recent observation once per tick. A bounded
//! channel with latest-wins draining replaces any shared "last hands"
//! mutable state.

use std::sync::mpsc;

use crate::landmarks::RawHandObservation;

/// Raw per-tick output of the pose estimator. An empty `hands` list means
/// the estimator ran but saw nothing.
#[derive(Debug, Clone, Default)]
pub struct Observation {
    pub hands: Vec<RawHandObservation>,
}

impl Observation {
    pub fn new(hands: Vec<RawHandObservation>) -> Self {
        Self { hands }
    }
}

/// Pull side of the capture boundary. Implementations must never block.
pub trait ObservationSource {
    /// The most recent observation, or `None` if nothing has arrived yet.
    fn latest(&mut self) -> Option<Observation>;
}

/// Producer half handed to the pose-estimation loop.
#[derive(Clone)]
pub struct ObservationSender {
    tx: mpsc::SyncSender<Observation>,
}

impl ObservationSender {
    /// Push one observation. Returns `false` when the frame was dropped,
    /// either because the channel was full or the receiver is gone; dropped
    /// frames are acceptable since only the latest one matters.
    pub fn push(&self, observation: Observation) -> bool {
        self.tx.try_send(observation).is_ok()
    }
}

/// Receiver half that drains the channel and keeps only the newest entry.
pub struct ChannelSource {
    rx: mpsc::Receiver<Observation>,
    current: Option<Observation>,
}

impl ObservationSource for ChannelSource {
    fn latest(&mut self) -> Option<Observation> {
        while let Ok(observation) = self.rx.try_recv() {
            self.current = Some(observation);
        }
        self.current.clone()
    }
}

/// Build a bounded observation channel for one capture session.
pub fn observation_channel(capacity: usize) -> (ObservationSender, ChannelSource) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (
        ObservationSender { tx },
        ChannelSource { rx, current: None },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{Handedness, RawKeypoint};

    fn observation(x: f32) -> Observation {
        let keypoints = (0..21)
            .map(|_| RawKeypoint {
                x,
                y: 0.0,
                z: None,
            })
            .collect();
        Observation::new(vec![RawHandObservation {
            handedness: Handedness::Right,
            keypoints,
        }])
    }

    #[test]
    fn empty_channel_has_no_observation() {
        let (_tx, mut source) = observation_channel(4);
        assert!(source.latest().is_none());
    }

    #[test]
    fn draining_keeps_only_the_newest() {
        let (tx, mut source) = observation_channel(8);
        tx.push(observation(1.0));
        tx.push(observation(2.0));
        tx.push(observation(3.0));
        let latest = source.latest().unwrap();
        assert_eq!(latest.hands[0].keypoints[0].x, 3.0);
    }

    #[test]
    fn last_observation_sticks_between_pushes() {
        let (tx, mut source) = observation_channel(4);
        tx.push(observation(5.0));
        source.latest().unwrap();
        // No new push; the stale-but-latest frame is still served.
        let held = source.latest().unwrap();
        assert_eq!(held.hands[0].keypoints[0].x, 5.0);
    }

    #[test]
    fn full_channel_drops_the_push() {
        let (tx, mut source) = observation_channel(1);
        assert!(tx.push(observation(1.0)));
        assert!(!tx.push(observation(2.0)));
        assert_eq!(source.latest().unwrap().hands[0].keypoints[0].x, 1.0);
    }
}
