//! One front door over the engine: class and sequence management,
//! recording sessions, classification, and the background trainer.
//!
//! Recording is strictly one session at a time; classification is a
//! stateless read and may be called from any thread; training runs on its
//! own thread with a polling status surface. The SQLite connection is not
//! `Sync`, so the service guards it with a mutex and the training worker
//! opens its own connection instead.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::app_dirs;
use crate::capture::{CaptureError, Observation, Recorder, TickOutcome};
use crate::classify::{ClassifyError, KnnClassifier, Prediction, ReferenceSequence};
use crate::config::{ConfigError, EngineConfig};
use crate::dtw::DtwOptions;
use crate::landmarks::{LandmarkFrame, feature_sequence, resample_frames};
use crate::store::{
    GestureClass, GestureDb, ModelSnapshot, SequenceMetadata, SequenceSummary, StoreError,
    StoredSequence,
};
use crate::training::{self, TrainingHandle, TrainingOptions, TrainingStatus};

/// Fewer frames than this cannot produce a meaningful DTW alignment.
pub const MIN_CLASSIFY_FRAMES: usize = 5;

/// Errors surfaced at the service boundary.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    AppDir(#[from] app_dirs::AppDirError),
    #[error("Failed to create data directory {path}: {source}")]
    CreateDataDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("A recording session is already in progress")]
    SessionBusy,
    #[error("No recording session in progress")]
    NoActiveSession,
    #[error("A training run is already in progress")]
    TrainingAlreadyRunning,
    #[error("Sequence too short to classify: got {got} frames, need at least {min}")]
    SequenceTooShort { got: usize, min: usize },
    #[error("Internal lock poisoned")]
    Poisoned,
}

/// A class row plus whether it gained samples since the last training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassStatus {
    #[serde(flatten)]
    pub class: GestureClass,
    pub stale: bool,
}

/// What one recording tick produced, with persistence already applied.
#[derive(Debug, Clone)]
pub enum RecordingUpdate {
    Countdown { seconds_left: u64 },
    WaitingForHand,
    Recording { frames_captured: usize },
    /// The window completed and the sequence was stored.
    Saved { sequence_id: Uuid },
    /// The session aborted; nothing was stored.
    Rejected(CaptureError),
}

struct RecordingSession {
    class_name: String,
    recorder: Recorder,
}

pub struct GestureService {
    data_root: PathBuf,
    config: EngineConfig,
    db: Mutex<GestureDb>,
    session: Mutex<Option<RecordingSession>>,
    training: Mutex<Option<TrainingHandle>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ServiceError> {
    mutex.lock().map_err(|_| ServiceError::Poisoned)
}

impl GestureService {
    /// Open the engine over an explicit data directory, creating it if
    /// needed.
    pub fn open(data_root: PathBuf, config: EngineConfig) -> Result<Self, ServiceError> {
        std::fs::create_dir_all(&data_root).map_err(|source| ServiceError::CreateDataDir {
            path: data_root.clone(),
            source,
        })?;
        let db = GestureDb::open(&data_root)?;
        Ok(Self {
            data_root,
            config,
            db: Mutex::new(db),
            session: Mutex::new(None),
            training: Mutex::new(None),
        })
    }

    /// Open the engine in the default `.mudra` location with the persisted
    /// config.
    pub fn open_default() -> Result<Self, ServiceError> {
        let config = EngineConfig::load_default()?;
        Self::open(app_dirs::data_dir()?, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // --- class and sequence management ---

    pub fn create_class(
        &self,
        name: &str,
        display_name: &str,
        duration_seconds: f32,
    ) -> Result<(), ServiceError> {
        lock(&self.db)?.create_class(name, display_name, duration_seconds)?;
        tracing::info!(class = name, duration_seconds, "gesture class created");
        Ok(())
    }

    /// List classes with staleness derived against the latest snapshot.
    pub fn list_classes(&self) -> Result<Vec<ClassStatus>, ServiceError> {
        let db = lock(&self.db)?;
        let snapshot = db.load_snapshot()?;
        let classes = db.list_classes()?;
        Ok(classes
            .into_iter()
            .map(|class| {
                let stale = class.is_stale(snapshot.as_ref());
                ClassStatus { class, stale }
            })
            .collect())
    }

    pub fn delete_class(&self, name: &str) -> Result<(), ServiceError> {
        lock(&self.db)?.delete_class(name)?;
        tracing::info!(class = name, "gesture class deleted");
        Ok(())
    }

    pub fn list_sequences(&self, class_name: &str) -> Result<Vec<SequenceSummary>, ServiceError> {
        Ok(lock(&self.db)?.list_sequences(class_name)?)
    }

    pub fn delete_sequence(&self, id: Uuid) -> Result<(), ServiceError> {
        lock(&self.db)?.delete_sequence(id)?;
        tracing::info!(sequence = %id, "sequence deleted");
        Ok(())
    }

    /// Store an externally captured sequence verbatim.
    pub fn record_sequence(
        &self,
        class_name: &str,
        frames: Vec<LandmarkFrame>,
        metadata: SequenceMetadata,
    ) -> Result<Uuid, ServiceError> {
        let min = self.config.capture.min_sequence_frames;
        if frames.len() < min {
            return Err(CaptureError::TooFewFrames {
                got: frames.len(),
                min,
            }
            .into());
        }
        let sequence = StoredSequence {
            id: Uuid::new_v4(),
            class_name: class_name.to_string(),
            frames,
            recorded_at: time::OffsetDateTime::now_utc().unix_timestamp(),
            metadata,
        };
        lock(&self.db)?.insert_sequence(&sequence)?;
        tracing::debug!(class = class_name, sequence = %sequence.id, frames = sequence.metadata.frame_count, "sequence stored");
        Ok(sequence.id)
    }

    // --- recording session ---

    /// Begin a recording session for one class. Only one session may exist
    /// at a time.
    pub fn begin_recording(&self, class_name: &str, now: Duration) -> Result<(), ServiceError> {
        let mut session = lock(&self.session)?;
        if session.is_some() {
            return Err(ServiceError::SessionBusy);
        }
        let class = lock(&self.db)?
            .get_class(class_name)?
            .ok_or_else(|| StoreError::UnknownClass(class_name.to_string()))?;
        let mut recorder = Recorder::new(self.config.capture.clone(), class.duration_seconds);
        recorder.start(now);
        *session = Some(RecordingSession {
            class_name: class.name,
            recorder,
        });
        Ok(())
    }

    /// Drive the active session one tick. A `Saved` update means the
    /// sequence was already persisted; both terminal updates end the
    /// session.
    pub fn tick_recording(
        &self,
        now: Duration,
        observation: Option<&Observation>,
    ) -> Result<RecordingUpdate, ServiceError> {
        let mut session_slot = lock(&self.session)?;
        let session = session_slot.as_mut().ok_or(ServiceError::NoActiveSession)?;
        match session.recorder.tick(now, observation) {
            TickOutcome::Idle => Err(ServiceError::NoActiveSession),
            TickOutcome::Countdown { seconds_left } => {
                Ok(RecordingUpdate::Countdown { seconds_left })
            }
            TickOutcome::WaitingForHand => Ok(RecordingUpdate::WaitingForHand),
            TickOutcome::Recording { frames_captured } => {
                Ok(RecordingUpdate::Recording { frames_captured })
            }
            TickOutcome::Saved(captured) => {
                let class_name = session.class_name.clone();
                *session_slot = None;
                drop(session_slot);
                let sequence_id =
                    self.record_sequence(&class_name, captured.frames, captured.metadata)?;
                Ok(RecordingUpdate::Saved { sequence_id })
            }
            TickOutcome::Rejected(error) => {
                *session_slot = None;
                tracing::info!(error = %error, "recording session rejected");
                Ok(RecordingUpdate::Rejected(error))
            }
        }
    }

    /// Abort the active session, if any, discarding its buffer.
    pub fn cancel_recording(&self) -> Result<(), ServiceError> {
        let mut session = lock(&self.session)?;
        if let Some(active) = session.as_mut() {
            active.recorder.cancel();
        }
        *session = None;
        Ok(())
    }

    // --- classification ---

    /// Classify one bounded, already-captured sequence against the store.
    pub fn classify(&self, frames: &[LandmarkFrame]) -> Result<Prediction, ServiceError> {
        if frames.len() < MIN_CLASSIFY_FRAMES {
            return Err(ServiceError::SequenceTooShort {
                got: frames.len(),
                min: MIN_CLASSIFY_FRAMES,
            });
        }
        let references: Vec<ReferenceSequence> = lock(&self.db)?
            .load_all_sequences()?
            .iter()
            .map(ReferenceSequence::from_stored)
            .collect();
        if references.is_empty() {
            return Err(ClassifyError::ModelNotTrained.into());
        }
        let classifier = KnnClassifier::new(
            references,
            self.config.classifier.k,
            DtwOptions::from_config(&self.config.dtw),
        );
        let query = feature_sequence(frames);
        let prediction = classifier.classify(&query)?;
        tracing::debug!(
            class = prediction.predicted_class.as_str(),
            confidence = prediction.confidence,
            references = classifier.reference_count(),
            "sequence classified"
        );
        Ok(prediction)
    }

    // --- training ---

    /// Start the background training pass; returns immediately.
    pub fn start_training(&self) -> Result<(), ServiceError> {
        let mut training = lock(&self.training)?;
        if let Some(handle) = training.as_ref() {
            if handle.status().is_running() {
                return Err(ServiceError::TrainingAlreadyRunning);
            }
        }
        let options = TrainingOptions::from_config(&self.config);
        *training = Some(training::spawn(self.data_root.clone(), options));
        tracing::info!("training started");
        Ok(())
    }

    /// Status of the most recent training run, if one was ever started.
    pub fn training_status(&self) -> Result<Option<TrainingStatus>, ServiceError> {
        Ok(lock(&self.training)?.as_ref().map(TrainingHandle::status))
    }

    /// Request cancellation of the running training pass, if any.
    pub fn cancel_training(&self) -> Result<(), ServiceError> {
        if let Some(handle) = lock(&self.training)?.as_ref() {
            handle.cancel();
        }
        Ok(())
    }

    /// Block until the current training run finishes and return its status.
    pub fn wait_for_training(&self) -> Result<Option<TrainingStatus>, ServiceError> {
        Ok(lock(&self.training)?.take().map(TrainingHandle::join))
    }

    pub fn latest_snapshot(&self) -> Result<Option<ModelSnapshot>, ServiceError> {
        Ok(lock(&self.db)?.load_snapshot()?)
    }

    // --- export ---

    /// Fixed-length resampled view of one stored sequence, for export or
    /// visualization. The persisted representation stays variable-length.
    pub fn export_fixed_length(&self, id: Uuid) -> Result<Vec<LandmarkFrame>, ServiceError> {
        let sequence = lock(&self.db)?
            .get_sequence(id)?
            .ok_or(StoreError::UnknownSequence(id))?;
        Ok(resample_frames(
            &sequence.frames,
            self.config.training.downsample_frames,
        ))
    }
}
