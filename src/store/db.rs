use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use uuid::Uuid;

use crate::landmarks::LandmarkFrame;

use super::{
    GestureClass, MAX_CLASS_DURATION_SECONDS, MIN_CLASS_DURATION_SECONDS, ModelSnapshot,
    SequenceMetadata, SequenceSummary, StoredSequence,
};

/// Filename of the gesture database inside the data directory.
pub const DB_FILE_NAME: &str = "gestures.db";

const SNAPSHOT_KEY: &str = "latest";

/// Errors returned when managing the gesture database.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Data folder is not a directory: {0}")]
    InvalidRoot(PathBuf),
    #[error("Database query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("Unknown gesture class: {0}")]
    UnknownClass(String),
    #[error("Gesture class already exists: {0}")]
    DuplicateClass(String),
    #[error("Class duration {0}s is outside the allowed {MIN_CLASS_DURATION_SECONDS}-{MAX_CLASS_DURATION_SECONDS}s window")]
    InvalidDuration(f32),
    #[error("Unknown sequence: {0}")]
    UnknownSequence(Uuid),
    #[error("Stored frames are not valid JSON: {0}")]
    FramePayload(#[from] serde_json::Error),
    #[error("Database is busy, please retry")]
    Busy,
}

/// SQLite wrapper that stores gesture classes, sequences, and the latest
/// model snapshot.
pub struct GestureDb {
    connection: Connection,
}

impl GestureDb {
    /// Open (or create) the database inside the given data directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(StoreError::InvalidRoot(root.to_path_buf()));
        }
        let connection = Connection::open(root.join(DB_FILE_NAME))?;
        let db = Self { connection };
        db.apply_pragmas()?;
        db.apply_schema()?;
        Ok(db)
    }

    /// Create a gesture class with an empty sample set.
    pub fn create_class(
        &self,
        name: &str,
        display_name: &str,
        duration_seconds: f32,
    ) -> Result<(), StoreError> {
        if !(MIN_CLASS_DURATION_SECONDS..=MAX_CLASS_DURATION_SECONDS).contains(&duration_seconds) {
            return Err(StoreError::InvalidDuration(duration_seconds));
        }
        let inserted = self
            .connection
            .prepare_cached(
                "INSERT OR IGNORE INTO gesture_classes (name, display_name, duration_seconds)
                 VALUES (?1, ?2, ?3)",
            )
            .map_err(map_sql_error)?
            .execute(params![name, display_name, duration_seconds as f64])
            .map_err(map_sql_error)?;
        if inserted == 0 {
            return Err(StoreError::DuplicateClass(name.to_string()));
        }
        Ok(())
    }

    /// Fetch one class with its derived counters.
    pub fn get_class(&self, name: &str) -> Result<Option<GestureClass>, StoreError> {
        self.connection
            .prepare_cached(
                "SELECT c.name, c.display_name, c.duration_seconds,
                        COUNT(s.id), COALESCE(SUM(s.frame_count), 0)
                 FROM gesture_classes c
                 LEFT JOIN sequences s ON s.class_name = c.name
                 WHERE c.name = ?1
                 GROUP BY c.name",
            )
            .map_err(map_sql_error)?
            .query_row(params![name], row_to_class)
            .optional()
            .map_err(map_sql_error)
    }

    /// List all classes with sequence and frame counts.
    pub fn list_classes(&self) -> Result<Vec<GestureClass>, StoreError> {
        let mut stmt = self
            .connection
            .prepare_cached(
                "SELECT c.name, c.display_name, c.duration_seconds,
                        COUNT(s.id), COALESCE(SUM(s.frame_count), 0)
                 FROM gesture_classes c
                 LEFT JOIN sequences s ON s.class_name = c.name
                 GROUP BY c.name
                 ORDER BY c.name ASC",
            )
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map([], row_to_class)
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        Ok(rows)
    }

    /// Delete a class and, via the foreign key cascade, all its sequences.
    pub fn delete_class(&self, name: &str) -> Result<(), StoreError> {
        let removed = self
            .connection
            .prepare_cached("DELETE FROM gesture_classes WHERE name = ?1")
            .map_err(map_sql_error)?
            .execute(params![name])
            .map_err(map_sql_error)?;
        if removed == 0 {
            return Err(StoreError::UnknownClass(name.to_string()));
        }
        Ok(())
    }

    /// Persist one recorded sequence verbatim.
    pub fn insert_sequence(&self, sequence: &StoredSequence) -> Result<(), StoreError> {
        if self.get_class(&sequence.class_name)?.is_none() {
            return Err(StoreError::UnknownClass(sequence.class_name.clone()));
        }
        let frames = serde_json::to_string(&sequence.frames)?;
        self.connection
            .prepare_cached(
                "INSERT INTO sequences (id, class_name, recorded_at, fps, duration_ms, frame_count, frames)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .map_err(map_sql_error)?
            .execute(params![
                sequence.id.to_string(),
                sequence.class_name,
                sequence.recorded_at,
                sequence.metadata.fps as f64,
                sequence.metadata.duration_ms as i64,
                sequence.metadata.frame_count as i64,
                frames,
            ])
            .map_err(map_sql_error)?;
        Ok(())
    }

    /// Fetch one sequence with its frames.
    pub fn get_sequence(&self, id: Uuid) -> Result<Option<StoredSequence>, StoreError> {
        let row = self
            .connection
            .prepare_cached(
                "SELECT id, class_name, recorded_at, fps, duration_ms, frame_count, frames
                 FROM sequences WHERE id = ?1",
            )
            .map_err(map_sql_error)?
            .query_row(params![id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .optional()
            .map_err(map_sql_error)?;
        let Some((id, class_name, recorded_at, fps, duration_ms, frame_count, frames)) = row else {
            return Ok(None);
        };
        let frames: Vec<LandmarkFrame> = serde_json::from_str(&frames)?;
        Ok(Some(StoredSequence {
            id: parse_uuid(&id)?,
            class_name,
            frames,
            recorded_at,
            metadata: SequenceMetadata {
                fps: fps as f32,
                duration_ms: duration_ms as u64,
                frame_count: frame_count as usize,
            },
        }))
    }

    /// List sequence summaries for one class, oldest first.
    pub fn list_sequences(&self, class_name: &str) -> Result<Vec<SequenceSummary>, StoreError> {
        if self.get_class(class_name)?.is_none() {
            return Err(StoreError::UnknownClass(class_name.to_string()));
        }
        let mut stmt = self
            .connection
            .prepare_cached(
                "SELECT id, class_name, recorded_at, fps, duration_ms, frame_count
                 FROM sequences WHERE class_name = ?1 ORDER BY recorded_at ASC, id ASC",
            )
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![class_name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        rows.into_iter()
            .map(|(id, class_name, recorded_at, fps, duration_ms, frame_count)| {
                Ok(SequenceSummary {
                    id: parse_uuid(&id)?,
                    class_name,
                    recorded_at,
                    metadata: SequenceMetadata {
                        fps: fps as f32,
                        duration_ms: duration_ms as u64,
                        frame_count: frame_count as usize,
                    },
                })
            })
            .collect()
    }

    /// Load every stored sequence across all classes; the trainer and the
    /// classifier take this as their consistent snapshot of the store.
    pub fn load_all_sequences(&self) -> Result<Vec<StoredSequence>, StoreError> {
        let mut stmt = self
            .connection
            .prepare_cached(
                "SELECT id FROM sequences ORDER BY class_name ASC, recorded_at ASC, id ASC",
            )
            .map_err(map_sql_error)?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        let mut sequences = Vec::with_capacity(ids.len());
        for id in ids {
            let id = parse_uuid(&id)?;
            if let Some(sequence) = self.get_sequence(id)? {
                sequences.push(sequence);
            }
        }
        Ok(sequences)
    }

    /// Remove one sequence whole.
    pub fn delete_sequence(&self, id: Uuid) -> Result<(), StoreError> {
        let removed = self
            .connection
            .prepare_cached("DELETE FROM sequences WHERE id = ?1")
            .map_err(map_sql_error)?
            .execute(params![id.to_string()])
            .map_err(map_sql_error)?;
        if removed == 0 {
            return Err(StoreError::UnknownSequence(id));
        }
        Ok(())
    }

    /// Atomically replace the latest model snapshot.
    pub fn save_snapshot(&self, snapshot: &ModelSnapshot) -> Result<(), StoreError> {
        let payload = serde_json::to_string(snapshot)?;
        self.connection
            .prepare_cached(
                "INSERT INTO model_snapshot (key, payload) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET payload = excluded.payload",
            )
            .map_err(map_sql_error)?
            .execute(params![SNAPSHOT_KEY, payload])
            .map_err(map_sql_error)?;
        Ok(())
    }

    /// Load the latest model snapshot, if any training run ever completed.
    pub fn load_snapshot(&self) -> Result<Option<ModelSnapshot>, StoreError> {
        let payload = self
            .connection
            .prepare_cached("SELECT payload FROM model_snapshot WHERE key = ?1")
            .map_err(map_sql_error)?
            .query_row(params![SNAPSHOT_KEY], |row| row.get::<_, String>(0))
            .optional()
            .map_err(map_sql_error)?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    fn apply_pragmas(&self) -> Result<(), StoreError> {
        self.connection
            .execute_batch(
                "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;
             PRAGMA temp_store=MEMORY;",
            )
            .map_err(map_sql_error)?;
        Ok(())
    }

    fn apply_schema(&self) -> Result<(), StoreError> {
        self.connection
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS gesture_classes (
                name TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                duration_seconds REAL NOT NULL
            );
             CREATE TABLE IF NOT EXISTS sequences (
                id TEXT PRIMARY KEY,
                class_name TEXT NOT NULL REFERENCES gesture_classes(name) ON DELETE CASCADE,
                recorded_at INTEGER NOT NULL,
                fps REAL NOT NULL,
                duration_ms INTEGER NOT NULL,
                frame_count INTEGER NOT NULL,
                frames TEXT NOT NULL
            );
             CREATE INDEX IF NOT EXISTS idx_sequences_class ON sequences(class_name);
             CREATE TABLE IF NOT EXISTS model_snapshot (
                key TEXT PRIMARY KEY,
                payload TEXT NOT NULL
            );",
            )
            .map_err(map_sql_error)?;
        Ok(())
    }
}

fn row_to_class(row: &rusqlite::Row<'_>) -> rusqlite::Result<GestureClass> {
    Ok(GestureClass {
        name: row.get(0)?,
        display_name: row.get(1)?,
        duration_seconds: row.get::<_, f64>(2)? as f32,
        sequence_count: row.get::<_, i64>(3)? as usize,
        total_frames: row.get::<_, i64>(4)? as usize,
    })
}

fn parse_uuid(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|_| StoreError::Sql(rusqlite::Error::InvalidQuery))
}

/// Translate rusqlite errors into friendlier StoreError variants.
fn map_sql_error(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(sql_err, _)
            if sql_err.extended_code == rusqlite::ffi::SQLITE_BUSY =>
        {
            StoreError::Busy
        }
        other => StoreError::Sql(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::LandmarkFrame;
    use tempfile::tempdir;

    fn sequence(class_name: &str, frame_count: usize) -> StoredSequence {
        StoredSequence {
            id: Uuid::new_v4(),
            class_name: class_name.to_string(),
            frames: vec![LandmarkFrame::default(); frame_count],
            recorded_at: 1_700_000_000,
            metadata: SequenceMetadata {
                fps: 30.0,
                duration_ms: 3000,
                frame_count,
            },
        }
    }

    #[test]
    fn classes_round_trip_with_counts() {
        let dir = tempdir().unwrap();
        let db = GestureDb::open(dir.path()).unwrap();
        db.create_class("wave", "Wave", 3.0).unwrap();
        db.insert_sequence(&sequence("wave", 12)).unwrap();
        db.insert_sequence(&sequence("wave", 20)).unwrap();

        let classes = db.list_classes().unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].sequence_count, 2);
        assert_eq!(classes[0].total_frames, 32);
    }

    #[test]
    fn duplicate_class_is_rejected() {
        let dir = tempdir().unwrap();
        let db = GestureDb::open(dir.path()).unwrap();
        db.create_class("wave", "Wave", 3.0).unwrap();
        let err = db.create_class("wave", "Wave again", 4.0).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateClass(_)));
    }

    #[test]
    fn duration_outside_window_is_rejected() {
        let dir = tempdir().unwrap();
        let db = GestureDb::open(dir.path()).unwrap();
        assert!(matches!(
            db.create_class("fast", "Fast", 1.0),
            Err(StoreError::InvalidDuration(_))
        ));
        assert!(matches!(
            db.create_class("slow", "Slow", 7.5),
            Err(StoreError::InvalidDuration(_))
        ));
    }

    #[test]
    fn sequence_for_unknown_class_is_rejected() {
        let dir = tempdir().unwrap();
        let db = GestureDb::open(dir.path()).unwrap();
        let err = db.insert_sequence(&sequence("ghost", 10)).unwrap_err();
        assert!(matches!(err, StoreError::UnknownClass(_)));
    }

    #[test]
    fn deleting_a_class_cascades_to_its_sequences() {
        let dir = tempdir().unwrap();
        let db = GestureDb::open(dir.path()).unwrap();
        db.create_class("wave", "Wave", 3.0).unwrap();
        db.create_class("still", "Still", 3.0).unwrap();
        db.insert_sequence(&sequence("wave", 10)).unwrap();
        db.insert_sequence(&sequence("still", 10)).unwrap();

        db.delete_class("wave").unwrap();
        assert_eq!(db.load_all_sequences().unwrap().len(), 1);
        assert!(db.list_classes().unwrap().iter().all(|c| c.name == "still"));
    }

    #[test]
    fn sequence_frames_round_trip() {
        let dir = tempdir().unwrap();
        let db = GestureDb::open(dir.path()).unwrap();
        db.create_class("wave", "Wave", 3.0).unwrap();
        let mut stored = sequence("wave", 11);
        let mut points = [[0.0_f32; 3]; crate::landmarks::NUM_KEYPOINTS];
        points[8] = [0.25, -0.5, 0.1];
        stored.frames[3].left_hand = Some(points);
        db.insert_sequence(&stored).unwrap();

        let loaded = db.get_sequence(stored.id).unwrap().unwrap();
        assert_eq!(loaded.frames.len(), 11);
        assert_eq!(loaded.frames[3].left_hand.unwrap()[8], [0.25, -0.5, 0.1]);
        assert_eq!(loaded.metadata.frame_count, 11);
    }

    #[test]
    fn deleting_one_sequence_leaves_the_rest() {
        let dir = tempdir().unwrap();
        let db = GestureDb::open(dir.path()).unwrap();
        db.create_class("wave", "Wave", 3.0).unwrap();
        let keep = sequence("wave", 10);
        let drop = sequence("wave", 10);
        db.insert_sequence(&keep).unwrap();
        db.insert_sequence(&drop).unwrap();

        db.delete_sequence(drop.id).unwrap();
        let summaries = db.list_sequences("wave").unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, keep.id);

        assert!(matches!(
            db.delete_sequence(drop.id),
            Err(StoreError::UnknownSequence(_))
        ));
    }

    #[test]
    fn snapshot_round_trips_under_latest_key() {
        let dir = tempdir().unwrap();
        let db = GestureDb::open(dir.path()).unwrap();
        assert!(db.load_snapshot().unwrap().is_none());

        let snapshot = ModelSnapshot {
            trained_at: 1_700_000_000,
            final_accuracy: 0.85,
            num_classes: 2,
            total_samples: 12,
            class_sample_counts: [("wave".to_string(), 7), ("still".to_string(), 5)]
                .into_iter()
                .collect(),
            k: 3,
            downsample_frames: 30,
        };
        db.save_snapshot(&snapshot).unwrap();
        let loaded = db.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded.class_sample_counts["wave"], 7);

        let newer = ModelSnapshot {
            final_accuracy: 0.95,
            ..snapshot
        };
        db.save_snapshot(&newer).unwrap();
        let loaded = db.load_snapshot().unwrap().unwrap();
        assert!((loaded.final_accuracy - 0.95).abs() < 1e-6);
    }

    #[test]
    fn open_rejects_missing_root() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            GestureDb::open(&missing),
            Err(StoreError::InvalidRoot(_))
        ));
    }
}
