//! SQLite storage.
//!
//! Provides persistent storage for:
//! - The alarm list, as one JSON document in the key-value table
//! - Alarm ids that failed to arm on the last reschedule
//! - Finished workouts, one row each

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{data_dir, migrations};
use crate::activity::ActivityType;
use crate::alarm::{Alarm, AlarmRepository};
use crate::error::StorageError;
use crate::workout::{HistoryRepository, WorkoutRecord};

const ALARMS_KEY: &str = "alarms";
const SCHEDULING_FAILURES_KEY: &str = "scheduling_failures";

/// SQLite database for alarms and workout history.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `<data dir>/wakerep.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StorageError> {
        Self::open_at(&data_dir()?.join("wakerep.db"))
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        migrations::migrate(&db.conn)?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        migrations::migrate(&db.conn)?;
        Ok(db)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn kv_get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.kv_get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                key: key.to_string(),
                message: e.to_string(),
            })
    }

    fn kv_set_json<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.kv_set(key, &raw)
    }

    fn query_workouts(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<WorkoutRecord>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, row_to_workout)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn row_to_workout(row: &Row<'_>) -> rusqlite::Result<WorkoutRecord> {
    let activity: String = row.get(3)?;
    let completed_at: String = row.get(6)?;
    let to_err = |idx: usize, e: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    };
    Ok(WorkoutRecord {
        id: row.get(0)?,
        alarm_id: row.get(1)?,
        alarm_title: row.get(2)?,
        activity: ActivityType::from_str(&activity).map_err(|e| to_err(3, e.to_string()))?,
        target: row.get(4)?,
        completed: row.get(5)?,
        completed_at: DateTime::parse_from_rfc3339(&completed_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| to_err(6, e.to_string()))?,
        duration_secs: row.get(7)?,
        was_completed: row.get(8)?,
    })
}

const WORKOUT_COLUMNS: &str = "id, alarm_id, alarm_title, activity, target, completed, \
                               completed_at, duration_secs, was_completed";

impl AlarmRepository for Database {
    fn load_alarms(&self) -> Result<Vec<Alarm>, StorageError> {
        Ok(self.kv_get_json(ALARMS_KEY)?.unwrap_or_default())
    }

    fn save_alarms(&self, alarms: &[Alarm]) -> Result<(), StorageError> {
        self.kv_set_json(ALARMS_KEY, alarms)
    }

    fn load_scheduling_failures(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.kv_get_json(SCHEDULING_FAILURES_KEY)?.unwrap_or_default())
    }

    fn save_scheduling_failures(&self, alarm_ids: &[String]) -> Result<(), StorageError> {
        if alarm_ids.is_empty() {
            return self.kv_delete(SCHEDULING_FAILURES_KEY);
        }
        self.kv_set_json(SCHEDULING_FAILURES_KEY, alarm_ids)
    }
}

impl HistoryRepository for Database {
    fn record_workout(&self, record: &WorkoutRecord) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT INTO workout_sessions
                 (id, alarm_id, alarm_title, activity, target, completed,
                  completed_at, duration_secs, was_completed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                record.alarm_id,
                record.alarm_title,
                record.activity.as_str(),
                record.target,
                record.completed,
                record.completed_at.to_rfc3339(),
                record.duration_secs,
                record.was_completed,
            ],
        )?;
        Ok(())
    }

    fn list_workouts(&self) -> Result<Vec<WorkoutRecord>, StorageError> {
        self.query_workouts(
            &format!("SELECT {WORKOUT_COLUMNS} FROM workout_sessions ORDER BY completed_at DESC"),
            [],
        )
    }

    fn list_workouts_for_alarm(&self, alarm_id: &str) -> Result<Vec<WorkoutRecord>, StorageError> {
        self.query_workouts(
            &format!(
                "SELECT {WORKOUT_COLUMNS} FROM workout_sessions
                 WHERE alarm_id = ?1 ORDER BY completed_at DESC"
            ),
            params![alarm_id],
        )
    }

    fn delete_workout(&self, id: &str) -> Result<bool, StorageError> {
        let n = self
            .conn
            .execute("DELETE FROM workout_sessions WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }

    fn clear_workouts(&self) -> Result<(), StorageError> {
        self.conn.execute("DELETE FROM workout_sessions", [])?;
        Ok(())
    }
}
