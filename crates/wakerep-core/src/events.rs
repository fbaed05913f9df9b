use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::activity::ActivityType;

/// Every state change in the system produces an Event.
/// The CLI prints them as JSON lines; a host app forwards them to its UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        activity: ActivityType,
        target: u32,
        sample_interval_ms: u64,
        at: DateTime<Utc>,
    },
    RepetitionDetected {
        count: u32,
        target: u32,
        /// Sample timestamp of the rising edge.
        at_ms: u64,
    },
    SessionCompleted {
        activity: ActivityType,
        target: u32,
        completed: u32,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    /// Emergency dismiss. Target not satisfied.
    SessionAborted {
        activity: ActivityType,
        target: u32,
        completed: u32,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    AlarmScheduled {
        alarm_id: String,
        /// Local wall-clock time of the next occurrence.
        fire_at: NaiveDateTime,
    },
    SchedulingFailed {
        alarm_id: String,
        reason: String,
    },
    AlarmTriggered {
        alarm_id: String,
        activity: ActivityType,
        target: u32,
        at: DateTime<Utc>,
    },
}
