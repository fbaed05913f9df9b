//! Finished workouts and the statistics derived from them.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::session::WorkoutSummary;
use crate::activity::ActivityType;
use crate::error::StorageError;

/// One finished (or emergency-dismissed) workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub id: String,
    pub alarm_id: String,
    pub alarm_title: String,
    pub activity: ActivityType,
    pub target: u32,
    pub completed: u32,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: u64,
    pub was_completed: bool,
}

impl WorkoutRecord {
    pub fn from_summary(alarm_id: &str, alarm_title: &str, summary: &WorkoutSummary) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            alarm_id: alarm_id.to_string(),
            alarm_title: alarm_title.to_string(),
            activity: summary.activity,
            target: summary.target,
            completed: summary.completed,
            completed_at: summary.ended_at,
            duration_secs: summary.duration_secs,
            was_completed: summary.was_completed,
        }
    }
}

/// Persistence collaborator for workout history.
pub trait HistoryRepository {
    fn record_workout(&self, record: &WorkoutRecord) -> Result<(), StorageError>;
    /// Newest first.
    fn list_workouts(&self) -> Result<Vec<WorkoutRecord>, StorageError>;
    fn list_workouts_for_alarm(&self, alarm_id: &str) -> Result<Vec<WorkoutRecord>, StorageError>;
    /// Returns whether a record was removed.
    fn delete_workout(&self, id: &str) -> Result<bool, StorageError>;
    fn clear_workouts(&self) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkoutStats {
    pub total_workouts: u64,
    /// Sum of completed reps/steps/pulses across all records.
    pub total_exercises: u64,
    /// Mean completion percentage, current calendar month only.
    pub average_completion: u32,
    /// Consecutive days with at least one workout, ending today or yesterday.
    pub streak: u32,
    pub last_workout_at: Option<DateTime<Utc>>,
}

impl WorkoutStats {
    /// Compute statistics with `today` as the reference local date.
    pub fn compute(records: &[WorkoutRecord], today: NaiveDate) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let total_exercises = records.iter().map(|r| r.completed as u64).sum();

        let month: Vec<&WorkoutRecord> = records
            .iter()
            .filter(|r| {
                let d = local_date(r.completed_at);
                d.year() == today.year() && d.month() == today.month()
            })
            .collect();
        let average_completion = if month.is_empty() {
            0
        } else {
            let sum: f64 = month
                .iter()
                .filter(|r| r.target > 0)
                .map(|r| r.completed as f64 / r.target as f64 * 100.0)
                .sum();
            (sum / month.len() as f64).round() as u32
        };

        Self {
            total_workouts: records.len() as u64,
            total_exercises,
            average_completion,
            streak: streak(records, today),
            last_workout_at: records.iter().map(|r| r.completed_at).max(),
        }
    }

    /// Statistics as of the local date now.
    pub fn compute_now(records: &[WorkoutRecord]) -> Self {
        Self::compute(records, Local::now().date_naive())
    }
}

fn local_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

fn streak(records: &[WorkoutRecord], today: NaiveDate) -> u32 {
    let days: BTreeSet<NaiveDate> = records.iter().map(|r| local_date(r.completed_at)).collect();
    let Some(&latest) = days.iter().next_back() else {
        return 0;
    };
    if (today - latest).num_days() > 1 {
        return 0;
    }
    let mut count = 1;
    let mut expected = latest;
    for &day in days.iter().rev().skip(1) {
        match expected.pred_opt() {
            Some(prev) if prev == day => {
                count += 1;
                expected = day;
            }
            _ => break,
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};

    fn record_on(date: NaiveDate, completed: u32, target: u32) -> WorkoutRecord {
        let local = Local
            .from_local_datetime(&date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap()))
            .single()
            .unwrap();
        WorkoutRecord {
            id: uuid::Uuid::new_v4().to_string(),
            alarm_id: "a".into(),
            alarm_title: "Morning".into(),
            activity: ActivityType::Squats,
            target,
            completed,
            completed_at: local.with_timezone(&Utc),
            duration_secs: 60,
            was_completed: completed >= target,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_history() {
        let stats = WorkoutStats::compute(&[], day(2026, 3, 10));
        assert_eq!(stats, WorkoutStats::default());
    }

    #[test]
    fn streak_counts_consecutive_days() {
        let records = vec![
            record_on(day(2026, 3, 10), 10, 10),
            record_on(day(2026, 3, 9), 10, 10),
            record_on(day(2026, 3, 9), 5, 10),
            record_on(day(2026, 3, 8), 10, 10),
            record_on(day(2026, 3, 6), 10, 10),
        ];
        assert_eq!(WorkoutStats::compute(&records, day(2026, 3, 10)).streak, 3);
        // Yesterday still keeps the streak alive.
        assert_eq!(WorkoutStats::compute(&records, day(2026, 3, 11)).streak, 3);
        // Two days later it is broken.
        assert_eq!(WorkoutStats::compute(&records, day(2026, 3, 12)).streak, 0);
    }

    #[test]
    fn average_completion_uses_current_month_only() {
        let records = vec![
            record_on(day(2026, 3, 10), 10, 10),
            record_on(day(2026, 3, 2), 5, 10),
            record_on(day(2026, 2, 27), 0, 10),
        ];
        let stats = WorkoutStats::compute(&records, day(2026, 3, 10));
        assert_eq!(stats.average_completion, 75);
        assert_eq!(stats.total_workouts, 3);
        assert_eq!(stats.total_exercises, 15);
    }

    #[test]
    fn record_from_summary_keeps_abort_flag() {
        let now = Utc::now();
        let summary = WorkoutSummary {
            activity: ActivityType::Steps,
            target: 100,
            completed: 40,
            duration_secs: 90,
            started_at: now,
            ended_at: now,
            was_completed: false,
        };
        let record = WorkoutRecord::from_summary("alarm-1", "Wake up", &summary);
        assert!(!record.was_completed);
        assert_eq!(record.completed, 40);
        assert_eq!(record.alarm_id, "alarm-1");
    }
}
