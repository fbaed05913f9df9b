//! Alarm trigger scheduler.
//!
//! Computes each enabled alarm's next occurrence and arms one timer per
//! alarm on a [`TimerBackend`]. `reschedule` is replace-all: every held timer
//! is cancelled before any new one is armed, so repeated calls never stack
//! timers and no stale timer can fire next to its replacement.
//!
//! A failure to arm one alarm is logged and reported; the remaining alarms
//! are still armed.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::model::{Alarm, AlarmTime, Day};
use crate::activity::ActivityType;
use crate::error::SchedulingError;
use crate::events::Event;

/// Opaque handle issued by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(pub u64);

/// Data delivered to the trigger callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub alarm_id: String,
    pub title: String,
    pub activity: ActivityType,
    pub target: u32,
}

/// Everything a backend needs to fire (and re-fire) one alarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireSpec {
    /// First occurrence, local wall-clock time.
    pub fire_at: NaiveDateTime,
    pub time: AlarmTime,
    pub days: Vec<Day>,
    pub repeats: bool,
    pub payload: TriggerPayload,
}

impl FireSpec {
    pub fn for_alarm(alarm: &Alarm, now: NaiveDateTime) -> Self {
        Self {
            fire_at: next_fire_after(alarm, now),
            time: alarm.time,
            days: alarm.days.iter().copied().collect(),
            repeats: true,
            payload: TriggerPayload {
                alarm_id: alarm.id.clone(),
                title: alarm.title.clone(),
                activity: alarm.activity,
                target: alarm.target_count,
            },
        }
    }

    /// Occurrence following `after` for the same recurrence.
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        next_occurrence(self.time, self.days.iter().copied(), after)
    }
}

/// Notification/timer primitive.
pub trait TimerBackend {
    /// Capability check. When `false` nothing is armed.
    fn is_available(&self) -> bool {
        true
    }

    fn arm(&mut self, spec: &FireSpec) -> Result<TimerId, SchedulingError>;

    /// Must be synchronous: once it returns the timer can no longer fire.
    fn cancel(&mut self, id: TimerId);
}

/// Soonest occurrence of `alarm` strictly after `now`.
///
/// Today counts when it is a configured day and the time is still ahead;
/// otherwise the nearest configured weekday, wrapping through the week up to
/// the same weekday seven days on. Falls back to `now + 7 days` for an alarm
/// with no days, which validation never lets through.
pub fn next_fire_after(alarm: &Alarm, now: NaiveDateTime) -> NaiveDateTime {
    next_occurrence(alarm.time, alarm.days.iter().copied(), now)
        .unwrap_or_else(|| now + Duration::days(7))
}

fn next_occurrence(
    time: AlarmTime,
    days: impl Iterator<Item = Day> + Clone,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let today = now.date();
    (0..=7).find_map(|offset| {
        let date = today + Duration::days(offset);
        let wanted = Day::from(date.weekday());
        if !days.clone().any(|d| d == wanted) {
            return None;
        }
        let candidate = date.and_time(time.naive());
        (candidate > now).then_some(candidate)
    })
}

/// Outcome of one `reschedule` pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RescheduleReport {
    /// `(alarm_id, fire_at)` for every armed alarm.
    pub armed: Vec<(String, NaiveDateTime)>,
    /// `(alarm_id, error)` for every alarm that could not be armed.
    pub failed: Vec<(String, SchedulingError)>,
    /// Disabled alarms left unarmed.
    pub skipped: Vec<String>,
}

impl RescheduleReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<String> {
        self.failed.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn events(&self) -> Vec<Event> {
        let armed = self.armed.iter().map(|(id, at)| Event::AlarmScheduled {
            alarm_id: id.clone(),
            fire_at: *at,
        });
        let failed = self.failed.iter().map(|(id, err)| Event::SchedulingFailed {
            alarm_id: id.clone(),
            reason: err.to_string(),
        });
        armed.chain(failed).collect()
    }
}

/// Holds one timer handle per armed alarm id; never a copy of the alarms.
pub struct AlarmScheduler<B> {
    backend: B,
    timers: BTreeMap<String, TimerId>,
}

impl<B: TimerBackend> AlarmScheduler<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            timers: BTreeMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Alarm ids that currently hold a timer.
    pub fn live_timers(&self) -> Vec<String> {
        self.timers.keys().cloned().collect()
    }

    pub fn is_armed(&self, alarm_id: &str) -> bool {
        self.timers.contains_key(alarm_id)
    }

    /// Cancel every held timer, then arm each enabled alarm.
    pub fn reschedule(&mut self, alarms: &[Alarm], now: NaiveDateTime) -> RescheduleReport {
        self.cancel_all();

        let mut report = RescheduleReport::default();
        let available = self.backend.is_available();
        if !available {
            warn!("timer backend unavailable; no alarms armed");
        }

        for alarm in alarms {
            if !alarm.enabled {
                report.skipped.push(alarm.id.clone());
                continue;
            }
            if !available {
                report.failed.push((
                    alarm.id.clone(),
                    SchedulingError::Unavailable("backend reported unavailable".to_string()),
                ));
                continue;
            }
            if let Err(err) = alarm.validate() {
                warn!(alarm_id = %alarm.id, %err, "refusing to arm invalid alarm");
                report
                    .failed
                    .push((alarm.id.clone(), SchedulingError::Backend(err.to_string())));
                continue;
            }

            let spec = FireSpec::for_alarm(alarm, now);
            match self.backend.arm(&spec) {
                Ok(id) => {
                    debug!(alarm_id = %alarm.id, fire_at = %spec.fire_at, "alarm armed");
                    self.timers.insert(alarm.id.clone(), id);
                    report.armed.push((alarm.id.clone(), spec.fire_at));
                }
                Err(err) => {
                    warn!(alarm_id = %alarm.id, %err, "failed to arm alarm");
                    report.failed.push((alarm.id.clone(), err));
                }
            }
        }

        info!(
            armed = report.armed.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "alarms rescheduled"
        );
        report
    }

    /// Cancel the timer for one alarm. Returns whether one was held.
    pub fn cancel(&mut self, alarm_id: &str) -> bool {
        match self.timers.remove(alarm_id) {
            Some(id) => {
                self.backend.cancel(id);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, id) in std::mem::take(&mut self.timers) {
            self.backend.cancel(id);
        }
    }
}
