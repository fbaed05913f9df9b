//! Store and scheduler wired together.
//!
//! Every mutation goes to the store first and is followed by a full
//! reschedule that re-reads the persisted list. The scheduler never sees an
//! alarm the store has not accepted.

use chrono::NaiveDateTime;
use tracing::{info, warn};

use super::model::{Alarm, AlarmPatch, NewAlarm};
use super::scheduler::{AlarmScheduler, RescheduleReport, TimerBackend};
use super::store::{AlarmRepository, AlarmStore};
use crate::error::Result;

/// What a launch found and did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartupReport {
    /// Ids that failed to arm during the previous run.
    pub previous_failures: Vec<String>,
    pub report: RescheduleReport,
}

pub struct AlarmService<R, B> {
    store: AlarmStore<R>,
    scheduler: AlarmScheduler<B>,
    last_report: RescheduleReport,
}

impl<R: AlarmRepository, B: TimerBackend> AlarmService<R, B> {
    pub fn new(repo: R, backend: B) -> Self {
        Self {
            store: AlarmStore::new(repo),
            scheduler: AlarmScheduler::new(backend),
            last_report: RescheduleReport::default(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn store(&self) -> &AlarmStore<R> {
        &self.store
    }

    pub fn scheduler(&self) -> &AlarmScheduler<B> {
        &self.scheduler
    }

    pub fn last_report(&self) -> &RescheduleReport {
        &self.last_report
    }

    pub fn list(&self) -> Result<Vec<Alarm>> {
        self.store.list()
    }

    pub fn get(&self, id: &str) -> Result<Option<Alarm>> {
        self.store.get(id)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Launch-time pass: arm everything and retry whatever failed last time.
    pub fn startup(&mut self, now: NaiveDateTime) -> Result<StartupReport> {
        let previous_failures = self.store.repository().load_scheduling_failures()?;
        if !previous_failures.is_empty() {
            info!(count = previous_failures.len(), "retrying alarms that failed to arm last run");
        }
        let report = self.reschedule_all(now)?;
        Ok(StartupReport {
            previous_failures,
            report,
        })
    }

    /// Re-read the store and replace every timer.
    pub fn reschedule_all(&mut self, now: NaiveDateTime) -> Result<RescheduleReport> {
        let alarms = self.store.list()?;
        let report = self.scheduler.reschedule(&alarms, now);
        if !report.is_clean() {
            warn!(failed = ?report.failed_ids(), "some alarms could not be armed");
        }
        self.store
            .repository()
            .save_scheduling_failures(&report.failed_ids())?;
        self.last_report = report.clone();
        Ok(report)
    }

    pub fn create(&mut self, new: NewAlarm, now: NaiveDateTime) -> Result<Alarm> {
        let alarm = self.store.create(new)?;
        self.reschedule_all(now)?;
        Ok(alarm)
    }

    pub fn update(&mut self, id: &str, patch: &AlarmPatch, now: NaiveDateTime) -> Result<Alarm> {
        let alarm = self.store.update(id, patch)?;
        self.reschedule_all(now)?;
        Ok(alarm)
    }

    pub fn toggle(&mut self, id: &str, now: NaiveDateTime) -> Result<Alarm> {
        let alarm = self.store.toggle(id)?;
        self.reschedule_all(now)?;
        Ok(alarm)
    }

    pub fn delete(&mut self, id: &str, now: NaiveDateTime) -> Result<Alarm> {
        let removed = self.store.delete(id)?;
        self.scheduler.cancel(id);
        self.reschedule_all(now)?;
        Ok(removed)
    }

    /// Drop every timer, e.g. on shutdown.
    pub fn shutdown(&mut self) {
        self.scheduler.cancel_all();
    }
}
