//! Timer backend running on the tokio runtime.
//!
//! One task per armed alarm: sleep until the next occurrence, hand the
//! payload to the trigger callback, then re-arm for the following
//! occurrence. Cancelling flips the task's flag before aborting it, so a
//! cancelled timer never reaches the callback even if its sleep already
//! elapsed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDateTime, TimeZone};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::scheduler::{FireSpec, TimerBackend, TimerId, TriggerPayload};
use crate::error::SchedulingError;

pub type TriggerCallback = Arc<dyn Fn(TriggerPayload) + Send + Sync>;

struct ArmedTask {
    cancelled: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

pub struct TokioTimerBackend {
    handle: Option<Handle>,
    /// User switch for alarm notifications; off means nothing is armed.
    notifications: bool,
    on_trigger: TriggerCallback,
    next_id: u64,
    tasks: HashMap<TimerId, ArmedTask>,
}

impl TokioTimerBackend {
    /// Bind to the runtime of the calling context, if any.
    pub fn new(on_trigger: TriggerCallback) -> Self {
        Self {
            handle: Handle::try_current().ok(),
            notifications: true,
            on_trigger,
            next_id: 0,
            tasks: HashMap::new(),
        }
    }

    pub fn with_handle(handle: Handle, on_trigger: TriggerCallback) -> Self {
        Self {
            handle: Some(handle),
            notifications: true,
            on_trigger,
            next_id: 0,
            tasks: HashMap::new(),
        }
    }

    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications = enabled;
        self
    }

    pub fn armed_count(&self) -> usize {
        self.tasks.len()
    }
}

impl TimerBackend for TokioTimerBackend {
    fn is_available(&self) -> bool {
        self.notifications && self.handle.is_some()
    }

    fn arm(&mut self, spec: &FireSpec) -> Result<TimerId, SchedulingError> {
        if !self.notifications {
            return Err(SchedulingError::Unavailable(
                "notifications disabled".to_string(),
            ));
        }
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| SchedulingError::Unavailable("no tokio runtime".to_string()))?;

        self.next_id += 1;
        let id = TimerId(self.next_id);
        let cancelled = Arc::new(AtomicBool::new(false));
        let join = handle.spawn(run_timer(
            spec.clone(),
            Arc::clone(&self.on_trigger),
            Arc::clone(&cancelled),
        ));
        self.tasks.insert(id, ArmedTask { cancelled, join });
        debug!(timer = id.0, alarm_id = %spec.payload.alarm_id, "timer task spawned");
        Ok(id)
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(task) = self.tasks.remove(&id) {
            task.cancelled.store(true, Ordering::SeqCst);
            task.join.abort();
        }
    }
}

impl Drop for TokioTimerBackend {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.cancelled.store(true, Ordering::SeqCst);
            task.join.abort();
        }
    }
}

async fn run_timer(spec: FireSpec, on_trigger: TriggerCallback, cancelled: Arc<AtomicBool>) {
    let mut fire_at = spec.fire_at;
    loop {
        tokio::time::sleep(until(fire_at)).await;
        if cancelled.load(Ordering::SeqCst) {
            return;
        }
        info!(alarm_id = %spec.payload.alarm_id, %fire_at, "alarm fired");
        on_trigger(spec.payload.clone());

        if !spec.repeats {
            return;
        }
        // Occurrences missed while the host was asleep are skipped.
        let resume_from = fire_at.max(Local::now().naive_local());
        match spec.next_after(resume_from) {
            Some(next) => fire_at = next,
            None => return,
        }
    }
}

/// Time left until a local wall-clock instant. Zero when it already passed.
fn until(at: NaiveDateTime) -> std::time::Duration {
    let target = Local
        .from_local_datetime(&at)
        .earliest()
        // Skipped by a DST jump: fire right after the gap.
        .or_else(|| Local.from_local_datetime(&(at + Duration::hours(1))).earliest());
    target
        .and_then(|t| (t - Local::now()).to_std().ok())
        .unwrap_or(std::time::Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityType;
    use crate::alarm::model::{AlarmTime, Day, NewAlarm};
    use crate::alarm::scheduler::AlarmScheduler;
    use chrono::Timelike;
    use std::sync::Mutex;

    fn spec_at(fire_at: NaiveDateTime) -> FireSpec {
        FireSpec {
            fire_at,
            time: AlarmTime::new(7, 0).unwrap(),
            days: vec![Day::Mon],
            repeats: true,
            payload: TriggerPayload {
                alarm_id: "a".into(),
                title: "Wake".into(),
                activity: ActivityType::Squats,
                target: 20,
            },
        }
    }

    #[test]
    fn unavailable_without_runtime() {
        let mut backend = TokioTimerBackend::new(Arc::new(|_: TriggerPayload| {}));
        assert!(!backend.is_available());
        let err = backend
            .arm(&spec_at(Local::now().naive_local()))
            .unwrap_err();
        assert!(matches!(err, SchedulingError::Unavailable(_)));
    }

    #[tokio::test]
    async fn disabled_notifications_arm_nothing() {
        let backend = TokioTimerBackend::new(Arc::new(|_: TriggerPayload| {}))
            .with_notifications(false);
        assert!(!backend.is_available());

        let alarm = NewAlarm::new("Wake", AlarmTime::new(7, 0).unwrap(), ActivityType::Squats)
            .into_alarm("a".into());
        let mut scheduler = AlarmScheduler::new(backend);
        let report = scheduler.reschedule(&[alarm], Local::now().naive_local());
        assert!(report.armed.is_empty());
        assert_eq!(report.failed_ids(), vec!["a".to_string()]);
        assert!(matches!(report.failed[0].1, SchedulingError::Unavailable(_)));
        assert_eq!(scheduler.backend().armed_count(), 0);

        let mut backend = TokioTimerBackend::new(Arc::new(|_: TriggerPayload| {}))
            .with_notifications(false);
        let err = backend.arm(&spec_at(Local::now().naive_local())).unwrap_err();
        assert!(matches!(err, SchedulingError::Unavailable(_)));
    }

    #[tokio::test]
    async fn due_timer_fires_callback() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut backend = TokioTimerBackend::new(Arc::new(move |p: TriggerPayload| {
            let _ = tx.send(p.alarm_id);
        }));
        assert!(backend.is_available());
        let past = Local::now().naive_local() - Duration::seconds(1);
        let id = backend.arm(&spec_at(past)).unwrap();

        let fired = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert_eq!(fired.as_deref(), Some("a"));

        backend.cancel(id);
        assert_eq!(backend.armed_count(), 0);
    }

    #[tokio::test]
    async fn late_wake_up_fires_once() {
        let fired = Arc::new(Mutex::new(0u32));
        let seen = Arc::clone(&fired);
        let mut backend = TokioTimerBackend::new(Arc::new(move |_: TriggerPayload| {
            *seen.lock().unwrap() += 1;
        }));
        // Daily alarm whose first occurrence was due three days ago.
        let missed = Local::now().naive_local() - Duration::days(3) + Duration::minutes(1);
        let mut spec = spec_at(missed);
        spec.time = AlarmTime::new(missed.hour() as u8, missed.minute() as u8).unwrap();
        spec.days = Day::ALL.to_vec();

        let id = backend.arm(&spec).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(*fired.lock().unwrap(), 1);
        backend.cancel(id);
    }

    #[tokio::test]
    async fn cancelled_timer_never_fires() {
        let fired = Arc::new(Mutex::new(0u32));
        let seen = Arc::clone(&fired);
        let mut backend = TokioTimerBackend::new(Arc::new(move |_: TriggerPayload| {
            *seen.lock().unwrap() += 1;
        }));
        let soon = Local::now().naive_local() + Duration::milliseconds(50);
        let id = backend.arm(&spec_at(soon)).unwrap();
        backend.cancel(id);
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        assert_eq!(*fired.lock().unwrap(), 0);
    }
}
