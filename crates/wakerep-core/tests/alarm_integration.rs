//! Integration tests for alarm lifecycle and scheduling.
//!
//! Exercises the store, the scheduler and the SQLite repository together,
//! with an in-process timer backend standing in for platform notifications.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use wakerep_core::alarm::{
    next_fire_after, AlarmRepository, FireSpec, TimerId, TriggerPayload,
};
use wakerep_core::error::SchedulingError;
use wakerep_core::{
    ActivityType, AlarmPatch, AlarmService, AlarmTime, Database, Day, NewAlarm, TimerBackend,
    TokioTimerBackend,
};

#[derive(Default)]
struct RecordingBackend {
    next: u64,
    live: BTreeSet<TimerId>,
    armed: Vec<FireSpec>,
}

impl TimerBackend for RecordingBackend {
    fn arm(&mut self, spec: &FireSpec) -> Result<TimerId, SchedulingError> {
        self.next += 1;
        self.live.insert(TimerId(self.next));
        self.armed.push(spec.clone());
        Ok(TimerId(self.next))
    }

    fn cancel(&mut self, id: TimerId) {
        self.live.remove(&id);
    }
}

/// 2026-03-10, a Tuesday.
fn tuesday(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 10)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn alarm_on(days: &[Day]) -> NewAlarm {
    let mut new = NewAlarm::new("Wake", AlarmTime::new(7, 30).unwrap(), ActivityType::SitUps);
    new.days = days.iter().copied().collect();
    new
}

#[test]
fn reschedule_twice_holds_one_timer_per_alarm() {
    let db = Database::open_memory().unwrap();
    let mut svc = AlarmService::new(&db, RecordingBackend::default());
    svc.create(alarm_on(&[Day::Mon]), tuesday(6, 0)).unwrap();
    svc.create(alarm_on(&[Day::Wed, Day::Fri]), tuesday(6, 0)).unwrap();

    svc.reschedule_all(tuesday(6, 0)).unwrap();
    svc.reschedule_all(tuesday(6, 0)).unwrap();

    assert_eq!(svc.scheduler().backend().live.len(), 2);
    assert_eq!(svc.scheduler().live_timers().len(), 2);
}

#[test]
fn monday_alarm_created_on_tuesday_fires_next_monday() {
    let db = Database::open_memory().unwrap();
    let mut svc = AlarmService::new(&db, RecordingBackend::default());
    let alarm = svc.create(alarm_on(&[Day::Mon]), tuesday(9, 0)).unwrap();

    let expected = tuesday(7, 30) + Duration::days(6);
    assert_eq!(next_fire_after(&alarm, tuesday(9, 0)), expected);
    let spec = svc.scheduler().backend().armed.last().unwrap();
    assert_eq!(spec.fire_at, expected);
    assert_eq!(spec.payload.alarm_id, alarm.id);
    assert!(spec.repeats);
}

#[test]
fn scheduler_reads_persisted_truth() {
    let db = Database::open_memory().unwrap();
    let mut svc = AlarmService::new(&db, RecordingBackend::default());
    let alarm = svc.create(alarm_on(&[Day::Thu]), tuesday(6, 0)).unwrap();

    // Another writer disables the alarm behind the service's back.
    let mut stored = db.load_alarms().unwrap();
    stored[0].enabled = false;
    db.save_alarms(&stored).unwrap();

    let report = svc.reschedule_all(tuesday(6, 0)).unwrap();
    assert!(report.armed.is_empty());
    assert_eq!(report.skipped, vec![alarm.id]);
    assert!(svc.scheduler().backend().live.is_empty());
}

#[test]
fn update_moves_the_timer() {
    let db = Database::open_memory().unwrap();
    let mut svc = AlarmService::new(&db, RecordingBackend::default());
    let alarm = svc.create(alarm_on(&[Day::Tue]), tuesday(6, 0)).unwrap();
    assert_eq!(svc.last_report().armed[0].1, tuesday(7, 30));

    svc.update(
        &alarm.id,
        &AlarmPatch {
            time: Some(AlarmTime::new(5, 0).unwrap()),
            ..Default::default()
        },
        tuesday(6, 0),
    )
    .unwrap();
    assert_eq!(svc.last_report().armed[0].1, tuesday(5, 0) + Duration::days(7));
    assert_eq!(svc.scheduler().backend().live.len(), 1);
}

#[test]
fn unavailable_backend_is_recorded_for_next_launch() {
    let db = Database::open_memory().unwrap();
    // No tokio runtime in a plain test: the backend reports itself unavailable.
    let backend = TokioTimerBackend::new(Arc::new(|_: TriggerPayload| {}));
    let mut svc = AlarmService::new(&db, backend);
    let alarm = svc.create(alarm_on(&[Day::Mon]), tuesday(6, 0)).unwrap();

    assert_eq!(svc.last_report().failed_ids(), vec![alarm.id.clone()]);
    assert_eq!(db.load_scheduling_failures().unwrap(), vec![alarm.id.clone()]);
    assert!(svc.list().unwrap()[0].enabled);
}

#[tokio::test]
async fn tokio_backend_delivers_trigger_payload() {
    let fired: Arc<Mutex<Vec<TriggerPayload>>> = Arc::default();
    let sink = Arc::clone(&fired);
    let backend = TokioTimerBackend::new(Arc::new(move |p: TriggerPayload| sink.lock().unwrap().push(p)));

    let db = Database::open_memory().unwrap();
    let mut svc = AlarmService::new(&db, backend);

    // Every day, at least a minute out: armed, but not due during the test.
    let soon = Local::now().naive_local() + Duration::minutes(2);
    let mut new = NewAlarm::new(
        "Soon",
        AlarmTime::new(soon.hour() as u8, soon.minute() as u8).unwrap(),
        ActivityType::Burpees,
    );
    new.days = Day::ALL.into_iter().collect();
    let alarm = svc.create(new, Local::now().naive_local()).unwrap();
    assert!(svc.last_report().is_clean());
    assert!(svc.scheduler().is_armed(&alarm.id));

    svc.delete(&alarm.id, Local::now().naive_local()).unwrap();
    assert!(svc.scheduler().live_timers().is_empty());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(fired.lock().unwrap().is_empty());
}
