//! Ringing alarm orchestration.
//!
//! The melody keeps playing until the workout reaches its target or the user
//! takes the emergency exit. Audio is best effort: a failing player is
//! logged and the workout runs regardless.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::model::Alarm;
use crate::activity::ActivityType;
use crate::error::{AudioError, Result, SessionError};
use crate::events::Event;
use crate::motion::MotionSample;
use crate::workout::{SessionState, WorkoutController, WorkoutRecord, WorkoutSummary};

/// Melody played when an alarm has none configured.
pub const DEFAULT_MELODY: &str = "classic";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackOptions {
    pub looping: bool,
    /// 0..=100
    pub volume: u8,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            looping: true,
            volume: 80,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackHandle(pub u64);

/// Audio collaborator.
pub trait AudioPlayer {
    fn play(&mut self, sound: &str, options: PlaybackOptions) -> Result<PlaybackHandle, AudioError>;
    fn stop(&mut self, handle: PlaybackHandle);
}

/// Result of feeding one sample to a ringing alarm.
#[derive(Debug, Clone, Default)]
pub struct DismissalStep {
    pub events: Vec<Event>,
    /// Set once, on the sample that completed the workout.
    pub finished: Option<WorkoutRecord>,
}

struct Ringing {
    alarm_id: String,
    alarm_title: String,
    activity: ActivityType,
    target: u32,
    rang_at: DateTime<Utc>,
    playback: Option<PlaybackHandle>,
}

pub struct AlarmDismissal {
    controller: WorkoutController,
    audio: Box<dyn AudioPlayer>,
    options: PlaybackOptions,
    ringing: Option<Ringing>,
}

impl AlarmDismissal {
    pub fn new(controller: WorkoutController, audio: Box<dyn AudioPlayer>) -> Self {
        Self {
            controller,
            audio,
            options: PlaybackOptions::default(),
            ringing: None,
        }
    }

    pub fn with_options(mut self, options: PlaybackOptions) -> Self {
        self.options = options;
        self
    }

    pub fn controller(&self) -> &WorkoutController {
        &self.controller
    }

    pub fn is_ringing(&self) -> bool {
        self.ringing.as_ref().is_some_and(|r| r.playback.is_some())
    }

    /// Start ringing `alarm` and begin its workout.
    ///
    /// When the session cannot start (sensor unavailable, invalid target)
    /// the error is returned and the alarm keeps ringing; only
    /// [`emergency_dismiss`](Self::emergency_dismiss) silences it then.
    ///
    /// A different alarm replaces one whose workout never started. While a
    /// workout is running for another alarm the call is rejected with
    /// [`SessionError::AlreadyActive`].
    pub fn begin(&mut self, alarm: &Alarm) -> Result<Vec<Event>> {
        if self.controller.state().is_terminal() {
            self.controller.reset();
        }
        if let Some(current) = &self.ringing {
            if current.alarm_id != alarm.id {
                if self.controller.state() == SessionState::Active {
                    return Err(SessionError::AlreadyActive.into());
                }
                info!(replaced = %current.alarm_id, alarm_id = %alarm.id, "replacing ringing alarm");
                self.silence();
                self.ringing = None;
            }
        }
        if self.ringing.is_none() {
            let melody = if alarm.melody.is_empty() {
                DEFAULT_MELODY
            } else {
                alarm.melody.as_str()
            };
            let playback = match self.audio.play(melody, self.options) {
                Ok(handle) => Some(handle),
                Err(err) => {
                    warn!(alarm_id = %alarm.id, %err, "alarm sound failed; continuing silently");
                    None
                }
            };
            self.ringing = Some(Ringing {
                alarm_id: alarm.id.clone(),
                alarm_title: alarm.title.clone(),
                activity: alarm.activity,
                target: alarm.target_count,
                rang_at: Utc::now(),
                playback,
            });
        }

        self.controller.start(alarm.activity, alarm.target_count)?;
        info!(alarm_id = %alarm.id, activity = %alarm.activity, "alarm ringing");

        let mut events = vec![Event::AlarmTriggered {
            alarm_id: alarm.id.clone(),
            activity: alarm.activity,
            target: alarm.target_count,
            at: Utc::now(),
        }];
        events.extend(self.controller.started_event());
        Ok(events)
    }

    pub fn on_sample(&mut self, sample: &MotionSample) -> DismissalStep {
        let events = self.controller.on_sample(sample);
        if self.controller.state() != SessionState::Completed {
            return DismissalStep {
                events,
                finished: None,
            };
        }
        let finished = match self.controller.summary().cloned() {
            Some(summary) => self.finish(&summary),
            None => None,
        };
        DismissalStep { events, finished }
    }

    /// Abort the workout and silence the alarm.
    ///
    /// A workout that never started is recorded with zero progress.
    /// Returns `None` when no alarm is ringing.
    pub fn emergency_dismiss(&mut self) -> Option<(Event, WorkoutRecord)> {
        self.ringing.as_ref()?;
        let summary = match self.controller.abort() {
            Some(s) => s,
            None => self.unstarted_summary()?,
        };
        let event = Event::SessionAborted {
            activity: summary.activity,
            target: summary.target,
            completed: summary.completed,
            duration_secs: summary.duration_secs,
            at: summary.ended_at,
        };
        self.finish(&summary).map(|record| (event, record))
    }

    fn unstarted_summary(&self) -> Option<WorkoutSummary> {
        let ringing = self.ringing.as_ref()?;
        let ended_at = Utc::now();
        Some(WorkoutSummary {
            activity: ringing.activity,
            target: ringing.target,
            completed: 0,
            duration_secs: (ended_at - ringing.rang_at).num_seconds().max(0) as u64,
            started_at: ringing.rang_at,
            ended_at,
            was_completed: false,
        })
    }

    fn finish(&mut self, summary: &WorkoutSummary) -> Option<WorkoutRecord> {
        self.silence();
        let ringing = self.ringing.take()?;
        let record = WorkoutRecord::from_summary(&ringing.alarm_id, &ringing.alarm_title, summary);
        info!(
            alarm_id = %ringing.alarm_id,
            completed = record.completed,
            was_completed = record.was_completed,
            "alarm dismissed"
        );
        Some(record)
    }

    fn silence(&mut self) {
        if let Some(handle) = self.ringing.as_mut().and_then(|r| r.playback.take()) {
            self.audio.stop(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityType;
    use crate::alarm::model::{AlarmTime, NewAlarm};
    use crate::motion::{samples_from_magnitudes, MotionSource, SimulatedSensor};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct AudioLog {
        playing: Vec<(String, PlaybackOptions)>,
        stopped: u32,
    }

    struct FakeAudio {
        log: Rc<RefCell<AudioLog>>,
        broken: bool,
    }

    impl AudioPlayer for FakeAudio {
        fn play(&mut self, sound: &str, options: PlaybackOptions) -> Result<PlaybackHandle, AudioError> {
            if self.broken {
                return Err(AudioError::PlaybackFailed {
                    sound: sound.into(),
                    message: "no output device".into(),
                });
            }
            self.log.borrow_mut().playing.push((sound.into(), options));
            Ok(PlaybackHandle(1))
        }

        fn stop(&mut self, _handle: PlaybackHandle) {
            self.log.borrow_mut().stopped += 1;
        }
    }

    fn alarm(target: u32) -> Alarm {
        let mut new = NewAlarm::new("Wake", AlarmTime::new(7, 0).unwrap(), ActivityType::JumpingJacks);
        new.target_count = target;
        new.into_alarm("alarm-1".into())
    }

    fn dismissal(broken: bool) -> (AlarmDismissal, Rc<RefCell<AudioLog>>, SimulatedSensor) {
        let log = Rc::new(RefCell::new(AudioLog::default()));
        let sensor = SimulatedSensor::new();
        let controller = WorkoutController::new(Box::new(sensor.clone()));
        let audio = FakeAudio {
            log: Rc::clone(&log),
            broken,
        };
        (AlarmDismissal::new(controller, Box::new(audio)), log, sensor)
    }

    /// One clean jumping-jack repetition per 1.5 s, 100 ms spacing.
    fn reps(n: usize) -> Vec<MotionSample> {
        let mut mags = Vec::new();
        for _ in 0..n {
            mags.extend([2.6; 4]);
            mags.extend([1.0; 11]);
        }
        samples_from_magnitudes(&mags, 100)
    }

    #[test]
    fn completing_workout_stops_sound_and_yields_record() {
        let (mut d, log, sensor) = dismissal(false);
        let events = d.begin(&alarm(2)).unwrap();
        assert!(matches!(events[0], Event::AlarmTriggered { .. }));
        assert!(d.is_ringing());
        assert_eq!(log.borrow().playing[0].0, DEFAULT_MELODY);
        assert!(log.borrow().playing[0].1.looping);

        let mut record = None;
        for s in reps(3) {
            let step = d.on_sample(&s);
            if step.finished.is_some() {
                assert!(record.is_none());
                record = step.finished;
            }
        }
        let record = record.unwrap();
        assert!(record.was_completed);
        assert_eq!(record.completed, 2);
        assert_eq!(record.alarm_id, "alarm-1");
        assert_eq!(log.borrow().stopped, 1);
        assert!(!d.is_ringing());
        assert!(!sensor.is_held());
    }

    #[test]
    fn emergency_dismiss_records_partial_workout() {
        let (mut d, log, sensor) = dismissal(false);
        d.begin(&alarm(10)).unwrap();
        for s in reps(1) {
            d.on_sample(&s);
        }
        let (event, record) = d.emergency_dismiss().unwrap();
        assert!(matches!(event, Event::SessionAborted { completed: 1, .. }));
        assert!(!record.was_completed);
        assert_eq!(record.completed, 1);
        assert_eq!(log.borrow().stopped, 1);
        assert!(!sensor.is_held());
        assert!(d.emergency_dismiss().is_none());
    }

    #[test]
    fn broken_audio_never_blocks_dismissal() {
        let (mut d, log, _) = dismissal(true);
        d.begin(&alarm(1)).unwrap();
        assert!(!d.is_ringing());
        let finished = reps(1).iter().find_map(|s| d.on_sample(s).finished);
        assert!(finished.unwrap().was_completed);
        assert_eq!(log.borrow().stopped, 0);
    }

    #[test]
    fn sensor_failure_keeps_ringing_until_emergency_exit() {
        let log = Rc::new(RefCell::new(AudioLog::default()));
        let controller = WorkoutController::new(Box::new(SimulatedSensor::unavailable()));
        let audio = FakeAudio {
            log: Rc::clone(&log),
            broken: false,
        };
        let mut d = AlarmDismissal::new(controller, Box::new(audio));
        assert!(d.begin(&alarm(5)).is_err());
        assert!(d.is_ringing());

        let (event, record) = d.emergency_dismiss().unwrap();
        assert!(matches!(event, Event::SessionAborted { completed: 0, target: 5, .. }));
        assert_eq!(record.alarm_id, "alarm-1");
        assert_eq!(record.activity, ActivityType::JumpingJacks);
        assert_eq!(record.target, 5);
        assert_eq!(record.completed, 0);
        assert!(!record.was_completed);
        assert!(!d.is_ringing());
        assert_eq!(log.borrow().stopped, 1);
        assert!(d.emergency_dismiss().is_none());
    }

    #[test]
    fn next_alarm_replaces_one_that_never_started() {
        let (mut d, log, sensor) = dismissal(false);
        let first = alarm(5);
        let mut second = NewAlarm::new("Gym", AlarmTime::new(7, 30).unwrap(), ActivityType::JumpingJacks);
        second.target_count = 1;
        second.melody = "birds".into();
        let second = second.into_alarm("alarm-2".into());

        let held = sensor.clone().subscribe(100).unwrap();
        assert!(d.begin(&first).is_err());
        drop(held);

        d.begin(&second).unwrap();
        assert_eq!(log.borrow().stopped, 1);
        assert_eq!(log.borrow().playing.last().unwrap().0, "birds");

        let record = reps(1).iter().find_map(|s| d.on_sample(s).finished).unwrap();
        assert_eq!(record.alarm_id, "alarm-2");
        assert_eq!(record.alarm_title, "Gym");
        assert_eq!(record.target, 1);
        assert_eq!(log.borrow().stopped, 2);
    }

    #[test]
    fn other_alarm_rejected_while_workout_runs() {
        let (mut d, _, _) = dismissal(false);
        d.begin(&alarm(5)).unwrap();
        let other = NewAlarm::new("Gym", AlarmTime::new(7, 30).unwrap(), ActivityType::Squats)
            .into_alarm("alarm-2".into());
        let err = d.begin(&other).unwrap_err();
        assert!(matches!(err, crate::error::CoreError::Session(SessionError::AlreadyActive)));
        let (_, record) = d.emergency_dismiss().unwrap();
        assert_eq!(record.alarm_id, "alarm-1");
    }
}
