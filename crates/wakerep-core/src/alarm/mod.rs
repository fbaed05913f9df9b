//! Alarms: the persisted model, the lifecycle store, the trigger scheduler
//! and the ringing-alarm dismissal flow.

mod backend;
mod dismissal;
mod model;
mod scheduler;
mod service;
mod store;

pub use backend::{TokioTimerBackend, TriggerCallback};
pub use dismissal::{
    AlarmDismissal, AudioPlayer, DismissalStep, PlaybackHandle, PlaybackOptions, DEFAULT_MELODY,
};
pub use model::{parse_days, Alarm, AlarmPatch, AlarmTime, Day, NewAlarm, Period};
pub use scheduler::{
    next_fire_after, AlarmScheduler, FireSpec, RescheduleReport, TimerBackend, TimerId,
    TriggerPayload,
};
pub use service::{AlarmService, StartupReport};
pub use store::{AlarmRepository, AlarmStore};
