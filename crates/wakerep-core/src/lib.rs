//! # wakerep Core Library
//!
//! Core logic for an exercise-gated alarm clock: an alarm only stops once the
//! user has performed a target number of repetitions, counted from
//! accelerometer samples.
//!
//! ## Architecture
//!
//! - **Motion**: a smoothing, hysteresis and debounce detector that turns a
//!   stream of acceleration samples into discrete repetition events, tuned
//!   per activity by a [`DetectionProfile`]
//! - **Workout**: a session state machine that owns the sensor subscription
//!   and completes exactly once when the target is reached
//! - **Alarm**: the persisted alarm list, a replace-all trigger scheduler and
//!   the ringing-alarm dismissal flow
//! - **Storage**: SQLite for alarms and workout history, TOML for settings
//!
//! ## Key Components
//!
//! - [`MovementDetector`]: repetition counting from raw samples
//! - [`WorkoutController`]: one workout session at a time
//! - [`AlarmService`]: alarm CRUD with automatic rescheduling
//! - [`Database`]: alarm and history persistence
//! - [`Config`]: application configuration management

pub mod activity;
pub mod alarm;
pub mod error;
pub mod events;
pub mod motion;
pub mod storage;
pub mod workout;

pub use activity::{ActivityType, ActivityUnit};
pub use alarm::{
    Alarm, AlarmDismissal, AlarmPatch, AlarmScheduler, AlarmService, AlarmStore, AlarmTime, Day,
    NewAlarm, TimerBackend, TokioTimerBackend,
};
pub use error::{CoreError, Result};
pub use events::Event;
pub use motion::{configure, DetectionProfile, MotionSample, MotionSource, MovementDetector};
pub use storage::{Config, Database};
pub use workout::{WorkoutController, WorkoutRecord, WorkoutStats};
