//! Workout session controller.
//!
//! Wraps one [`MovementDetector`] per session and gates completion on the
//! target count.
//!
//! ## State Transitions
//!
//! ```text
//! NotStarted -> Active -> (Completed | Aborted)
//! ```
//!
//! Only `Active` accepts samples. `Completed` and `Aborted` are terminal;
//! `reset()` returns the controller to `NotStarted` so it can host the next
//! session. The sensor subscription lives exactly as long as `Active`.
//!
//! ## Usage
//!
//! ```ignore
//! let mut controller = WorkoutController::new(Box::new(sensor));
//! controller.start(ActivityType::Steps, 100)?;
//! // From the sensor callback:
//! for event in controller.on_sample(&sample) { /* ... */ }
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::activity::ActivityType;
use crate::error::{Result, SessionError, ValidationError};
use crate::events::Event;
use crate::motion::{
    configure, DetectionProfile, MotionSample, MotionSource, MovementDetector, SensorSubscription,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    Active,
    Completed,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Aborted)
    }
}

/// Outcome handed to the completion/abort listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSummary {
    pub activity: ActivityType,
    pub target: u32,
    pub completed: u32,
    pub duration_secs: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// `false` for an emergency dismiss.
    pub was_completed: bool,
}

/// What `start` hands back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub activity: ActivityType,
    pub target: u32,
    pub profile: DetectionProfile,
}

/// UI-side callbacks. All methods default to no-ops.
pub trait SessionListener {
    fn on_progress(&mut self, _count: u32, _target: u32) {}
    fn on_complete(&mut self, _summary: &WorkoutSummary) {}
    fn on_abort(&mut self, _summary: &WorkoutSummary) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    /// Light tap on each counted repetition.
    Repetition,
    /// Success pattern when the target is reached.
    Success,
}

/// Haptic collaborator.
pub trait Feedback {
    fn pulse(&mut self, kind: FeedbackKind);
}

struct SessionData {
    activity: ActivityType,
    target: u32,
    detector: MovementDetector,
    subscription: Option<SensorSubscription>,
    started_at: DateTime<Utc>,
    /// `(first, last)` sample timestamps seen by this session.
    sample_span: Option<(u64, u64)>,
    summary: Option<WorkoutSummary>,
}

impl SessionData {
    fn release_sensor(&mut self) {
        if let Some(mut sub) = self.subscription.take() {
            sub.remove();
        }
    }

    fn note_sample(&mut self, at_ms: u64) {
        self.sample_span = Some(match self.sample_span {
            Some((first, last)) => (first.min(at_ms), last.max(at_ms)),
            None => (at_ms, at_ms),
        });
    }

    fn finish(&mut self, was_completed: bool) -> WorkoutSummary {
        self.release_sensor();
        let ended_at = Utc::now();
        // Sample clock when there was motion, so replayed recordings report
        // the recorded length rather than the replay time.
        let duration_secs = match self.sample_span {
            Some((first, last)) => (last - first) / 1000,
            None => (ended_at - self.started_at).num_seconds().max(0) as u64,
        };
        let summary = WorkoutSummary {
            activity: self.activity,
            target: self.target,
            completed: self.detector.current_count(),
            duration_secs,
            started_at: self.started_at,
            ended_at,
            was_completed,
        };
        self.summary = Some(summary.clone());
        summary
    }
}

/// Drives one workout at a time against a motion source.
pub struct WorkoutController {
    source: Box<dyn MotionSource>,
    profiles: BTreeMap<ActivityType, DetectionProfile>,
    listener: Option<Box<dyn SessionListener>>,
    feedback: Option<Box<dyn Feedback>>,
    state: SessionState,
    session: Option<SessionData>,
}

impl WorkoutController {
    pub fn new(source: Box<dyn MotionSource>) -> Self {
        Self {
            source,
            profiles: BTreeMap::new(),
            listener: None,
            feedback: None,
            state: SessionState::NotStarted,
            session: None,
        }
    }

    /// Use `profile` instead of the reference profile for `activity`.
    pub fn with_profile(mut self, activity: ActivityType, profile: DetectionProfile) -> Self {
        self.profiles.insert(activity, profile);
        self
    }

    /// Replace every tuned profile at once (usually from the config file).
    pub fn with_profiles(mut self, profiles: BTreeMap<ActivityType, DetectionProfile>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_listener(mut self, listener: Box<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_feedback(mut self, feedback: Box<dyn Feedback>) -> Self {
        self.feedback = Some(feedback);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_count(&self) -> u32 {
        self.session
            .as_ref()
            .map(|s| s.detector.current_count())
            .unwrap_or(0)
    }

    pub fn target(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.target)
    }

    pub fn activity(&self) -> Option<ActivityType> {
        self.session.as_ref().map(|s| s.activity)
    }

    /// 0.0 .. 1.0 progress toward the target.
    pub fn progress(&self) -> f64 {
        match &self.session {
            Some(s) if s.target > 0 => (s.detector.current_count() as f64 / s.target as f64).min(1.0),
            _ => 0.0,
        }
    }

    /// Whether the sensor is currently held by this controller.
    pub fn holds_sensor(&self) -> bool {
        self.session
            .as_ref()
            .and_then(|s| s.subscription.as_ref())
            .is_some_and(SensorSubscription::is_active)
    }

    /// Summary of the last finished session, if any.
    pub fn summary(&self) -> Option<&WorkoutSummary> {
        self.session.as_ref().and_then(|s| s.summary.as_ref())
    }

    /// Profile that `start(activity, ..)` would use.
    pub fn profile_for(&self, activity: ActivityType) -> DetectionProfile {
        self.profiles
            .get(&activity)
            .copied()
            .unwrap_or_else(|| configure(activity))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a session. Subscribes to the sensor at the profile's interval.
    ///
    /// # Errors
    /// - [`ValidationError::NonPositiveTarget`] for `target == 0`
    /// - [`SessionError::AlreadyActive`] while a session is running
    /// - [`SensorError`](crate::error::SensorError) when the sensor cannot be
    ///   acquired; the controller state is left unchanged
    pub fn start(&mut self, activity: ActivityType, target: u32) -> Result<SessionHandle> {
        if self.state == SessionState::Active {
            return Err(SessionError::AlreadyActive.into());
        }
        if target == 0 {
            return Err(ValidationError::NonPositiveTarget.into());
        }
        let profile = self.profile_for(activity);
        profile.validate()?;

        let subscription = self.source.subscribe(profile.sample_interval_ms)?;

        self.session = Some(SessionData {
            activity,
            target,
            detector: MovementDetector::new(profile),
            subscription: Some(subscription),
            started_at: Utc::now(),
            sample_span: None,
            summary: None,
        });
        self.state = SessionState::Active;
        info!(%activity, target, interval_ms = profile.sample_interval_ms, "workout session started");

        Ok(SessionHandle {
            activity,
            target,
            profile,
        })
    }

    /// Event announcing the current session, for hosts that log every transition.
    pub fn started_event(&self) -> Option<Event> {
        let s = self.session.as_ref()?;
        Some(Event::SessionStarted {
            activity: s.activity,
            target: s.target,
            sample_interval_ms: s.detector.profile().sample_interval_ms,
            at: s.started_at,
        })
    }

    /// Feed one sample from the sensor callback.
    ///
    /// Returns the events this sample produced: nothing, a repetition, or a
    /// repetition followed by the completion. Samples outside `Active` are
    /// ignored.
    pub fn on_sample(&mut self, sample: &MotionSample) -> Vec<Event> {
        let mut events = Vec::new();
        if self.state != SessionState::Active {
            if self.state.is_terminal() {
                warn!(state = ?self.state, "sample delivered to a finished session; ignoring");
            }
            return events;
        }
        let Some(session) = self.session.as_mut() else {
            return events;
        };

        session.note_sample(sample.timestamp_ms);
        let Some(rep) = session.detector.ingest(sample) else {
            return events;
        };

        let target = session.target;
        if let Some(fb) = self.feedback.as_mut() {
            fb.pulse(FeedbackKind::Repetition);
        }
        if let Some(listener) = self.listener.as_mut() {
            listener.on_progress(rep.count, target);
        }
        events.push(Event::RepetitionDetected {
            count: rep.count,
            target,
            at_ms: rep.at_ms,
        });

        if rep.count >= target {
            let summary = session.finish(true);
            self.state = SessionState::Completed;
            info!(
                activity = %summary.activity,
                target = summary.target,
                duration_secs = summary.duration_secs,
                "workout session completed"
            );
            if let Some(fb) = self.feedback.as_mut() {
                fb.pulse(FeedbackKind::Success);
            }
            if let Some(listener) = self.listener.as_mut() {
                listener.on_complete(&summary);
            }
            events.push(Event::SessionCompleted {
                activity: summary.activity,
                target: summary.target,
                completed: summary.completed,
                duration_secs: summary.duration_secs,
                at: summary.ended_at,
            });
        }
        events
    }

    /// Emergency dismiss: end the session without satisfying the target.
    ///
    /// Returns `None` when no session is active.
    pub fn abort(&mut self) -> Option<WorkoutSummary> {
        if self.state != SessionState::Active {
            return None;
        }
        let summary = self.session.as_mut()?.finish(false);
        self.state = SessionState::Aborted;
        info!(
            activity = %summary.activity,
            completed = summary.completed,
            target = summary.target,
            "workout session aborted"
        );
        if let Some(listener) = self.listener.as_mut() {
            listener.on_abort(&summary);
        }
        Some(summary)
    }

    /// Return a finished controller to `NotStarted`.
    ///
    /// An active session is aborted first so the sensor is always released.
    pub fn reset(&mut self) {
        if self.state == SessionState::Active {
            self.abort();
        }
        self.session = None;
        self.state = SessionState::NotStarted;
    }
}

impl Drop for WorkoutController {
    fn drop(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.release_sensor();
        }
    }
}
