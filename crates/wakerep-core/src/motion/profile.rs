//! Per-activity detection profiles.
//!
//! Each activity has its own acceleration signature. The detector algorithm
//! is shared; only these numbers change between activities.

use serde::{Deserialize, Serialize};

use crate::activity::ActivityType;
use crate::error::ValidationError;

/// Tuning parameters for [`MovementDetector`](super::MovementDetector).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionProfile {
    /// Sensor update interval requested from the source.
    pub sample_interval_ms: u64,
    /// Smoothed magnitude (g) that counts as a rising edge.
    pub magnitude_threshold: f64,
    /// Fraction of the threshold the signal must fall below to re-arm.
    pub release_ratio: f64,
    /// Minimum spacing between two counted repetitions.
    pub debounce_ms: u64,
    /// Length of the moving-average window.
    pub buffer_capacity: usize,
}

impl DetectionProfile {
    /// Reference profile for `activity`.
    ///
    /// Explosive movements sample fastest with the highest threshold, full-body
    /// reps sit in the middle, steps use the lowest counted threshold and
    /// plank samples slowest.
    pub fn for_activity(activity: ActivityType) -> Self {
        match activity {
            ActivityType::JumpingJacks => Self::new(100, 1.9, 0.75, 600, 3),
            ActivityType::Burpees => Self::new(100, 2.0, 0.75, 1200, 3),
            ActivityType::PushUps => Self::new(150, 1.5, 0.8, 800, 4),
            ActivityType::SitUps => Self::new(150, 1.5, 0.8, 900, 4),
            ActivityType::Squats => Self::new(150, 1.4, 0.8, 800, 4),
            ActivityType::MountainClimbers => Self::new(150, 1.7, 0.8, 400, 4),
            ActivityType::Steps => Self::new(80, 1.2, 0.9, 300, 3),
            ActivityType::Plank => Self::new(500, 1.1, 0.9, 1000, 3),
        }
    }

    pub fn new(
        sample_interval_ms: u64,
        magnitude_threshold: f64,
        release_ratio: f64,
        debounce_ms: u64,
        buffer_capacity: usize,
    ) -> Self {
        Self {
            sample_interval_ms,
            magnitude_threshold,
            release_ratio,
            debounce_ms,
            buffer_capacity,
        }
    }

    /// Smoothed magnitude below which the latch re-arms.
    pub fn release_level(&self) -> f64 {
        self.magnitude_threshold * self.release_ratio
    }

    /// Check the invariants the detector relies on.
    ///
    /// # Errors
    /// Returns [`ValidationError::InvalidProfile`] naming the offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sample_interval_ms == 0 {
            return Err(invalid("sample_interval_ms", "must be positive"));
        }
        if !(self.magnitude_threshold.is_finite() && self.magnitude_threshold > 0.0) {
            return Err(invalid("magnitude_threshold", "must be a positive number"));
        }
        if !(self.release_ratio > 0.0 && self.release_ratio < 1.0) {
            return Err(invalid("release_ratio", "must be strictly between 0 and 1"));
        }
        if self.buffer_capacity == 0 {
            return Err(invalid("buffer_capacity", "must be at least 1"));
        }
        Ok(())
    }

    /// Apply the fields set in `overrides` and validate the result.
    pub fn with_overrides(mut self, overrides: &ProfileOverrides) -> Result<Self, ValidationError> {
        if let Some(v) = overrides.sample_interval_ms {
            self.sample_interval_ms = v;
        }
        if let Some(v) = overrides.magnitude_threshold {
            self.magnitude_threshold = v;
        }
        if let Some(v) = overrides.release_ratio {
            self.release_ratio = v;
        }
        if let Some(v) = overrides.debounce_ms {
            self.debounce_ms = v;
        }
        if let Some(v) = overrides.buffer_capacity {
            self.buffer_capacity = v;
        }
        self.validate()?;
        Ok(self)
    }
}

/// Resolve the profile for an activity. Shorthand for
/// [`DetectionProfile::for_activity`].
pub fn configure(activity: ActivityType) -> DetectionProfile {
    DetectionProfile::for_activity(activity)
}

/// Partial profile from the config file. Unset fields keep the reference value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magnitude_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_capacity: Option<usize>,
}

impl ProfileOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidProfile {
        field: field.to_string(),
        message: message.to_string(),
    }
}
