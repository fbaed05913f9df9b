use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Exercise the user must perform to dismiss an alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityType {
    JumpingJacks,
    PushUps,
    SitUps,
    Squats,
    Burpees,
    Steps,
    Plank,
    MountainClimbers,
}

/// What `target_count` is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityUnit {
    Reps,
    Steps,
    /// Movement pulses while holding a position.
    Pulses,
}

impl ActivityType {
    pub const ALL: [ActivityType; 8] = [
        ActivityType::JumpingJacks,
        ActivityType::PushUps,
        ActivityType::SitUps,
        ActivityType::Squats,
        ActivityType::Burpees,
        ActivityType::Steps,
        ActivityType::Plank,
        ActivityType::MountainClimbers,
    ];

    /// Kebab-case identifier, as stored.
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::JumpingJacks => "jumping-jacks",
            ActivityType::PushUps => "push-ups",
            ActivityType::SitUps => "sit-ups",
            ActivityType::Squats => "squats",
            ActivityType::Burpees => "burpees",
            ActivityType::Steps => "steps",
            ActivityType::Plank => "plank",
            ActivityType::MountainClimbers => "mountain-climbers",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ActivityType::JumpingJacks => "Jumping Jacks",
            ActivityType::PushUps => "Push-ups",
            ActivityType::SitUps => "Sit-ups",
            ActivityType::Squats => "Squats",
            ActivityType::Burpees => "Burpees",
            ActivityType::Steps => "Walking Steps",
            ActivityType::Plank => "Plank Hold",
            ActivityType::MountainClimbers => "Mountain Climbers",
        }
    }

    pub fn unit(self) -> ActivityUnit {
        match self {
            ActivityType::Steps => ActivityUnit::Steps,
            ActivityType::Plank => ActivityUnit::Pulses,
            _ => ActivityUnit::Reps,
        }
    }

    /// Target suggested when a new alarm is created.
    pub fn default_target(self) -> u32 {
        match self {
            ActivityType::JumpingJacks => 20,
            ActivityType::PushUps => 15,
            ActivityType::SitUps => 25,
            ActivityType::Squats => 20,
            ActivityType::Burpees => 10,
            ActivityType::Steps => 100,
            ActivityType::Plank => 30,
            ActivityType::MountainClimbers => 30,
        }
    }

    pub fn instructions(self) -> &'static str {
        match self {
            ActivityType::JumpingJacks => {
                "Jump with arms and legs spread, then return to start position"
            }
            ActivityType::PushUps => "Lower your body to the ground, then push back up",
            ActivityType::SitUps => "Lie down and raise your torso to a sitting position",
            ActivityType::Steps => "Walk around or march in place",
            _ => "Complete the exercise movements",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        ActivityType::ALL
            .into_iter()
            .find(|a| a.as_str() == needle)
            .ok_or_else(|| ValidationError::UnknownActivity(s.to_string()))
    }
}

impl fmt::Display for ActivityUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActivityUnit::Reps => "reps",
            ActivityUnit::Steps => "steps",
            ActivityUnit::Pulses => "pulses",
        })
    }
}
