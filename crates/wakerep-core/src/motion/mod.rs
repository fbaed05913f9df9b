//! Accelerometer input and repetition detection.

mod detector;
mod profile;
mod sample;
mod simulated;

pub use detector::{DetectorState, MovementDetector, RepetitionEvent};
pub use profile::{configure, DetectionProfile, ProfileOverrides};
pub use sample::{MotionSample, MotionSource, SensorSubscription, SubscriptionHandle};
pub use simulated::{parse_samples, samples_from_magnitudes, SimulatedSensor};
