//! Movement detector.
//!
//! Turns a stream of accelerometer samples into discrete repetitions using a
//! moving average and a two-level (hysteresis) threshold:
//!
//! ```text
//!   avg > threshold && !moving          -> latch, count if debounce elapsed
//!   avg < threshold * release_ratio     -> unlatch
//! ```
//!
//! A sustained motion that oscillates around `threshold` stays latched and is
//! counted once. The detector is synchronous and allocation-free after
//! construction; it never buffers more than `buffer_capacity` magnitudes.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::profile::DetectionProfile;
use super::sample::MotionSample;

/// Emitted once per counted repetition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RepetitionEvent {
    /// Cumulative count including this repetition.
    pub count: u32,
    /// Timestamp of the sample that produced the rising edge.
    pub at_ms: u64,
    /// Smoothed magnitude at the rising edge.
    pub magnitude: f64,
}

/// Mutable state of one detector. Owned by exactly one session.
#[derive(Debug, Clone)]
pub struct DetectorState {
    movement_buffer: VecDeque<f64>,
    is_moving: bool,
    last_event_ms: Option<u64>,
    last_sample_ms: Option<u64>,
    current_count: u32,
}

impl DetectorState {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            movement_buffer: VecDeque::with_capacity(capacity),
            is_moving: false,
            last_event_ms: None,
            last_sample_ms: None,
            current_count: 0,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.is_moving
    }

    pub fn current_count(&self) -> u32 {
        self.current_count
    }

    pub fn last_event_ms(&self) -> Option<u64> {
        self.last_event_ms
    }

    pub fn buffered(&self) -> usize {
        self.movement_buffer.len()
    }
}

#[derive(Debug, Clone)]
pub struct MovementDetector {
    profile: DetectionProfile,
    state: DetectorState,
}

impl MovementDetector {
    pub fn new(profile: DetectionProfile) -> Self {
        let capacity = profile.buffer_capacity.max(1);
        Self {
            profile,
            state: DetectorState::with_capacity(capacity),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn profile(&self) -> &DetectionProfile {
        &self.profile
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn current_count(&self) -> u32 {
        self.state.current_count
    }

    /// Mean of the smoothing window, or `None` before the first sample.
    pub fn average_magnitude(&self) -> Option<f64> {
        let buf = &self.state.movement_buffer;
        if buf.is_empty() {
            return None;
        }
        Some(buf.iter().sum::<f64>() / buf.len() as f64)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Feed one sample. Returns a [`RepetitionEvent`] on a counted rising edge.
    ///
    /// Samples older than the previous one are dropped: the edge logic
    /// depends on in-order history.
    pub fn ingest(&mut self, sample: &MotionSample) -> Option<RepetitionEvent> {
        let now = sample.timestamp_ms;
        if let Some(prev) = self.state.last_sample_ms {
            if now < prev {
                trace!(now, prev, "dropping out-of-order sample");
                return None;
            }
        }
        self.state.last_sample_ms = Some(now);

        let magnitude = sample.magnitude();
        let capacity = self.profile.buffer_capacity.max(1);
        if self.state.movement_buffer.len() == capacity {
            self.state.movement_buffer.pop_front();
        }
        self.state.movement_buffer.push_back(magnitude);

        let avg = self.average_magnitude()?;
        trace!(magnitude, avg, "sample");

        let mut event = None;
        if avg > self.profile.magnitude_threshold && !self.state.is_moving {
            self.state.is_moving = true;
            let debounced = match self.state.last_event_ms {
                Some(last) => now.saturating_sub(last) > self.profile.debounce_ms,
                None => true,
            };
            if debounced {
                self.state.current_count = self.state.current_count.saturating_add(1);
                self.state.last_event_ms = Some(now);
                debug!(count = self.state.current_count, avg, "repetition detected");
                event = Some(RepetitionEvent {
                    count: self.state.current_count,
                    at_ms: now,
                    magnitude: avg,
                });
            } else {
                trace!(avg, "rising edge inside debounce window");
            }
        }

        if avg < self.profile.release_level() {
            self.state.is_moving = false;
        }

        event
    }

    /// Clear buffer, count and latch for a fresh session.
    pub fn reset(&mut self) {
        self.state = DetectorState::with_capacity(self.profile.buffer_capacity.max(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityType;
    use crate::motion::profile::configure;

    fn feed(detector: &mut MovementDetector, magnitudes: &[f64], spacing_ms: u64) -> Vec<RepetitionEvent> {
        magnitudes
            .iter()
            .enumerate()
            .filter_map(|(i, &m)| detector.ingest(&MotionSample::vertical(m, i as u64 * spacing_ms)))
            .collect()
    }

    #[test]
    fn stationary_device_never_counts() {
        let mut d = MovementDetector::new(configure(ActivityType::Steps));
        let events = feed(&mut d, &[1.0; 200], 80);
        assert!(events.is_empty());
        assert_eq!(d.current_count(), 0);
    }

    #[test]
    fn sustained_motion_counts_once() {
        let mut d = MovementDetector::new(DetectionProfile::new(100, 1.8, 0.75, 600, 3));
        let events = feed(&mut d, &[2.5; 20], 100);
        assert_eq!(events.len(), 1);
        assert_eq!(d.current_count(), 1);
        assert!(d.state().is_moving());
    }

    #[test]
    fn single_spike_is_damped_by_window() {
        let mut d = MovementDetector::new(DetectionProfile::new(100, 1.8, 0.75, 600, 4));
        // One 3.0 spike among 1.0 readings averages to 1.5 at most.
        let events = feed(&mut d, &[1.0, 1.0, 1.0, 3.0, 1.0, 1.0, 1.0], 100);
        assert!(events.is_empty());
    }

    #[test]
    fn debounce_suppresses_close_rising_edges() {
        let profile = DetectionProfile::new(100, 1.5, 0.8, 500, 1);
        let mut d = MovementDetector::new(profile);
        // Rising edges at t=0 and t=200: inside 500ms.
        let events = feed(&mut d, &[2.0, 1.0, 2.0], 100);
        assert_eq!(events.len(), 1);

        let mut d = MovementDetector::new(profile);
        // Rising edges at t=0 and t=600: outside 500ms.
        let events = feed(&mut d, &[2.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0], 100);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].count, 2);
    }

    #[test]
    fn rising_edge_in_debounce_window_still_latches() {
        let profile = DetectionProfile::new(100, 1.5, 0.8, 500, 1);
        let mut d = MovementDetector::new(profile);
        // Edge at 0 counted, edge at 200 latched but not counted; staying high
        // until 800 must not produce a late count for that same motion.
        let events = feed(&mut d, &[2.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0], 100);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn out_of_order_sample_is_dropped() {
        let mut d = MovementDetector::new(DetectionProfile::new(100, 1.5, 0.8, 0, 1));
        assert!(d.ingest(&MotionSample::vertical(1.0, 500)).is_none());
        assert!(d.ingest(&MotionSample::vertical(3.0, 400)).is_none());
        assert_eq!(d.state().buffered(), 1);
        assert_eq!(d.current_count(), 0);
    }

    #[test]
    fn buffer_is_bounded() {
        let mut d = MovementDetector::new(DetectionProfile::new(100, 1.5, 0.8, 0, 5));
        feed(&mut d, &[1.0; 50], 10);
        assert_eq!(d.state().buffered(), 5);
    }

    #[test]
    fn reset_clears_everything() {
        let mut d = MovementDetector::new(DetectionProfile::new(100, 1.5, 0.8, 0, 2));
        feed(&mut d, &[2.0, 2.0, 1.0, 1.0, 2.0, 2.0], 100);
        assert!(d.current_count() > 0);
        d.reset();
        assert_eq!(d.current_count(), 0);
        assert_eq!(d.state().buffered(), 0);
        assert!(!d.state().is_moving());
        assert_eq!(d.state().last_event_ms(), None);
        assert_eq!(d.average_magnitude(), None);
    }
}
