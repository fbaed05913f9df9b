//! In-process motion source used for replaying recorded samples.
//!
//! The sensor is modelled as a single shared resource: a second subscription
//! while one is held fails with [`SensorError::Busy`]. Clones share the same
//! hardware flag, so a test or the CLI can keep a handle and observe release.

use std::cell::{Cell, RefCell};
use std::io::BufRead;
use std::rc::Rc;

use super::sample::{MotionSample, MotionSource, SensorSubscription, SubscriptionHandle};
use crate::error::{SensorError, ValidationError};

#[derive(Debug, Default)]
struct SensorShared {
    held: Cell<bool>,
    available: Cell<bool>,
    subscribe_calls: Cell<u32>,
    intervals: RefCell<Vec<u64>>,
}

#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    shared: Rc<SensorShared>,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        let shared = SensorShared::default();
        shared.available.set(true);
        Self {
            shared: Rc::new(shared),
        }
    }

    /// A sensor that refuses every subscription.
    pub fn unavailable() -> Self {
        let sensor = Self::new();
        sensor.shared.available.set(false);
        sensor
    }

    pub fn is_held(&self) -> bool {
        self.shared.held.get()
    }

    pub fn subscribe_calls(&self) -> u32 {
        self.shared.subscribe_calls.get()
    }

    /// Intervals requested so far, in subscription order.
    pub fn requested_intervals(&self) -> Vec<u64> {
        self.shared.intervals.borrow().clone()
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

struct SimulatedHandle {
    shared: Rc<SensorShared>,
}

impl SubscriptionHandle for SimulatedHandle {
    fn remove(&mut self) {
        self.shared.held.set(false);
    }
}

impl MotionSource for SimulatedSensor {
    fn subscribe(&mut self, interval_ms: u64) -> Result<SensorSubscription, SensorError> {
        self.shared.subscribe_calls.set(self.shared.subscribe_calls.get() + 1);
        if !self.shared.available.get() {
            return Err(SensorError::Unavailable {
                reason: "accelerometer not present".to_string(),
            });
        }
        if self.shared.held.get() {
            return Err(SensorError::Busy);
        }
        self.shared.held.set(true);
        self.shared.intervals.borrow_mut().push(interval_ms);
        Ok(SensorSubscription::new(
            interval_ms,
            Box::new(SimulatedHandle {
                shared: self.shared.clone(),
            }),
        ))
    }
}

/// Parse recorded samples, one per line.
///
/// Accepted line shapes (blank lines and `#` comments are skipped):
/// - `timestamp_ms,x,y,z`
/// - `x,y,z` (timestamps synthesised at `interval_ms` spacing)
pub fn parse_samples<R: BufRead>(reader: R, interval_ms: u64) -> Result<Vec<MotionSample>, ValidationError> {
    let mut samples = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| bad_line(lineno, &e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        let nums = fields
            .iter()
            .map(|f| f.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| bad_line(lineno, &e.to_string()))?;
        if nums.iter().any(|n| !n.is_finite()) {
            return Err(bad_line(lineno, "values must be finite numbers"));
        }
        let sample = match nums.as_slice() {
            [t, x, y, z] => {
                if *t < 0.0 {
                    return Err(bad_line(lineno, "negative timestamp"));
                }
                MotionSample::new(*x, *y, *z, *t as u64)
            }
            [x, y, z] => MotionSample::new(*x, *y, *z, samples.len() as u64 * interval_ms),
            _ => return Err(bad_line(lineno, "expected 3 or 4 comma-separated numbers")),
        };
        samples.push(sample);
    }
    Ok(samples)
}

/// Build vertical samples from bare magnitudes at fixed spacing.
pub fn samples_from_magnitudes(magnitudes: &[f64], interval_ms: u64) -> Vec<MotionSample> {
    magnitudes
        .iter()
        .enumerate()
        .map(|(i, &m)| MotionSample::vertical(m, i as u64 * interval_ms))
        .collect()
}

fn bad_line(lineno: usize, message: &str) -> ValidationError {
    ValidationError::MalformedSample {
        line: lineno + 1,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_subscription_is_busy_until_released() {
        let mut sensor = SimulatedSensor::new();
        let mut sub = sensor.subscribe(100).unwrap();
        assert!(sensor.is_held());
        assert_eq!(sensor.subscribe(100).unwrap_err(), SensorError::Busy);
        sub.remove();
        assert!(!sensor.is_held());
        assert!(sensor.subscribe(50).is_ok());
        assert_eq!(sensor.requested_intervals(), vec![100, 50]);
    }

    #[test]
    fn unavailable_sensor_refuses() {
        let mut sensor = SimulatedSensor::unavailable();
        assert!(matches!(
            sensor.subscribe(100),
            Err(SensorError::Unavailable { .. })
        ));
        assert!(!sensor.is_held());
    }

    #[test]
    fn parses_both_line_shapes() {
        let input = "# t,x,y,z\n0,0,0,1.0\n100, 0.5, 0.5, 1.2\n\n";
        let samples = parse_samples(input.as_bytes(), 50).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].timestamp_ms, 100);

        let input = "0,0,1\n0,0,2\n";
        let samples = parse_samples(input.as_bytes(), 50).unwrap();
        assert_eq!(samples[1].timestamp_ms, 50);
        assert_eq!(samples[1].z, 2.0);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_samples("1,2\n".as_bytes(), 10).is_err());
        assert!(parse_samples("a,b,c\n".as_bytes(), 10).is_err());
    }

    #[test]
    fn rejects_non_finite_values() {
        assert!(parse_samples("0,NaN,1\n".as_bytes(), 10).is_err());
        assert!(parse_samples("inf,0,0,1\n".as_bytes(), 10).is_err());
        let err = parse_samples("0,0,1\n0,0,-inf\n".as_bytes(), 10).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedSample { line: 2, .. }));
    }
}
