//! Motion samples and the sensor source seam.
//!
//! The accelerometer itself is a platform collaborator. The core only needs
//! to subscribe at an interval and to release the sensor again, so the
//! subscription is modelled as a guard that removes itself exactly once.

use serde::{Deserialize, Serialize};

use crate::error::SensorError;

/// One accelerometer reading in g, stamped with its arrival time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Arrival time in milliseconds on a monotonic clock.
    pub timestamp_ms: u64,
}

impl MotionSample {
    pub fn new(x: f64, y: f64, z: f64, timestamp_ms: u64) -> Self {
        Self { x, y, z, timestamp_ms }
    }

    /// Sample whose whole acceleration lies on the z axis.
    pub fn vertical(magnitude: f64, timestamp_ms: u64) -> Self {
        Self::new(0.0, 0.0, magnitude, timestamp_ms)
    }

    /// Euclidean norm of the acceleration vector.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Platform side of a live subscription.
pub trait SubscriptionHandle {
    /// Stop delivering samples and release the sensor.
    fn remove(&mut self);
}

/// Scoped sensor subscription.
///
/// Calling [`remove`](Self::remove) or dropping the guard releases the
/// sensor; the platform handle sees exactly one `remove()`.
pub struct SensorSubscription {
    interval_ms: u64,
    handle: Option<Box<dyn SubscriptionHandle>>,
}

impl SensorSubscription {
    pub fn new(interval_ms: u64, handle: Box<dyn SubscriptionHandle>) -> Self {
        Self {
            interval_ms,
            handle: Some(handle),
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn remove(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.remove();
        }
    }
}

impl Drop for SensorSubscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl std::fmt::Debug for SensorSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorSubscription")
            .field("interval_ms", &self.interval_ms)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Accelerometer collaborator.
pub trait MotionSource {
    /// Start delivering samples every `interval_ms`.
    ///
    /// # Errors
    /// [`SensorError::Unavailable`] when the hardware is absent or access is
    /// denied, [`SensorError::Busy`] when another subscriber holds it.
    fn subscribe(&mut self, interval_ms: u64) -> Result<SensorSubscription, SensorError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingHandle(Rc<Cell<u32>>);

    impl SubscriptionHandle for CountingHandle {
        fn remove(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn magnitude_of_gravity_only_sample() {
        let s = MotionSample::new(0.0, 0.0, 1.0, 0);
        assert!((s.magnitude() - 1.0).abs() < 1e-12);
        let s = MotionSample::new(3.0, 4.0, 0.0, 0);
        assert!((s.magnitude() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn subscription_removes_once() {
        let removed = Rc::new(Cell::new(0));
        let mut sub = SensorSubscription::new(100, Box::new(CountingHandle(removed.clone())));
        assert!(sub.is_active());
        sub.remove();
        sub.remove();
        drop(sub);
        assert_eq!(removed.get(), 1);
    }

    #[test]
    fn subscription_removes_on_drop() {
        let removed = Rc::new(Cell::new(0));
        {
            let _sub = SensorSubscription::new(50, Box::new(CountingHandle(removed.clone())));
        }
        assert_eq!(removed.get(), 1);
    }
}
