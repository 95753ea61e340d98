// Unit conversion between the engine's degree-based angles and Feetech raw steps,
// plus multi-turn unwrapping of the single-turn position register.

use tracing::debug;

/// Motor resolution: 4096 steps per revolution
pub const STEPS_PER_REVOLUTION: i64 = 4096;
const STEPS_PER_DEG: f32 = STEPS_PER_REVOLUTION as f32 / 360.0;

/// Maximum raw velocity command accepted by the servo firmware
pub const MAX_RAW_VELOCITY: i16 = 3000;

/// Fastest the servo actually turns, about 264 deg/s. Faster requests,
/// including the default calibration and operating speeds, run at this.
pub const MAX_DEGPS: i32 = 264;

/// Convert degrees per second to a raw goal velocity, clamped to the servo limit
pub fn degps_to_raw(degps: i32) -> i16 {
    let speed_in_steps = (degps as f32 * STEPS_PER_DEG).round() as i32;
    let limit = MAX_RAW_VELOCITY as i32;
    if speed_in_steps.abs() > limit {
        debug!("{} deg/s is above the servo maximum, running at {} deg/s", degps, MAX_DEGPS * degps.signum());
    }
    speed_in_steps.clamp(-limit, limit) as i16
}

/// Convert an unwrapped step count to whole degrees (rounded to nearest)
pub fn steps_to_deg(steps: i64) -> i32 {
    ((steps as f64) * 360.0 / STEPS_PER_REVOLUTION as f64).round() as i32
}

/// Convert the present-load register (0.1 % units) to percent duty
pub fn load_to_percent(raw: i16) -> f32 {
    raw as f32 / 10.0
}

/// Tracks revolutions of a single-turn encoder so the reported angle is
/// continuous over the actuator's lifetime.
///
/// Zero is whatever the encoder read when the tracker was created.
#[derive(Debug, Clone, Default)]
pub struct AngleTracker {
    last_raw: Option<u16>,
    steps: i64,
}

impl AngleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw position reading (0..4096) and return the unwrapped step count.
    ///
    /// Assumes the shaft moves less than half a turn between two readings.
    pub fn update(&mut self, raw: u16) -> i64 {
        let raw = raw % STEPS_PER_REVOLUTION as u16;
        if let Some(last) = self.last_raw {
            let half = STEPS_PER_REVOLUTION / 2;
            let mut delta = raw as i64 - last as i64;
            if delta >= half {
                delta -= STEPS_PER_REVOLUTION;
            } else if delta < -half {
                delta += STEPS_PER_REVOLUTION;
            }
            self.steps += delta;
        }
        self.last_raw = Some(raw);
        self.steps
    }

    /// Unwrapped position in degrees
    pub fn degrees(&self) -> i32 {
        steps_to_deg(self.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_velocity() {
        assert_eq!(degps_to_raw(0), 0);
    }

    #[test]
    fn test_slow_velocity_reasonable_output() {
        // 300 deg/s would be 3413 steps/s, above what the firmware accepts
        assert_eq!(degps_to_raw(300), MAX_RAW_VELOCITY);
        assert_eq!(degps_to_raw(90), 1024);
        assert_eq!(degps_to_raw(-90), -1024);
    }

    #[test]
    fn test_velocity_clamped() {
        assert_eq!(degps_to_raw(100_000), MAX_RAW_VELOCITY);
        assert_eq!(degps_to_raw(-100_000), -MAX_RAW_VELOCITY);
    }

    #[test]
    fn test_max_degps_matches_raw_limit() {
        assert_eq!(steps_to_deg(MAX_RAW_VELOCITY as i64), MAX_DEGPS);
        assert_eq!(degps_to_raw(MAX_DEGPS - 1), 2992);
        assert_eq!(degps_to_raw(1500), degps_to_raw(MAX_DEGPS + 1));
    }

    #[test]
    fn test_steps_to_deg() {
        assert_eq!(steps_to_deg(0), 0);
        assert_eq!(steps_to_deg(4096), 360);
        assert_eq!(steps_to_deg(-1024), -90);
    }

    #[test]
    fn test_tracker_starts_at_zero() {
        let mut tracker = AngleTracker::new();
        assert_eq!(tracker.update(3000), 0);
        assert_eq!(tracker.degrees(), 0);
    }

    #[test]
    fn test_tracker_unwraps_forward() {
        let mut tracker = AngleTracker::new();
        tracker.update(4000);
        // crossed the wrap going up: 4000 -> 4095 -> 0 -> 100
        assert_eq!(tracker.update(100), 196);
        assert_eq!(tracker.update(2100), 2196);
        assert_eq!(tracker.update(4000), 4096);
        assert_eq!(tracker.degrees(), 360);
    }

    #[test]
    fn test_tracker_unwraps_backward() {
        let mut tracker = AngleTracker::new();
        tracker.update(100);
        assert_eq!(tracker.update(4000), -196);
        assert_eq!(tracker.update(2000), -2196);
        assert_eq!(tracker.update(100), -4096);
    }
}
