// Feetech servo as a rig actuator
//
// The servo runs in velocity mode. Stalls are detected by polling present load
// and position: the motor counts as stalled when it strains above the duty
// limit without moving for a few consecutive samples.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::feetech::{self, FeetechBus, FeetechError, OperatingMode};
use super::units::{degps_to_raw, load_to_percent, AngleTracker};
use super::{Actuator, ActuatorError, Stop};

/// Every servo of the rig talks over the same serial line
pub type SharedBus = Arc<Mutex<FeetechBus>>;

/// Sensing and approach parameters for one servo
#[derive(Debug, Clone, Copy)]
pub struct ServoTuning {
    pub poll_interval: Duration,
    /// Consecutive blocked samples before a stall is reported
    pub stall_samples: u32,
    /// Largest movement per sample still counted as blocked
    pub stall_motion_deg: i32,
    pub target_tolerance_deg: i32,
    /// Distance from the target at which the approach slows down
    pub approach_zone_deg: i32,
    pub min_approach_speed: i32,
    /// Acceleration register value (100 steps/s^2 per unit)
    pub acceleration: u8,
}

impl Default for ServoTuning {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(20),
            stall_samples: 5,
            stall_motion_deg: 2,
            target_tolerance_deg: 3,
            approach_zone_deg: 90,
            min_approach_speed: 30,
            acceleration: 50,
        }
    }
}

/// Register writes that bring a servo to rest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopWrite {
    ZeroVelocity,
    EnableTorque,
    DisableTorque,
}

fn stop_writes(then: Stop) -> [StopWrite; 2] {
    match then {
        // torque may still be off from an earlier coast
        Stop::Hold => [StopWrite::ZeroVelocity, StopWrite::EnableTorque],
        Stop::Coast => [StopWrite::ZeroVelocity, StopWrite::DisableTorque],
    }
}

/// Counts consecutive samples in which the servo strains without moving
#[derive(Debug, Clone, Copy)]
struct StallDetector {
    duty_limit: f32,
    motion_deg: i32,
    samples: u32,
    last: i32,
    blocked: u32,
}

impl StallDetector {
    fn new(tuning: &ServoTuning, duty_limit: u8, start: i32) -> Self {
        Self {
            duty_limit: duty_limit as f32,
            motion_deg: tuning.stall_motion_deg,
            samples: tuning.stall_samples,
            last: start,
            blocked: 0,
        }
    }

    /// Feed one angle/load reading, true once stalled
    fn sample(&mut self, angle: i32, load: f32) -> bool {
        // the duty has to exceed the limit, reaching it is not enough
        let straining = load.abs() > self.duty_limit;
        let still = (angle - self.last).abs() <= self.motion_deg;
        self.last = angle;
        self.blocked = if straining && still { self.blocked + 1 } else { 0 };
        self.blocked >= self.samples
    }
}

/// Signed speed toward a target `error` degrees away.
///
/// Full `speed` outside the approach zone, then a linear slow-down that never
/// drops below the minimum approach speed nor exceeds `speed`.
fn approach_speed(tuning: &ServoTuning, speed: i32, error: i32) -> i32 {
    let distance = error.abs();
    let magnitude = if distance < tuning.approach_zone_deg {
        (speed * distance / tuning.approach_zone_deg).max(tuning.min_approach_speed)
    } else {
        speed
    };
    magnitude.min(speed) * error.signum()
}

struct ServoInner {
    id: u8,
    bus: SharedBus,
    tracker: Mutex<AngleTracker>,
    tuning: ServoTuning,
}

impl ServoInner {
    fn with_bus<T>(
        &self,
        op: impl FnOnce(&mut FeetechBus) -> feetech::Result<T>,
    ) -> Result<T, ActuatorError> {
        let mut bus = self.bus.lock().map_err(|_| ActuatorError::Poisoned)?;
        Ok(op(&mut bus)?)
    }

    fn read_angle(&self) -> Result<i32, ActuatorError> {
        let raw = self.with_bus(|bus| bus.position(self.id))?;
        let mut tracker = self.tracker.lock().map_err(|_| ActuatorError::Poisoned)?;
        tracker.update(raw);
        Ok(tracker.degrees())
    }

    fn read_load(&self) -> Result<f32, ActuatorError> {
        let raw = self.with_bus(|bus| bus.load(self.id))?;
        Ok(load_to_percent(raw))
    }

    /// Enable torque and start turning
    fn drive(&self, speed: i32) -> Result<(), ActuatorError> {
        debug!("servo {}: drive at {} deg/s", self.id, speed);
        self.with_bus(|bus| {
            bus.enable_torque(self.id)?;
            bus.set_velocity(self.id, degps_to_raw(speed))
        })
    }

    fn set_speed(&self, speed: i32) -> Result<(), ActuatorError> {
        self.with_bus(|bus| bus.set_velocity(self.id, degps_to_raw(speed)))
    }

    fn apply_stop(&self, then: Stop) -> Result<(), ActuatorError> {
        debug!("servo {}: stop ({:?})", self.id, then);
        self.with_bus(|bus| {
            for write in stop_writes(then) {
                match write {
                    StopWrite::ZeroVelocity => bus.set_velocity(self.id, 0)?,
                    StopWrite::EnableTorque => bus.enable_torque(self.id)?,
                    StopWrite::DisableTorque => bus.disable_torque(self.id)?,
                }
            }
            Ok(())
        })
    }

    /// Keep the revolution tracker fed while a timed run is in progress
    async fn run_until(&self, deadline: Instant, then: Stop) -> Result<(), ActuatorError> {
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            sleep(self.tuning.poll_interval.min(deadline - now)).await;
            self.read_angle()?;
        }
        self.apply_stop(then)
    }
}

/// Feetech STS servo driven through a shared bus
pub struct FeetechServo {
    inner: Arc<ServoInner>,
}

impl FeetechServo {
    /// Check the servo responds and put it in velocity mode.
    ///
    /// The first position reading becomes angle zero.
    pub fn connect(bus: SharedBus, id: u8, tuning: ServoTuning) -> Result<Self, ActuatorError> {
        info!("Initializing servo {} for velocity control", id);
        {
            let mut guard = bus.lock().map_err(|_| ActuatorError::Poisoned)?;
            if !guard.ping(id)? {
                warn!("Servo {} not responding to ping", id);
                return Err(FeetechError::Timeout { id }.into());
            }
            // mode changes require torque off
            guard.disable_torque(id)?;
            guard.set_operating_mode(id, OperatingMode::Velocity)?;
            guard.set_acceleration(id, tuning.acceleration)?;
            guard.enable_torque(id)?;
            guard.set_velocity(id, 0)?;
        }

        let inner = Arc::new(ServoInner {
            id,
            bus,
            tracker: Mutex::new(AngleTracker::new()),
            tuning,
        });
        inner.read_angle()?;
        Ok(Self { inner })
    }

    pub fn id(&self) -> u8 {
        self.inner.id
    }
}

#[async_trait]
impl Actuator for FeetechServo {
    async fn run_until_stalled(
        &self,
        speed: i32,
        then: Stop,
        duty_limit: u8,
    ) -> Result<i32, ActuatorError> {
        let servo = &self.inner;
        let tuning = servo.tuning;
        servo.drive(speed)?;

        let mut detector = StallDetector::new(&tuning, duty_limit, servo.read_angle()?);
        let mut tick = interval(tuning.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tick.tick().await;

        loop {
            tick.tick().await;
            let angle = servo.read_angle()?;
            let load = servo.read_load()?;

            if detector.sample(angle, load) {
                debug!(
                    "servo {}: stalled at {} deg, load {:.1}% (limit {}%)",
                    servo.id, angle, load, duty_limit
                );
                servo.apply_stop(then)?;
                return Ok(angle);
            }
        }
    }

    async fn run_for_duration(
        &self,
        speed: i32,
        duration: Duration,
        then: Stop,
        wait: bool,
    ) -> Result<(), ActuatorError> {
        self.inner.drive(speed)?;
        let deadline = Instant::now() + duration;

        if wait {
            return self.inner.run_until(deadline, then).await;
        }

        let servo = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(e) = servo.run_until(deadline, then).await {
                warn!("servo {}: timed run failed: {}", servo.id, e);
            }
        });
        Ok(())
    }

    async fn run_to_target(&self, speed: i32, target: i32, then: Stop) -> Result<(), ActuatorError> {
        let servo = &self.inner;
        let tuning = servo.tuning;
        let speed = speed.abs().max(tuning.min_approach_speed);

        let mut started = false;
        let mut tick = interval(tuning.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            let error = target - servo.read_angle()?;
            if error.abs() <= tuning.target_tolerance_deg {
                return servo.apply_stop(then);
            }

            let command = approach_speed(&tuning, speed, error);

            if started {
                servo.set_speed(command)?;
            } else {
                servo.drive(command)?;
                started = true;
            }
        }
    }

    async fn stop(&self, then: Stop) -> Result<(), ActuatorError> {
        self.inner.apply_stop(then)
    }

    async fn angle(&self) -> Result<i32, ActuatorError> {
        self.inner.read_angle()
    }

    async fn load(&self) -> Result<f32, ActuatorError> {
        self.inner.read_load()
    }
}

impl Drop for FeetechServo {
    fn drop(&mut self) {
        // never leave a servo spinning when the rig is torn down
        if let Err(e) = self.inner.set_speed(0) {
            warn!("Failed to stop servo {} on drop: {}", self.inner.id, e);
        }
    }
}
