// Speed ceilings, stall thresholds, timings, topics and motor layout
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::RigError;
use crate::rig::{Corner, Winding};

// Speed ceilings (deg/s)
pub const CALIBRATION_SPEED_CEILING: u32 = 300;
pub const OPERATING_SPEED_CEILING: u32 = 1500;

// Stall sensitivity (percent duty) for a 1:3 gear-down reel.
// Tension: string taut against the spring without slipping the clutch.
// Collision: disc about to be pulled into a motor housing, must trip earlier.
pub const TENSION_DUTY_LIMIT: u8 = 22;
pub const COLLISION_DUTY_LIMIT: u8 = 18;

// Reel-out time to let the clutch settle, then wait for the springs to recover.
// Reading stalls any sooner gives false positives.
pub const RELAX_TIME: Duration = Duration::from_millis(1000);
pub const RELAX_SETTLE_TIME: Duration = Duration::from_millis(500);

// Upper bound on any single stall or target wait
pub const STALL_TIMEOUT: Duration = Duration::from_secs(30);
pub const MOVE_TIMEOUT: Duration = Duration::from_secs(30);

// Load telemetry period while a stage runs
pub const TELEMETRY_INTERVAL: Duration = Duration::from_millis(200);

// Stand-alone release of the array
pub const RELEASE_TIME: Duration = Duration::from_millis(2000);

// Zenoh topics
pub const TOPIC_TRAVEL: &str = "cable/state/travel"; // travel report per milestone
pub const TOPIC_HEALTH: &str = "cable/state/health"; // calibration health

// Serial port for the Feetech bus
pub const MOTOR_PORT: &str = "/dev/ttyUSB0";

/// Servo id and winding of one corner
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MotorConfig {
    pub corner: Corner,
    pub id: u8,
    pub winding: Winding,
}

/// Tuning for one rig. Every field falls back to the constants above.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub port: String,
    pub calibration_speed_ceiling: u32,
    pub operating_speed_ceiling: u32,
    /// Speed used by calibration stages, at most the calibration ceiling
    pub calibration_speed: u32,
    /// Speed used for orchestrated moves, at most the operating ceiling
    pub operating_speed: u32,
    pub tension_duty_limit: u8,
    pub collision_duty_limit: u8,
    pub relax_time_ms: u64,
    pub relax_settle_ms: u64,
    pub stall_timeout_ms: u64,
    pub move_timeout_ms: u64,
    /// 0 disables load telemetry
    pub telemetry_interval_ms: u64,
    pub motors: Vec<MotorConfig>,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            port: MOTOR_PORT.to_string(),
            calibration_speed_ceiling: CALIBRATION_SPEED_CEILING,
            operating_speed_ceiling: OPERATING_SPEED_CEILING,
            calibration_speed: CALIBRATION_SPEED_CEILING,
            operating_speed: OPERATING_SPEED_CEILING,
            tension_duty_limit: TENSION_DUTY_LIMIT,
            collision_duty_limit: COLLISION_DUTY_LIMIT,
            relax_time_ms: RELAX_TIME.as_millis() as u64,
            relax_settle_ms: RELAX_SETTLE_TIME.as_millis() as u64,
            stall_timeout_ms: STALL_TIMEOUT.as_millis() as u64,
            move_timeout_ms: MOVE_TIMEOUT.as_millis() as u64,
            telemetry_interval_ms: TELEMETRY_INTERVAL.as_millis() as u64,
            // top-left and bottom-right are mounted mirrored
            motors: vec![
                MotorConfig {
                    corner: Corner::TopLeft,
                    id: 1,
                    winding: Winding::Negative,
                },
                MotorConfig {
                    corner: Corner::TopRight,
                    id: 2,
                    winding: Winding::Positive,
                },
                MotorConfig {
                    corner: Corner::BottomRight,
                    id: 3,
                    winding: Winding::Negative,
                },
                MotorConfig {
                    corner: Corner::BottomLeft,
                    id: 4,
                    winding: Winding::Positive,
                },
            ],
        }
    }
}

impl RigConfig {
    /// Load from a JSON file, or the defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, RigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| RigError::Config(format!("{}: {}", path.display(), e)))?;
                Self::from_json(&text)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, RigError> {
        serde_json::from_str(text).map_err(|e| RigError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), RigError> {
        if self.calibration_speed == 0 || self.operating_speed == 0 {
            return Err(RigError::Config("speeds must be non-zero".to_string()));
        }
        if self.calibration_speed > self.calibration_speed_ceiling {
            return Err(RigError::Config(format!(
                "calibration speed {} exceeds ceiling {}",
                self.calibration_speed, self.calibration_speed_ceiling
            )));
        }
        if self.operating_speed > self.operating_speed_ceiling {
            return Err(RigError::Config(format!(
                "operating speed {} exceeds ceiling {}",
                self.operating_speed, self.operating_speed_ceiling
            )));
        }
        if self.collision_duty_limit >= self.tension_duty_limit {
            return Err(RigError::Config(format!(
                "collision duty limit {} must be below tension duty limit {}",
                self.collision_duty_limit, self.tension_duty_limit
            )));
        }
        if self.tension_duty_limit > 100 {
            return Err(RigError::Config("duty limits are percentages".to_string()));
        }
        if self.stall_timeout_ms == 0 || self.move_timeout_ms == 0 {
            return Err(RigError::Config("timeouts must be non-zero".to_string()));
        }

        let mut seen = [false; 4];
        for motor in &self.motors {
            if std::mem::replace(&mut seen[motor.corner.index()], true) {
                return Err(RigError::Config(format!("{} configured twice", motor.corner)));
            }
        }
        if self.motors.len() != 4 {
            return Err(RigError::Config(format!(
                "expected 4 motors, got {}",
                self.motors.len()
            )));
        }
        Ok(())
    }

    pub fn relax_time(&self) -> Duration {
        Duration::from_millis(self.relax_time_ms)
    }

    pub fn relax_settle_time(&self) -> Duration {
        Duration::from_millis(self.relax_settle_ms)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    pub fn move_timeout(&self) -> Duration {
        Duration::from_millis(self.move_timeout_ms)
    }

    pub fn telemetry_interval(&self) -> Option<Duration> {
        (self.telemetry_interval_ms > 0).then(|| Duration::from_millis(self.telemetry_interval_ms))
    }
}
