// Actuator layer for the cable rig
//
// Provides:
// - The `Actuator` trait every corner motor is driven through
// - Feetech STS serial bus protocol
// - A Feetech-backed actuator with stall detection and multi-turn angles

pub mod feetech;
mod servo;
pub mod units;

use std::time::Duration;

use async_trait::async_trait;

pub use feetech::{FeetechBus, FeetechError};
pub use servo::{FeetechServo, ServoTuning, SharedBus};

/// What a motor does once a command reaches its terminal condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// Let the shaft turn freely
    Coast,
    /// Actively hold the current angle
    Hold,
}

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("Bus error: {0}")]
    Bus(#[from] FeetechError),

    #[error("Bus lock poisoned")]
    Poisoned,

    #[error("Actuator fault: {0}")]
    Fault(String),
}

/// One corner motor with an encoder and load sensing.
///
/// Speeds are signed degrees per second in the actuator's own rotation sense,
/// angles are signed degrees with no fixed zero. The engine never assumes
/// which sense reels the string in; that is resolved by the rig's winding.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Run until the measured duty exceeds `duty_limit` percent while blocked,
    /// then apply `then`. Returns the angle at the stall.
    async fn run_until_stalled(
        &self,
        speed: i32,
        then: Stop,
        duty_limit: u8,
    ) -> Result<i32, ActuatorError>;

    /// Run at `speed` for `duration`, then apply `then`.
    /// With `wait == false` this returns as soon as the motor is started.
    async fn run_for_duration(
        &self,
        speed: i32,
        duration: Duration,
        then: Stop,
        wait: bool,
    ) -> Result<(), ActuatorError>;

    /// Run to an absolute angle at `speed` (magnitude), then apply `then`
    async fn run_to_target(&self, speed: i32, target: i32, then: Stop) -> Result<(), ActuatorError>;

    async fn stop(&self, then: Stop) -> Result<(), ActuatorError>;

    async fn hold(&self) -> Result<(), ActuatorError> {
        self.stop(Stop::Hold).await
    }

    async fn angle(&self) -> Result<i32, ActuatorError>;

    /// Present duty in percent, signed by direction
    async fn load(&self) -> Result<f32, ActuatorError>;
}
