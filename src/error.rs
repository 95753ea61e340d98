// Errors surfaced by the calibration engine

use std::time::Duration;

use crate::actuator::ActuatorError;
use crate::rig::{Corner, TravelSlot};

#[derive(Debug, thiserror::Error)]
pub enum RigError {
    #[error("{corner}: commanded speed {speed} deg/s exceeds the {ceiling} deg/s ceiling")]
    SpeedLimitExceeded {
        corner: Corner,
        speed: u32,
        ceiling: u32,
    },

    #[error("{corner}: not calibrated, {missing} is unset")]
    NotCalibrated {
        corner: Corner,
        missing: &'static str,
    },

    #[error("{corner}: invalid travel range, min {min} is not below max {max}")]
    InvalidRange { corner: Corner, min: i32, max: i32 },

    #[error("{corner}: {slot} was already recorded in this pass")]
    AlreadyRecorded { corner: Corner, slot: TravelSlot },

    #[error("Rig has not been tensioned, no calibration origin")]
    NotTensioned,

    #[error("Expected {driven} to reach its limit first, but {stalled} stalled")]
    UnexpectedStall { driven: Corner, stalled: Corner },

    #[error("{corner}: no stall within {timeout:?}")]
    StallTimeout { corner: Corner, timeout: Duration },

    #[error("{corner}: target not reached within {timeout:?}")]
    MoveTimeout { corner: Corner, timeout: Duration },

    #[error("{corner}: {source}")]
    Actuator {
        corner: Corner,
        #[source]
        source: ActuatorError,
    },

    #[error("Motor task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to publish status: {0}")]
    Publish(String),
}

impl RigError {
    /// Attach the corner an actuator failure came from
    pub fn actuator(corner: Corner) -> impl FnOnce(ActuatorError) -> Self {
        move |source| RigError::Actuator { corner, source }
    }
}
