// Self-calibration of the cable rig
//
// Provides:
// - Tensioning and relaxation stages
// - The travel calibrator state machine
// - Range aggregation (centers)
// - Concurrent moves in angle space

pub mod aggregator;
mod calibrator;
pub mod orchestrator;
mod relax;
mod tension;

pub use aggregator::{aggregate, midpoint};
pub use calibrator::{CalibrationState, Calibrator};
pub use orchestrator::{move_all, move_to_center, return_to_origin, Target};
pub use relax::{relax, release};
pub use tension::tension;

use crate::config::RigConfig;
use crate::error::RigError;
use crate::rig::{Corner, MotorTask, Rig, SpeedLimit, StallCommand};

/// Speed limit every calibration-stage command runs under
fn calibration_limit(config: &RigConfig) -> SpeedLimit {
    SpeedLimit::new(config.calibration_speed, config.calibration_speed_ceiling)
}

/// Build one stall task per corner. Fails before anything is spawned if any
/// command is over its ceiling.
fn stall_tasks(
    rig: &Rig,
    corners: impl IntoIterator<Item = Corner>,
    command: impl Fn(Corner) -> StallCommand,
) -> Result<Vec<(Corner, MotorTask<i32>)>, RigError> {
    corners
        .into_iter()
        .map(|corner| Ok((corner, rig.motor(corner).handle().stall_task(command(corner))?)))
        .collect()
}
