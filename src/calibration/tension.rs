// Tensioning: take the slack out of every string

use tracing::info;

use crate::actuator::Stop;
use crate::combinator::join_all;
use crate::config::RigConfig;
use crate::error::RigError;
use crate::rig::{CalibrationOrigin, Corner, Reel, Rig, StallCommand};

/// Reel every motor in under the tension duty limit until each one stalls.
///
/// Join-all: a motor that tensions early must not cut the others short.
/// The stall angles become the calibration origin.
pub async fn tension(rig: &mut Rig, config: &RigConfig) -> Result<CalibrationOrigin, RigError> {
    let initial = rig.angles().await?;
    info!("Tensioning all motors from {:?}", initial);

    let command = StallCommand {
        reel: Reel::In,
        limit: super::calibration_limit(config),
        duty_limit: config.tension_duty_limit,
        then: Stop::Hold,
        timeout: config.stall_timeout(),
    };
    let tasks = super::stall_tasks(rig, Corner::CLOCKWISE, |_| command)?;

    let mut tensioned = initial;
    for (corner, angle) in join_all(tasks).await? {
        tensioned[corner.index()] = angle;
    }

    let origin = CalibrationOrigin { initial, tensioned };
    rig.set_origin(origin);
    info!("All motors tensioned to {:?}", tensioned);
    Ok(origin)
}
