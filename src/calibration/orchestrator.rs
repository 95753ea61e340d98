// Motion orchestration in per-motor angle space

use tracing::info;

use crate::actuator::Stop;
use crate::combinator::join_all;
use crate::config::RigConfig;
use crate::error::RigError;
use crate::rig::{Corner, MotorTask, Rig, SpeedLimit, TargetCommand};

/// Absolute angle and speed magnitude for one motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub angle: i32,
    pub speed: u32,
}

/// Move all four motors concurrently, `targets` in clockwise order.
///
/// Every speed is checked against the operating ceiling before any motor moves.
pub async fn move_all(
    rig: &Rig,
    config: &RigConfig,
    targets: [Target; 4],
    then: Stop,
) -> Result<(), RigError> {
    let tasks = rig
        .motors()
        .map(|motor| {
            let target = targets[motor.corner().index()];
            let task: MotorTask<()> = motor.handle().target_task(TargetCommand {
                target: target.angle,
                limit: SpeedLimit::new(target.speed, config.operating_speed_ceiling),
                then,
                timeout: config.move_timeout(),
            })?;
            Ok((motor.corner(), task))
        })
        .collect::<Result<Vec<_>, RigError>>()?;

    join_all(tasks).await?;
    Ok(())
}

/// Back to the post-tensioning angles, coasting on arrival
pub async fn return_to_origin(rig: &Rig, config: &RigConfig) -> Result<(), RigError> {
    let origin = rig.origin().ok_or(RigError::NotTensioned)?;
    let targets = Corner::CLOCKWISE.map(|corner| Target {
        angle: origin.tensioned(corner),
        speed: config.operating_speed,
    });

    move_all(rig, config, targets, Stop::Coast).await?;
    info!("All motors back at the tensioned origin {:?}", origin.tensioned);
    Ok(())
}

/// Drive every motor to its calibrated center and hold there
pub async fn move_to_center(rig: &Rig, config: &RigConfig) -> Result<(), RigError> {
    let mut targets = [Target { angle: 0, speed: 0 }; 4];
    for motor in rig.motors() {
        let corner = motor.corner();
        let center = motor.travel().center().ok_or(RigError::NotCalibrated {
            corner,
            missing: "center",
        })?;
        targets[corner.index()] = Target {
            angle: center,
            speed: config.operating_speed,
        };
    }

    move_all(rig, config, targets, Stop::Hold).await?;
    info!("Disc centered");
    Ok(())
}
