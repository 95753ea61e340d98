// Relaxation: brief reel-out on every motor, then let the springs recover

use std::time::Duration;

use tokio::time::sleep;
use tracing::info;

use crate::actuator::Stop;
use crate::config::RigConfig;
use crate::error::RigError;
use crate::rig::{Reel, Rig, SpeedLimit};

/// Reel out at calibration speed for the configured relax time, then wait
/// for relax time plus settle time before returning.
pub async fn relax(rig: &Rig, config: &RigConfig) -> Result<(), RigError> {
    reel_out_all(
        rig,
        super::calibration_limit(config),
        config.relax_time(),
        config.relax_settle_time(),
    )
    .await
}

/// Release the whole array, e.g. before powering the rig down
pub async fn release(rig: &Rig, config: &RigConfig, time: Duration) -> Result<(), RigError> {
    info!("Releasing all strings for {:?}", time);
    reel_out_all(rig, super::calibration_limit(config), time, Duration::ZERO).await?;
    info!("Tension array relaxed");
    Ok(())
}

async fn reel_out_all(
    rig: &Rig,
    limit: SpeedLimit,
    time: Duration,
    settle: Duration,
) -> Result<(), RigError> {
    let handles = rig.handles();
    // reject before any motor starts
    for handle in &handles {
        limit.check(handle.corner())?;
    }
    for handle in &handles {
        handle.reel_for(Reel::Out, limit, time, Stop::Coast).await?;
    }
    sleep(time + settle).await;
    Ok(())
}
