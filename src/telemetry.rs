// Periodic load readout raced alongside a stage

use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::RigError;
use crate::rig::MotorHandle;

/// Log the load of every motor forever
async fn log_load(handles: &[MotorHandle], every: Duration) -> Infallible {
    let mut tick = interval(every);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tick.tick().await;
        let mut loads = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.load().await {
                Ok(load) => loads.push(format!("{} {:.1}%", handle.corner().arrow(), load)),
                Err(e) => {
                    warn!("Load readout failed: {}", e);
                    loads.push(format!("{} ?", handle.corner().arrow()));
                }
            }
        }
        debug!("Load {}", loads.join("  "));
    }
}

/// Run `stage` with load telemetry; the telemetry stops when the stage does
pub async fn monitored<T, F>(
    handles: &[MotorHandle],
    every: Option<Duration>,
    stage: F,
) -> Result<T, RigError>
where
    F: Future<Output = Result<T, RigError>>,
{
    let Some(every) = every else {
        return stage.await;
    };

    tokio::select! {
        result = stage => result,
        never = log_load(handles, every) => match never {},
    }
}
