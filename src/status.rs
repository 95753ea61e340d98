// Status output: snapshots of the rig and where they are sent

use async_trait::async_trait;
use tracing::info;

use crate::error::RigError;
use crate::messages::{MotorStatus, RigHealth, TravelReport};
use crate::rig::Rig;

/// One-way sink for milestone reports and health changes
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn travel(&self, report: &TravelReport) -> Result<(), RigError>;

    async fn health(&self, health: RigHealth) -> Result<(), RigError>;
}

/// Writes the human-readable dump to the log
pub struct LogSink;

#[async_trait]
impl StatusSink for LogSink {
    async fn travel(&self, report: &TravelReport) -> Result<(), RigError> {
        info!("\n{}", report);
        Ok(())
    }

    async fn health(&self, health: RigHealth) -> Result<(), RigError> {
        info!("Rig health: {:?}", health);
        Ok(())
    }
}

/// Read present angles and combine them with the recorded travel state
pub async fn snapshot(rig: &Rig, milestone: &str) -> Result<TravelReport, RigError> {
    let angles = rig.angles().await?;
    let origin = rig.origin();

    let motors = rig
        .motors()
        .map(|motor| {
            let corner = motor.corner();
            let travel = motor.travel();
            MotorStatus {
                corner,
                angle: angles[corner.index()],
                min: travel.min(),
                max: travel.max(),
                center: travel.center(),
                left_neighbor: travel.left_neighbor(),
                right_neighbor: travel.right_neighbor(),
                initial: origin.map(|o| o.initial(corner)),
                tensioned: origin.map(|o| o.tensioned(corner)),
            }
        })
        .collect();

    Ok(TravelReport {
        milestone: milestone.to_string(),
        motors,
    })
}

/// Snapshot the rig and hand it to `sink`
pub async fn report(rig: &Rig, sink: &dyn StatusSink, milestone: &str) -> Result<(), RigError> {
    let report = snapshot(rig, milestone).await?;
    sink.travel(&report).await
}
