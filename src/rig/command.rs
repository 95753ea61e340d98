// Speed-checked motor commands
//
// Every command is validated against its ceiling when it is built, so a stage
// can reject a bad speed before any motor of that stage has moved.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use super::{Corner, Winding};
use crate::actuator::{Actuator, Stop};
use crate::error::RigError;

/// A single motor's share of a concurrent stage
pub type MotorTask<T> = Pin<Box<dyn Future<Output = Result<T, RigError>> + Send + 'static>>;

/// Tighten or loosen the string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reel {
    In,
    Out,
}

/// Requested speed magnitude and the ceiling it must respect (deg/s)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedLimit {
    pub speed: u32,
    pub ceiling: u32,
}

impl SpeedLimit {
    pub fn new(speed: u32, ceiling: u32) -> Self {
        Self { speed, ceiling }
    }

    /// Rejects, never clamps
    pub fn check(self, corner: Corner) -> Result<u32, RigError> {
        if self.speed > self.ceiling {
            return Err(RigError::SpeedLimitExceeded {
                corner,
                speed: self.speed,
                ceiling: self.ceiling,
            });
        }
        Ok(self.speed)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StallCommand {
    pub reel: Reel,
    pub limit: SpeedLimit,
    pub duty_limit: u8,
    pub then: Stop,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct TargetCommand {
    pub target: i32,
    pub limit: SpeedLimit,
    pub then: Stop,
    pub timeout: Duration,
}

/// Cloneable access to one corner's actuator, resolved through its winding
#[derive(Clone)]
pub struct MotorHandle {
    corner: Corner,
    winding: Winding,
    actuator: Arc<dyn Actuator>,
}

impl MotorHandle {
    pub fn new(corner: Corner, winding: Winding, actuator: Arc<dyn Actuator>) -> Self {
        Self {
            corner,
            winding,
            actuator,
        }
    }

    pub fn corner(&self) -> Corner {
        self.corner
    }

    pub fn winding(&self) -> Winding {
        self.winding
    }

    /// Build a run-until-stalled task; fails immediately if the speed is over its ceiling
    pub fn stall_task(&self, cmd: StallCommand) -> Result<MotorTask<i32>, RigError> {
        let speed = self.winding.signed(cmd.reel, cmd.limit.check(self.corner)?);
        let handle = self.clone();

        Ok(Box::pin(async move {
            debug!(
                "{}: reel {:?} at {} deg/s until stalled (duty {}%)",
                handle.corner, cmd.reel, speed, cmd.duty_limit
            );
            let run = handle.actuator.run_until_stalled(speed, cmd.then, cmd.duty_limit);
            match timeout(cmd.timeout, run).await {
                Ok(result) => result.map_err(RigError::actuator(handle.corner)),
                Err(_) => Err(RigError::StallTimeout {
                    corner: handle.corner,
                    timeout: cmd.timeout,
                }),
            }
        }))
    }

    /// Build a run-to-target task; fails immediately if the speed is over its ceiling
    pub fn target_task(&self, cmd: TargetCommand) -> Result<MotorTask<()>, RigError> {
        let speed = cmd.limit.check(self.corner)? as i32;
        let handle = self.clone();

        Ok(Box::pin(async move {
            debug!(
                "{}: run to {} at {} deg/s, then {:?}",
                handle.corner, cmd.target, speed, cmd.then
            );
            let run = handle.actuator.run_to_target(speed, cmd.target, cmd.then);
            match timeout(cmd.timeout, run).await {
                Ok(result) => result.map_err(RigError::actuator(handle.corner)),
                Err(_) => Err(RigError::MoveTimeout {
                    corner: handle.corner,
                    timeout: cmd.timeout,
                }),
            }
        }))
    }

    /// Start a timed reel without waiting for it to finish
    pub async fn reel_for(
        &self,
        reel: Reel,
        limit: SpeedLimit,
        duration: Duration,
        then: Stop,
    ) -> Result<(), RigError> {
        let speed = self.winding.signed(reel, limit.check(self.corner)?);
        self.actuator
            .run_for_duration(speed, duration, then, false)
            .await
            .map_err(RigError::actuator(self.corner))
    }

    pub async fn hold(&self) -> Result<(), RigError> {
        self.actuator
            .hold()
            .await
            .map_err(RigError::actuator(self.corner))
    }

    pub async fn stop(&self, then: Stop) -> Result<(), RigError> {
        self.actuator
            .stop(then)
            .await
            .map_err(RigError::actuator(self.corner))
    }

    pub async fn angle(&self) -> Result<i32, RigError> {
        self.actuator
            .angle()
            .await
            .map_err(RigError::actuator(self.corner))
    }

    pub async fn load(&self) -> Result<f32, RigError> {
        self.actuator
            .load()
            .await
            .map_err(RigError::actuator(self.corner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_at_ceiling_is_accepted() {
        assert_eq!(SpeedLimit::new(300, 300).check(Corner::TopLeft).unwrap(), 300);
    }

    #[test]
    fn test_speed_over_ceiling_is_rejected() {
        match SpeedLimit::new(301, 300).check(Corner::BottomLeft) {
            Err(RigError::SpeedLimitExceeded {
                corner: Corner::BottomLeft,
                speed: 301,
                ceiling: 300,
            }) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
