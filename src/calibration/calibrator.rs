// Travel calibrator state machine
//
// One pass drives each corner to its limit once, in a fixed rotation. While a
// corner is held at its limit the other three tension against it: the
// diagonal partner finds its opposite bound, the adjacent ones a neighbor
// bound. Every motor ends the pass with both bounds and two neighbors.

use tracing::{info, warn};

use super::aggregator::aggregate;
use super::orchestrator::return_to_origin;
use super::relax::relax;
use super::tension::tension;
use crate::actuator::Stop;
use crate::combinator::{join_all, race};
use crate::config::RigConfig;
use crate::error::RigError;
use crate::messages::RigHealth;
use crate::rig::{Corner, Reel, Rig, StallCommand};
use crate::status::{report, StatusSink};
use crate::telemetry::monitored;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Tensioning,
    Relaxing,
    DriveToLimit(Corner),
    Hold(Corner),
    TensionPartners(Corner),
    Relax(Corner),
    ReturnToOrigin(Corner),
    SettleAtOrigin(Corner),
    Aggregating,
    Aggregated,
}

impl CalibrationState {
    pub const START: CalibrationState = CalibrationState::Tensioning;

    /// Next state, `None` once aggregated
    pub fn successor(self) -> Option<CalibrationState> {
        use CalibrationState::*;

        let next = match self {
            Tensioning => Relaxing,
            Relaxing => DriveToLimit(Corner::CALIBRATION_ROTATION[0]),
            DriveToLimit(corner) => Hold(corner),
            Hold(corner) => TensionPartners(corner),
            TensionPartners(corner) => Relax(corner),
            Relax(corner) => ReturnToOrigin(corner),
            ReturnToOrigin(corner) => SettleAtOrigin(corner),
            SettleAtOrigin(corner) => next_corner(corner).map_or(Aggregating, DriveToLimit),
            Aggregating => Aggregated,
            Aggregated => return None,
        };
        Some(next)
    }
}

fn next_corner(corner: Corner) -> Option<Corner> {
    let rotation = Corner::CALIBRATION_ROTATION;
    let index = rotation.iter().position(|&c| c == corner)?;
    rotation.get(index + 1).copied()
}

/// Drives one calibration pass over a rig
pub struct Calibrator<'a> {
    rig: &'a mut Rig,
    config: &'a RigConfig,
    status: &'a dyn StatusSink,
    state: CalibrationState,
}

impl<'a> Calibrator<'a> {
    pub fn new(rig: &'a mut Rig, config: &'a RigConfig, status: &'a dyn StatusSink) -> Self {
        Self {
            rig,
            config,
            status,
            state: CalibrationState::START,
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// Run a full pass from tensioning to aggregated centers.
    ///
    /// Anything a previous pass recorded is discarded first.
    pub async fn run(&mut self) -> Result<[i32; 4], RigError> {
        info!("Starting calibration pass");
        self.rig.reset_calibration();
        self.state = CalibrationState::START;
        self.status.health(RigHealth::Calibrating).await?;

        while self.state != CalibrationState::Aggregated {
            if let Err(e) = self.step().await {
                warn!("Calibration failed in {:?}: {}", self.state, e);
                self.status.health(RigHealth::Fault).await?;
                return Err(e);
            }
        }

        self.status.health(RigHealth::Calibrated).await?;
        super::aggregator::centers(self.rig)
    }

    /// Execute the current state and advance to the next one
    pub async fn step(&mut self) -> Result<CalibrationState, RigError> {
        let state = self.state;
        let handles = self.rig.handles();
        let every = self.config.telemetry_interval();
        info!("Calibration stage: {:?}", state);

        match state {
            CalibrationState::Tensioning => {
                monitored(&handles, every, tension(self.rig, self.config)).await?;
                self.report("Tensioned").await?;
            }
            CalibrationState::Relaxing => {
                relax(self.rig, self.config).await?;
                self.report("Relaxed after tensioning").await?;
            }
            CalibrationState::DriveToLimit(corner) => {
                monitored(&handles, every, self.drive_to_limit(corner)).await?;
            }
            CalibrationState::Hold(corner) => {
                self.rig.motor(corner).handle().hold().await?;
                info!("{} is holding", corner);
            }
            CalibrationState::TensionPartners(corner) => {
                monitored(&handles, every, self.tension_partners(corner)).await?;
            }
            CalibrationState::Relax(corner) => {
                relax(self.rig, self.config).await?;
                self.report(&format!("{}: relaxed all motors", corner)).await?;
            }
            CalibrationState::ReturnToOrigin(_) => {
                monitored(&handles, every, return_to_origin(self.rig, self.config)).await?;
            }
            CalibrationState::SettleAtOrigin(corner) => {
                relax(self.rig, self.config).await?;
                self.report(&format!("{}: relaxed at the tensioned origin", corner))
                    .await?;
            }
            CalibrationState::Aggregating => {
                aggregate(self.rig)?;
                self.report("Travel centers").await?;
            }
            CalibrationState::Aggregated => {}
        }

        if let Some(next) = state.successor() {
            self.state = next;
        }
        Ok(self.state)
    }

    /// Race: `driven` reels in under the collision limit while the others
    /// reel out. Whoever stalls first stops the whole group.
    async fn drive_to_limit(&mut self, driven: Corner) -> Result<(), RigError> {
        let limit = super::calibration_limit(self.config);
        let tasks = super::stall_tasks(self.rig, Corner::CLOCKWISE, |corner| StallCommand {
            reel: if corner == driven { Reel::In } else { Reel::Out },
            limit,
            duty_limit: self.config.collision_duty_limit,
            then: Stop::Hold,
            timeout: self.config.stall_timeout(),
        })?;

        let outcome = race(tasks).await?;
        for &corner in &outcome.cancelled {
            self.rig.motor(corner).handle().stop(Stop::Hold).await?;
        }
        if outcome.winner != driven {
            return Err(RigError::UnexpectedStall {
                driven,
                stalled: outcome.winner,
            });
        }

        let motor = self.rig.motor_mut(driven);
        let slot = motor.winding().reel_in_bound();
        motor.record(slot, outcome.value)?;
        info!("{}: {} travel angle is at {}", driven, slot, outcome.value);
        Ok(())
    }

    /// Join-all: with `driven` held, the other three reel in until each stalls
    async fn tension_partners(&mut self, driven: Corner) -> Result<(), RigError> {
        let limit = super::calibration_limit(self.config);
        let partners = Corner::CLOCKWISE.into_iter().filter(|&c| c != driven);
        let tasks = super::stall_tasks(self.rig, partners, |_| StallCommand {
            reel: Reel::In,
            limit,
            duty_limit: self.config.tension_duty_limit,
            then: Stop::Hold,
            timeout: self.config.stall_timeout(),
        })?;

        for (corner, angle) in join_all(tasks).await? {
            let motor = self.rig.motor_mut(corner);
            // the diagonal partner is strung straight to the held corner
            let slot = corner
                .neighbor_slot(driven)
                .unwrap_or_else(|| motor.winding().reel_out_bound());
            motor.record(slot, angle)?;
            info!("{}: {} travel angle is at {}", corner, slot, angle);
        }
        Ok(())
    }

    async fn report(&self, milestone: &str) -> Result<(), RigError> {
        report(self.rig, self.status, milestone).await
    }
}
