#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cable_rig_runtime::actuator::{Actuator, ActuatorError, Stop};
use cable_rig_runtime::config::RigConfig;
use cable_rig_runtime::messages::{RigHealth, TravelReport};
use cable_rig_runtime::rig::{Corner, Rig, Winding};
use cable_rig_runtime::status::StatusSink;
use cable_rig_runtime::RigError;
use tokio::time::sleep;

/// Every command a mock actuator received, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Stall { speed: i32, duty_limit: u8, then: Stop },
    Timed { speed: i32, duration: Duration, then: Stop, wait: bool },
    Target { speed: i32, target: i32, then: Stop },
    Stop(Stop),
    /// A run-until-stalled was dropped before it stalled
    Cancelled,
}

pub type CallLog = Arc<Mutex<Vec<(Corner, Call)>>>;

/// Scripted outcome of one run-until-stalled
#[derive(Debug, Clone, Copy)]
pub enum Stall {
    After(u64, i32),
    Never,
}

pub fn after(ms: u64, angle: i32) -> Stall {
    Stall::After(ms, angle)
}

struct MockState {
    angle: i32,
    stalls: VecDeque<Stall>,
}

pub struct MockActuator {
    corner: Corner,
    log: CallLog,
    state: Mutex<MockState>,
}

impl MockActuator {
    pub fn new(corner: Corner, log: CallLog, angle: i32, stalls: Vec<Stall>) -> Self {
        Self {
            corner,
            log,
            state: Mutex::new(MockState {
                angle,
                stalls: stalls.into(),
            }),
        }
    }

    fn push(&self, call: Call) {
        self.log.lock().unwrap().push((self.corner, call));
    }

    fn set_angle(&self, angle: i32) {
        self.state.lock().unwrap().angle = angle;
    }
}

/// Logs `Call::Cancelled` if dropped while still armed
struct CancelGuard {
    corner: Corner,
    log: CallLog,
    armed: bool,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            self.log.lock().unwrap().push((self.corner, Call::Cancelled));
        }
    }
}

#[async_trait]
impl Actuator for MockActuator {
    async fn run_until_stalled(
        &self,
        speed: i32,
        then: Stop,
        duty_limit: u8,
    ) -> Result<i32, ActuatorError> {
        self.push(Call::Stall {
            speed,
            duty_limit,
            then,
        });
        let next = self.state.lock().unwrap().stalls.pop_front();
        let mut guard = CancelGuard {
            corner: self.corner,
            log: self.log.clone(),
            armed: true,
        };

        match next {
            Some(Stall::After(ms, angle)) => {
                sleep(Duration::from_millis(ms)).await;
                guard.armed = false;
                self.set_angle(angle);
                Ok(angle)
            }
            Some(Stall::Never) => std::future::pending().await,
            None => {
                guard.armed = false;
                Err(ActuatorError::Fault(format!("{} has no stall scripted", self.corner)))
            }
        }
    }

    async fn run_for_duration(
        &self,
        speed: i32,
        duration: Duration,
        then: Stop,
        wait: bool,
    ) -> Result<(), ActuatorError> {
        self.push(Call::Timed {
            speed,
            duration,
            then,
            wait,
        });
        if wait {
            sleep(duration).await;
        }
        let travelled = (speed as i64 * duration.as_millis() as i64 / 1000) as i32;
        let angle = self.state.lock().unwrap().angle;
        self.set_angle(angle + travelled);
        Ok(())
    }

    async fn run_to_target(&self, speed: i32, target: i32, then: Stop) -> Result<(), ActuatorError> {
        self.push(Call::Target {
            speed,
            target,
            then,
        });
        sleep(Duration::from_millis(25)).await;
        self.set_angle(target);
        Ok(())
    }

    async fn stop(&self, then: Stop) -> Result<(), ActuatorError> {
        self.push(Call::Stop(then));
        Ok(())
    }

    async fn angle(&self) -> Result<i32, ActuatorError> {
        Ok(self.state.lock().unwrap().angle)
    }

    async fn load(&self) -> Result<f32, ActuatorError> {
        Ok(12.5)
    }
}

/// Keeps every report and health change for inspection
#[derive(Default)]
pub struct RecordingSink {
    pub reports: Mutex<Vec<TravelReport>>,
    pub health: Mutex<Vec<RigHealth>>,
}

#[async_trait]
impl StatusSink for RecordingSink {
    async fn travel(&self, report: &TravelReport) -> Result<(), RigError> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }

    async fn health(&self, health: RigHealth) -> Result<(), RigError> {
        self.health.lock().unwrap().push(health);
        Ok(())
    }
}

/// Winding per corner as mounted on the reference rig
pub fn winding(corner: Corner) -> Winding {
    match corner {
        Corner::TopLeft | Corner::BottomRight => Winding::Negative,
        Corner::TopRight | Corner::BottomLeft => Winding::Positive,
    }
}

/// A rig of four mock actuators starting at angle 0 and a shared call log
pub fn mock_rig(scripts: Vec<(Corner, Vec<Stall>)>) -> (Rig, CallLog) {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let actuators = scripts.into_iter().map(|(corner, stalls)| {
        let actuator: Arc<dyn Actuator> =
            Arc::new(MockActuator::new(corner, log.clone(), 0, stalls));
        (corner, winding(corner), actuator)
    });
    let rig = Rig::new(actuators.collect::<Vec<_>>()).unwrap();
    (rig, log)
}

pub fn test_config() -> RigConfig {
    RigConfig::default()
}

pub fn calls(log: &CallLog) -> Vec<(Corner, Call)> {
    log.lock().unwrap().clone()
}
