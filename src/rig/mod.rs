// The four-motor rig: corner geometry, windings and per-motor travel state
//
// The rig is the single owner of every motor and of the calibration origin;
// stages borrow it instead of touching shared globals.

mod command;
mod travel;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use command::{MotorHandle, MotorTask, Reel, SpeedLimit, StallCommand, TargetCommand};
pub use travel::{TravelProfile, TravelSlot};

use crate::actuator::Actuator;
use crate::error::RigError;

/// Corner position of a motor. Strings run diagonally: top-left to
/// bottom-right and top-right to bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    /// Clockwise order, also the storage order of the rig
    pub const CLOCKWISE: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomRight,
        Corner::BottomLeft,
    ];

    /// Order in which corners are driven to their limit
    pub const CALIBRATION_ROTATION: [Corner; 4] = [
        Corner::TopLeft,
        Corner::BottomRight,
        Corner::BottomLeft,
        Corner::TopRight,
    ];

    pub fn index(self) -> usize {
        match self {
            Corner::TopLeft => 0,
            Corner::TopRight => 1,
            Corner::BottomRight => 2,
            Corner::BottomLeft => 3,
        }
    }

    /// The corner tied to this one by the same string
    pub fn diagonal(self) -> Corner {
        Corner::CLOCKWISE[(self.index() + 2) % 4]
    }

    pub fn clockwise_next(self) -> Corner {
        Corner::CLOCKWISE[(self.index() + 1) % 4]
    }

    pub fn counterclockwise_next(self) -> Corner {
        Corner::CLOCKWISE[(self.index() + 3) % 4]
    }

    /// Slot this corner records while `driven` is held at its limit.
    ///
    /// `None` for the driven corner itself and for its diagonal partner.
    pub fn neighbor_slot(self, driven: Corner) -> Option<TravelSlot> {
        if driven == self.clockwise_next() {
            Some(TravelSlot::LeftNeighbor)
        } else if driven == self.counterclockwise_next() {
            Some(TravelSlot::RightNeighbor)
        } else {
            None
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            Corner::TopLeft => "↖",
            Corner::TopRight => "↗",
            Corner::BottomRight => "↘",
            Corner::BottomLeft => "↙",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Corner::TopLeft => "top-left",
            Corner::TopRight => "top-right",
            Corner::BottomRight => "bottom-right",
            Corner::BottomLeft => "bottom-left",
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rotation sense of the actuator reels the string in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winding {
    /// Reeling in increases the encoder angle
    Positive,
    /// Reeling in decreases the encoder angle
    Negative,
}

impl Winding {
    pub fn sign(self) -> i32 {
        match self {
            Winding::Positive => 1,
            Winding::Negative => -1,
        }
    }

    /// Signed actuator speed for a reel direction
    pub fn signed(self, reel: Reel, speed: u32) -> i32 {
        let speed = speed as i32 * self.sign();
        match reel {
            Reel::In => speed,
            Reel::Out => -speed,
        }
    }

    /// Bound reached with the least string out
    pub fn reel_in_bound(self) -> TravelSlot {
        match self {
            Winding::Positive => TravelSlot::Max,
            Winding::Negative => TravelSlot::Min,
        }
    }

    /// Bound reached with the most string out
    pub fn reel_out_bound(self) -> TravelSlot {
        match self {
            Winding::Positive => TravelSlot::Min,
            Winding::Negative => TravelSlot::Max,
        }
    }
}

pub struct Motor {
    handle: MotorHandle,
    travel: TravelProfile,
}

impl Motor {
    pub fn corner(&self) -> Corner {
        self.handle.corner()
    }

    pub fn winding(&self) -> Winding {
        self.handle.winding()
    }

    pub fn handle(&self) -> &MotorHandle {
        &self.handle
    }

    pub fn travel(&self) -> &TravelProfile {
        &self.travel
    }

    pub(crate) fn travel_mut(&mut self) -> &mut TravelProfile {
        &mut self.travel
    }

    pub(crate) fn record(&mut self, slot: TravelSlot, angle: i32) -> Result<(), RigError> {
        if !self.travel.record(slot, angle) {
            return Err(RigError::AlreadyRecorded {
                corner: self.corner(),
                slot,
            });
        }
        Ok(())
    }
}

/// Angles captured around the initial tensioning, clockwise order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationOrigin {
    /// Before tensioning
    pub initial: [i32; 4],
    /// Right after tensioning; the return point between corners
    pub tensioned: [i32; 4],
}

impl CalibrationOrigin {
    pub fn initial(&self, corner: Corner) -> i32 {
        self.initial[corner.index()]
    }

    pub fn tensioned(&self, corner: Corner) -> i32 {
        self.tensioned[corner.index()]
    }
}

pub struct Rig {
    motors: [Motor; 4],
    origin: Option<CalibrationOrigin>,
}

impl Rig {
    /// Build a rig from one actuator per corner, in any order
    pub fn new(
        actuators: impl IntoIterator<Item = (Corner, Winding, Arc<dyn Actuator>)>,
    ) -> Result<Self, RigError> {
        let mut slots: [Option<Motor>; 4] = Default::default();
        for (corner, winding, actuator) in actuators {
            let slot = &mut slots[corner.index()];
            if slot.is_some() {
                return Err(RigError::Config(format!("{} configured twice", corner)));
            }
            *slot = Some(Motor {
                handle: MotorHandle::new(corner, winding, actuator),
                travel: TravelProfile::default(),
            });
        }

        match slots {
            [Some(tl), Some(tr), Some(br), Some(bl)] => Ok(Self {
                motors: [tl, tr, br, bl],
                origin: None,
            }),
            _ => Err(RigError::Config(
                "every corner needs exactly one motor".to_string(),
            )),
        }
    }

    pub fn motor(&self, corner: Corner) -> &Motor {
        &self.motors[corner.index()]
    }

    pub(crate) fn motor_mut(&mut self, corner: Corner) -> &mut Motor {
        &mut self.motors[corner.index()]
    }

    /// Motors in clockwise order
    pub fn motors(&self) -> impl Iterator<Item = &Motor> {
        self.motors.iter()
    }

    pub fn handles(&self) -> Vec<MotorHandle> {
        self.motors.iter().map(|m| m.handle.clone()).collect()
    }

    pub fn origin(&self) -> Option<&CalibrationOrigin> {
        self.origin.as_ref()
    }

    pub(crate) fn set_origin(&mut self, origin: CalibrationOrigin) {
        self.origin = Some(origin);
    }

    /// True once every motor has a derived center
    pub fn is_calibrated(&self) -> bool {
        self.motors.iter().all(|m| m.travel.center().is_some())
    }

    /// Forget everything a previous pass measured
    pub fn reset_calibration(&mut self) {
        for motor in &mut self.motors {
            motor.travel.reset();
        }
        self.origin = None;
    }

    /// Present angle of every motor, clockwise order
    pub async fn angles(&self) -> Result<[i32; 4], RigError> {
        let mut angles = [0; 4];
        for motor in &self.motors {
            angles[motor.corner().index()] = motor.handle.angle().await?;
        }
        Ok(angles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagonals() {
        assert_eq!(Corner::TopLeft.diagonal(), Corner::BottomRight);
        assert_eq!(Corner::TopRight.diagonal(), Corner::BottomLeft);
        for corner in Corner::CLOCKWISE {
            assert_eq!(corner.diagonal().diagonal(), corner);
        }
    }

    #[test]
    fn test_neighbor_slots() {
        // top-right sees top-left counter-clockwise of it
        assert_eq!(
            Corner::TopRight.neighbor_slot(Corner::TopLeft),
            Some(TravelSlot::RightNeighbor)
        );
        assert_eq!(
            Corner::TopRight.neighbor_slot(Corner::BottomRight),
            Some(TravelSlot::LeftNeighbor)
        );
        assert_eq!(
            Corner::BottomLeft.neighbor_slot(Corner::TopLeft),
            Some(TravelSlot::LeftNeighbor)
        );
        assert_eq!(Corner::TopLeft.neighbor_slot(Corner::BottomRight), None);
        assert_eq!(Corner::TopLeft.neighbor_slot(Corner::TopLeft), None);
    }

    #[test]
    fn test_rotation_gives_each_motor_both_neighbors() {
        for partner in Corner::CLOCKWISE {
            let slots: Vec<_> = Corner::CALIBRATION_ROTATION
                .iter()
                .filter_map(|&driven| partner.neighbor_slot(driven))
                .collect();
            assert_eq!(slots.len(), 2);
            assert!(slots.contains(&TravelSlot::LeftNeighbor));
            assert!(slots.contains(&TravelSlot::RightNeighbor));
        }
    }

    #[test]
    fn test_winding_signs() {
        assert_eq!(Winding::Positive.signed(Reel::In, 300), 300);
        assert_eq!(Winding::Positive.signed(Reel::Out, 300), -300);
        assert_eq!(Winding::Negative.signed(Reel::In, 300), -300);
        assert_eq!(Winding::Negative.reel_in_bound(), TravelSlot::Min);
        assert_eq!(
            Winding::Negative.reel_out_bound(),
            Winding::Negative.reel_in_bound().opposite().unwrap()
        );
    }
}
