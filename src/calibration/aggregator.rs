// Range aggregation: centers from calibrated bounds

use tracing::{info, warn};

use crate::error::RigError;
use crate::rig::{Corner, Rig};

/// `min + (max - min) / 2`, truncating toward zero.
///
/// With `min < max` this is the lower middle angle when the span is odd.
pub fn midpoint(min: i32, max: i32) -> i32 {
    (min as i64 + (max as i64 - min as i64) / 2) as i32
}

/// Centers for every motor (clockwise), without touching the rig
pub fn centers(rig: &Rig) -> Result<[i32; 4], RigError> {
    let mut centers = [0; 4];
    for motor in rig.motors() {
        let corner = motor.corner();
        let (min, max) = motor
            .travel()
            .bounds()
            .map_err(|slot| RigError::NotCalibrated {
                corner,
                missing: slot.as_str(),
            })?;
        if min >= max {
            return Err(RigError::InvalidRange { corner, min, max });
        }
        centers[corner.index()] = midpoint(min, max);
    }
    Ok(centers)
}

/// Derive and store every center. Nothing is written unless all four
/// motors have valid bounds. Safe to call repeatedly.
pub fn aggregate(rig: &mut Rig) -> Result<[i32; 4], RigError> {
    let centers = centers(rig)?;

    for corner in Corner::CLOCKWISE {
        let motor = rig.motor_mut(corner);
        motor.travel_mut().set_center(centers[corner.index()]);

        // frame is not square or a string slipped
        for (slot, angle) in motor.travel().stray_neighbors() {
            warn!(
                "{}: {} {} lies outside [{:?}, {:?}]",
                corner,
                slot,
                angle,
                motor.travel().min(),
                motor.travel().max()
            );
        }
    }

    info!("Travel centers {:?}", centers);
    Ok(centers)
}
