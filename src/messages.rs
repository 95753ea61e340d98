// Status messages published by the runtime

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rig::Corner;

/// Travel state of one motor at a milestone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotorStatus {
    pub corner: Corner,
    pub angle: i32,
    pub min: Option<i32>,
    pub max: Option<i32>,
    pub center: Option<i32>,
    pub left_neighbor: Option<i32>,
    pub right_neighbor: Option<i32>,
    pub initial: Option<i32>,
    pub tensioned: Option<i32>,
}

/// Snapshot of the whole rig after a calibration milestone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelReport {
    pub milestone: String,
    pub motors: Vec<MotorStatus>,
}

fn field(value: Option<i32>) -> String {
    value.map_or_else(|| "unset".to_string(), |v| v.to_string())
}

// Human-readable dump, one block per corner
impl fmt::Display for TravelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] ---------------------------------", self.milestone)?;
        for motor in &self.motors {
            writeln!(f, "{} {}", motor.corner.arrow(), motor.corner)?;
            writeln!(f, "  > angle: {}", motor.angle)?;
            writeln!(f, "  - min: {}", field(motor.min))?;
            writeln!(f, "  - max: {}", field(motor.max))?;
            writeln!(f, "  - center: {}", field(motor.center))?;
            writeln!(f, "  - left_neighbor: {}", field(motor.left_neighbor))?;
            writeln!(f, "  - right_neighbor: {}", field(motor.right_neighbor))?;
            writeln!(f, "  - initial: {}", field(motor.initial))?;
            writeln!(f, "  - tensioned: {}", field(motor.tensioned))?;
        }
        write!(f, "------------------------------------------------------")
    }
}

/// Calibration health published by the runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RigHealth {
    Idle,
    Calibrating,
    Calibrated,
    Fault,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&RigHealth::Calibrating).unwrap(), "\"calibrating\"");
    }

    #[test]
    fn test_dump_marks_unset_fields() {
        let report = TravelReport {
            milestone: "Tensioned".to_string(),
            motors: vec![MotorStatus {
                corner: Corner::TopLeft,
                angle: 42,
                min: Some(-10),
                max: None,
                center: None,
                left_neighbor: None,
                right_neighbor: None,
                initial: Some(0),
                tensioned: Some(42),
            }],
        };
        let text = report.to_string();
        assert!(text.starts_with("[Tensioned]"));
        assert!(text.contains("↖ top-left"));
        assert!(text.contains("  - min: -10"));
        assert!(text.contains("  - max: unset"));
    }

    #[test]
    fn test_report_json_round_trip_fields() {
        let status = MotorStatus {
            corner: Corner::BottomLeft,
            angle: 1,
            min: None,
            max: None,
            center: None,
            left_neighbor: None,
            right_neighbor: None,
            initial: None,
            tensioned: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["corner"], "bottom_left");
        assert!(json["min"].is_null());
    }
}
