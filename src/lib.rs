//! Self-calibration engine for a four-motor cable rig.
//!
//! The rig starts with slack strings and unknown geometry. A calibration pass
//! tensions the array, drives every corner to its limit through stall
//! sensing, and derives a center angle per motor from the measured bounds.

pub mod actuator;
pub mod calibration;
pub mod combinator;
pub mod config;
pub mod error;
pub mod messages;
pub mod rig;
pub mod runtime;
pub mod status;
pub mod telemetry;

pub use error::RigError;
