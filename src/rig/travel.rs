// Per-motor travel profile accumulated during a calibration pass

use std::fmt;

/// A measured field of a travel profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelSlot {
    Min,
    Max,
    LeftNeighbor,
    RightNeighbor,
}

impl TravelSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            TravelSlot::Min => "min",
            TravelSlot::Max => "max",
            TravelSlot::LeftNeighbor => "left_neighbor",
            TravelSlot::RightNeighbor => "right_neighbor",
        }
    }

    /// The other end of the travel range (neighbors have none)
    pub fn opposite(self) -> Option<TravelSlot> {
        match self {
            TravelSlot::Min => Some(TravelSlot::Max),
            TravelSlot::Max => Some(TravelSlot::Min),
            _ => None,
        }
    }
}

impl fmt::Display for TravelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Absolute encoder bounds of one motor.
///
/// Every measured field is written at most once per pass; `center` can only
/// be derived from `min`/`max` by the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TravelProfile {
    min: Option<i32>,
    max: Option<i32>,
    center: Option<i32>,
    left_neighbor: Option<i32>,
    right_neighbor: Option<i32>,
}

impl TravelProfile {
    pub fn min(&self) -> Option<i32> {
        self.min
    }

    pub fn max(&self) -> Option<i32> {
        self.max
    }

    pub fn center(&self) -> Option<i32> {
        self.center
    }

    pub fn left_neighbor(&self) -> Option<i32> {
        self.left_neighbor
    }

    pub fn right_neighbor(&self) -> Option<i32> {
        self.right_neighbor
    }

    pub fn get(&self, slot: TravelSlot) -> Option<i32> {
        match slot {
            TravelSlot::Min => self.min,
            TravelSlot::Max => self.max,
            TravelSlot::LeftNeighbor => self.left_neighbor,
            TravelSlot::RightNeighbor => self.right_neighbor,
        }
    }

    /// Returns `false` and leaves the profile untouched if `slot` is already set
    pub(crate) fn record(&mut self, slot: TravelSlot, angle: i32) -> bool {
        let field = match slot {
            TravelSlot::Min => &mut self.min,
            TravelSlot::Max => &mut self.max,
            TravelSlot::LeftNeighbor => &mut self.left_neighbor,
            TravelSlot::RightNeighbor => &mut self.right_neighbor,
        };
        if field.is_some() {
            return false;
        }
        *field = Some(angle);
        true
    }

    /// `(min, max)`, or the first bound still missing
    pub fn bounds(&self) -> Result<(i32, i32), TravelSlot> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Ok((min, max)),
            (None, _) => Err(TravelSlot::Min),
            (_, None) => Err(TravelSlot::Max),
        }
    }

    pub(crate) fn set_center(&mut self, center: i32) {
        self.center = Some(center);
    }

    /// Neighbor bounds that fall outside `[min, max]`
    pub fn stray_neighbors(&self) -> Vec<(TravelSlot, i32)> {
        let Ok((min, max)) = self.bounds() else {
            return Vec::new();
        };
        [TravelSlot::LeftNeighbor, TravelSlot::RightNeighbor]
            .into_iter()
            .filter_map(|slot| self.get(slot).map(|angle| (slot, angle)))
            .filter(|&(_, angle)| angle < min || angle > max)
            .collect()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_are_write_once() {
        let mut travel = TravelProfile::default();
        assert!(travel.record(TravelSlot::Min, -40));
        assert!(!travel.record(TravelSlot::Min, 12));
        assert_eq!(travel.min(), Some(-40));
    }

    #[test]
    fn test_bounds_report_missing_slot() {
        let mut travel = TravelProfile::default();
        assert_eq!(travel.bounds(), Err(TravelSlot::Min));
        travel.record(TravelSlot::Min, 0);
        assert_eq!(travel.bounds(), Err(TravelSlot::Max));
        travel.record(TravelSlot::Max, 90);
        assert_eq!(travel.bounds(), Ok((0, 90)));
    }

    #[test]
    fn test_stray_neighbors() {
        let mut travel = TravelProfile::default();
        travel.record(TravelSlot::Min, -100);
        travel.record(TravelSlot::Max, 100);
        travel.record(TravelSlot::LeftNeighbor, 20);
        travel.record(TravelSlot::RightNeighbor, 140);
        assert_eq!(travel.stray_neighbors(), vec![(TravelSlot::RightNeighbor, 140)]);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut travel = TravelProfile::default();
        travel.record(TravelSlot::Max, 5);
        travel.set_center(3);
        travel.reset();
        assert_eq!(travel, TravelProfile::default());
    }
}
