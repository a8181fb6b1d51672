use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::xml::FromXmlAttribute;

/// A lane identifier.
///
/// Lane ids follow the OpenDRIVE convention: the lane immediately left of the
/// reference line has id 1, further left lanes count up; the lane immediately
/// right has id -1, further right lanes count down. Id 0 is reserved for the
/// center lane.
///
/// Lane ids and lane *indices* (positions in a [`LaneSection`]'s lane vector)
/// are both integers and easy to mix up, so ids get their own type. Nullable
/// lane references (a lane's predecessor/successor link, a junction lane-link
/// lookup) are `Option<LaneId>`.
///
/// [`LaneSection`]: crate::LaneSection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LaneId(pub i32);

impl LaneId {
    /// Whether this lane and `other` lie on the same side of their
    /// respective reference lines. Neither may be the center lane.
    pub fn same_side(self, other: LaneId) -> bool {
        debug_assert!(self.0 != 0 && other.0 != 0);
        (self.0 ^ other.0) >= 0
    }

    pub fn is_center(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LaneId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(LaneId(
            s.trim().parse().map_err(|_| anyhow!("not a lane id: '{}'", s))?,
        ))
    }
}

impl FromXmlAttribute for LaneId {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_round_trip() {
        for id in [-3, -1, 1, 2, 12] {
            let lane_id = LaneId(id);
            assert_eq!(lane_id.to_string().parse::<LaneId>().unwrap(), lane_id);
        }
    }

    #[test]
    fn same_side_uses_signs() {
        assert!(LaneId(1).same_side(LaneId(3)));
        assert!(LaneId(-2).same_side(LaneId(-1)));
        assert!(!LaneId(1).same_side(LaneId(-1)));
        assert!(!LaneId(-3).same_side(LaneId(2)));
    }

    #[test]
    fn rejects_garbage() {
        assert!("x1".parse::<LaneId>().is_err());
        assert!("".parse::<LaneId>().is_err());
    }
}
