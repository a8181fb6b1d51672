//! Keys identifying pieces of an [`XodrMap`] by index.
//!
//! The link validators report problems in terms of these keys; the
//! `describe` helpers turn a key back into a human readable location using
//! the map it refers to.

use serde::{Deserialize, Serialize};

use crate::lane_section::LaneSection;
use crate::map::XodrMap;
use crate::road_link::ContactPoint;

/// Identifies one of the two contact points of a road.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoadContactPointKey {
    pub road_idx: usize,
    pub contact_point: ContactPoint,
}

impl RoadContactPointKey {
    pub fn new(road_idx: usize, contact_point: ContactPoint) -> Self {
        RoadContactPointKey {
            road_idx,
            contact_point,
        }
    }

    pub fn describe(&self, map: &XodrMap) -> String {
        let road = &map.roads()[self.road_idx];
        format!("[road: {}, contact point: {}]", road.id(), self.contact_point.name())
    }
}

/// Identifies a lane section within a map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneSectionKey {
    pub road_idx: usize,
    pub lane_section_idx: usize,
}

impl LaneSectionKey {
    pub fn new(road_idx: usize, lane_section_idx: usize) -> Self {
        LaneSectionKey {
            road_idx,
            lane_section_idx,
        }
    }
}

/// The lane section a [`LaneSectionKey`] refers to.
pub fn lane_section_by_key(map: &XodrMap, key: LaneSectionKey) -> &LaneSection {
    &map.roads()[key.road_idx].lane_sections()[key.lane_section_idx]
}

/// Identifies a contact point of a lane section within a map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneSectionContactPointKey {
    pub road_idx: usize,
    pub lane_section_idx: usize,
    pub contact_point: ContactPoint,
}

impl LaneSectionContactPointKey {
    pub fn new(road_idx: usize, lane_section_idx: usize, contact_point: ContactPoint) -> Self {
        LaneSectionContactPointKey {
            road_idx,
            lane_section_idx,
            contact_point,
        }
    }

    pub fn from_section_key(section_key: LaneSectionKey, contact_point: ContactPoint) -> Self {
        Self::new(section_key.road_idx, section_key.lane_section_idx, contact_point)
    }

    pub fn lane_section_key(&self) -> LaneSectionKey {
        LaneSectionKey::new(self.road_idx, self.lane_section_idx)
    }

    pub fn describe(&self, map: &XodrMap) -> String {
        let road = &map.roads()[self.road_idx];
        format!(
            "[road: '{}', lane section: {}, contact point: {}]",
            road.id(),
            self.lane_section_idx,
            self.contact_point.name()
        )
    }
}

/// Identifies a lane within a map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneKey {
    pub road_idx: usize,
    pub lane_section_idx: usize,
    pub lane_idx: usize,
}

impl LaneKey {
    pub fn new(road_idx: usize, lane_section_idx: usize, lane_idx: usize) -> Self {
        LaneKey {
            road_idx,
            lane_section_idx,
            lane_idx,
        }
    }

    pub fn from_section_key(section_key: LaneSectionKey, lane_idx: usize) -> Self {
        Self::new(section_key.road_idx, section_key.lane_section_idx, lane_idx)
    }
}

/// Identifies a junction connection within a map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JunctionConnectionKey {
    pub junction_idx: usize,
    pub connection_idx: usize,
}

impl JunctionConnectionKey {
    pub fn new(junction_idx: usize, connection_idx: usize) -> Self {
        JunctionConnectionKey {
            junction_idx,
            connection_idx,
        }
    }
}

/// Identifies a lane link of a junction connection within a map.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JunctionLaneLinkKey {
    pub junction_idx: usize,
    pub connection_idx: usize,
    pub lane_link_idx: usize,
}

impl JunctionLaneLinkKey {
    pub fn new(junction_idx: usize, connection_idx: usize, lane_link_idx: usize) -> Self {
        JunctionLaneLinkKey {
            junction_idx,
            connection_idx,
            lane_link_idx,
        }
    }

    pub fn from_connection_key(connection_key: JunctionConnectionKey, lane_link_idx: usize) -> Self {
        Self::new(connection_key.junction_idx, connection_key.connection_idx, lane_link_idx)
    }
}
