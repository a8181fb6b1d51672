//! Structural validation of the link graph.
//!
//! Executed on demand after parsing (see [`XodrMap::validate_links`]), the
//! validator sweeps every road contact point and checks that the link graph
//! is symmetric and direction-consistent: every road link has a matching back
//! link (directly or through a junction connection), and every lane link has
//! a matching lane back link on the correct side of the target road.
//!
//! [`XodrMap::validate_links`]: crate::XodrMap::validate_links

mod junctions;
mod lane_links;
mod road_links;
mod road_width;

pub use self::junctions::validate_junction_membership;
pub(crate) use self::lane_links::validate_road_internal_lane_links;
pub use self::lane_links::validate_lane_links;
pub use self::road_links::{validate_incoming_connecting_link, validate_links, validate_road_road_link};
pub use self::road_width::{BoundaryDirection, RoadTooWideViolation, RoadWidthValidator};

use crate::lane_id::LaneId;
use crate::map::XodrMap;
use crate::map_keys::{LaneSectionContactPointKey, RoadContactPointKey};

/// An error found by link validation.
///
/// Road-level errors are phrased in terms of a contact point A which links
/// (directly or through a junction) to a contact point B; lane-level errors
/// in terms of the two lane section contact points the offending lane link
/// spans. All keys refer to the map the validator ran on;
/// [`description`](Self::description) renders them readable.
#[derive(Clone, Debug, PartialEq)]
pub enum LinkValidationError {
    /// A links to B, but B specifies no link back.
    RoadBackLinkNotSpecified {
        a_contact_point_key: RoadContactPointKey,
        b_contact_point_key: RoadContactPointKey,
        /// The junction carrying the connection from A to B, when they're
        /// connected through one.
        a_to_b_junction_idx: Option<usize>,
    },
    /// A links to B, but B links into a junction which has no connection
    /// back to A.
    RoadBackLinkNotSpecifiedInJunction {
        a_contact_point_key: RoadContactPointKey,
        b_contact_point_key: RoadContactPointKey,
        a_to_b_junction_idx: Option<usize>,
        /// The junction B links to, which was expected to connect back to A.
        back_link_junction_idx: usize,
    },
    /// A links to B, but B's back link targets some third contact point C.
    RoadLinkMisMatch {
        a_contact_point_key: RoadContactPointKey,
        b_contact_point_key: RoadContactPointKey,
        c_contact_point_key: RoadContactPointKey,
        a_to_b_junction_idx: Option<usize>,
    },
    /// A links directly to a road which belongs to a junction; such links
    /// must go through the junction's connections.
    DirectLinkToJunctionRoad {
        a_contact_point_key: RoadContactPointKey,
        b_contact_point_key: RoadContactPointKey,
    },
    /// A and B are connecting roads in two different junctions, and both
    /// junctions treat the shared contact point as the incoming one.
    InconsistentJunctionPathDirections {
        a_contact_point_key: RoadContactPointKey,
        b_contact_point_key: RoadContactPointKey,
        a_to_b_junction_idx: usize,
        b_to_a_junction_idx: usize,
    },
    /// Lane A links to lane B, but lane B specifies no link back.
    LaneBackLinkNotSpecified {
        a_section_contact_point_key: LaneSectionContactPointKey,
        b_section_contact_point_key: LaneSectionContactPointKey,
        a_lane_id: LaneId,
        b_lane_id: LaneId,
    },
    /// Lane A links to lane B, but lane B links back to some third lane C.
    LaneLinkMisMatch {
        a_section_contact_point_key: LaneSectionContactPointKey,
        b_section_contact_point_key: LaneSectionContactPointKey,
        a_lane_id: LaneId,
        b_lane_id: LaneId,
        c_lane_id: LaneId,
    },
    /// A non-center lane links to the center lane of the target section.
    LaneLinkToCenterLane {
        a_section_contact_point_key: LaneSectionContactPointKey,
        b_section_contact_point_key: LaneSectionContactPointKey,
        from_lane_id: LaneId,
    },
    /// A lane links to a lane id which doesn't exist in the target section.
    LaneLinkTargetOutOfRange {
        a_section_contact_point_key: LaneSectionContactPointKey,
        b_section_contact_point_key: LaneSectionContactPointKey,
        a_lane_id: LaneId,
        b_lane_id: LaneId,
    },
    /// Two linked lanes lie on sides which give them opposing driving
    /// directions.
    LaneLinkOpposingDirections {
        a_section_contact_point_key: LaneSectionContactPointKey,
        b_section_contact_point_key: LaneSectionContactPointKey,
        a_lane_id: LaneId,
        b_lane_id: LaneId,
    },
}

impl LinkValidationError {
    /// A human readable description of this error, in terms of the map it
    /// was found in.
    pub fn description(&self, map: &XodrMap) -> String {
        match self {
            LinkValidationError::RoadBackLinkNotSpecified {
                a_contact_point_key,
                b_contact_point_key,
                a_to_b_junction_idx,
            } => {
                let a = a_contact_point_key.describe(map);
                let b = b_contact_point_key.describe(map);
                match a_to_b_junction_idx {
                    None => format!(
                        "Road links aren't symmetric: {} is connected to {}, but no link from {} to {} is \
                         specified.",
                        a, b, b, a
                    ),
                    Some(junction_idx) => format!(
                        "Road links aren't symmetric: {} is connected to {} (through junction {}), but no \
                         link from {} to {} is specified.",
                        a,
                        b,
                        map.junctions()[*junction_idx].id(),
                        b,
                        a
                    ),
                }
            }
            LinkValidationError::RoadBackLinkNotSpecifiedInJunction {
                a_contact_point_key,
                b_contact_point_key,
                a_to_b_junction_idx,
                back_link_junction_idx,
            } => {
                let a = a_contact_point_key.describe(map);
                let b = b_contact_point_key.describe(map);
                let back_junction = map.junctions()[*back_link_junction_idx].id();
                match a_to_b_junction_idx {
                    None => format!(
                        "Road links aren't symmetric: {} is connected to {}, but {} links to junction {}, \
                         which doesn't contain a connection back to {}.",
                        a, b, b, back_junction, a
                    ),
                    Some(junction_idx) => format!(
                        "Road links aren't symmetric: {} is connected to {} (through junction {}), but {} \
                         links to junction {}, which doesn't contain a connection back to {}.",
                        a,
                        b,
                        map.junctions()[*junction_idx].id(),
                        b,
                        back_junction,
                        a
                    ),
                }
            }
            LinkValidationError::RoadLinkMisMatch {
                a_contact_point_key,
                b_contact_point_key,
                c_contact_point_key,
                a_to_b_junction_idx,
            } => {
                let a = a_contact_point_key.describe(map);
                let b = b_contact_point_key.describe(map);
                let c = c_contact_point_key.describe(map);
                match a_to_b_junction_idx {
                    None => format!(
                        "Road links aren't symmetric: {} is connected to {}, but {} links to {}.",
                        a, b, b, c
                    ),
                    Some(junction_idx) => format!(
                        "Road links aren't symmetric: {} is connected to {} (through junction {}), but {} \
                         links to {}.",
                        a,
                        b,
                        map.junctions()[*junction_idx].id(),
                        b,
                        c
                    ),
                }
            }
            LinkValidationError::DirectLinkToJunctionRoad {
                a_contact_point_key,
                b_contact_point_key,
            } => {
                let b_road = &map.roads()[b_contact_point_key.road_idx];
                format!(
                    "Road {} is part of a junction, so {} shouldn't link directly to {}.",
                    b_road.id(),
                    a_contact_point_key.describe(map),
                    b_contact_point_key.describe(map)
                )
            }
            LinkValidationError::InconsistentJunctionPathDirections {
                a_contact_point_key,
                b_contact_point_key,
                a_to_b_junction_idx,
                b_to_a_junction_idx,
            } => {
                let a = a_contact_point_key.describe(map);
                let b = b_contact_point_key.describe(map);
                format!(
                    "Inconsistent direction of adjacent junction paths: The connection from {} to {} in \
                     junction {} is incoming, so the connection from {} to {} in junction {} should be \
                     outgoing.",
                    a,
                    b,
                    map.junctions()[*a_to_b_junction_idx].id(),
                    b,
                    a,
                    map.junctions()[*b_to_a_junction_idx].id()
                )
            }
            LinkValidationError::LaneBackLinkNotSpecified {
                a_section_contact_point_key,
                b_section_contact_point_key,
                a_lane_id,
                b_lane_id,
            } => format!(
                "Lane links aren't symmetric between A = {} and B = {}: Lane {} in section A links to lane \
                 {} in section B, but lane {} in section B doesn't link back to a lane in section A.",
                a_section_contact_point_key.describe(map),
                b_section_contact_point_key.describe(map),
                a_lane_id,
                b_lane_id,
                b_lane_id
            ),
            LinkValidationError::LaneLinkMisMatch {
                a_section_contact_point_key,
                b_section_contact_point_key,
                a_lane_id,
                b_lane_id,
                c_lane_id,
            } => format!(
                "Lane links aren't symmetric between A = {} and B = {}: Lane {} in section A links to lane \
                 {} in section B, but lane {} in section B links to lane {} in section A.",
                a_section_contact_point_key.describe(map),
                b_section_contact_point_key.describe(map),
                a_lane_id,
                b_lane_id,
                b_lane_id,
                c_lane_id
            ),
            LinkValidationError::LaneLinkToCenterLane { from_lane_id, .. } => {
                format!("Non-center lane {} shouldn't link to a center lane.", from_lane_id)
            }
            LinkValidationError::LaneLinkTargetOutOfRange {
                a_section_contact_point_key,
                b_section_contact_point_key,
                a_lane_id,
                b_lane_id,
            } => format!(
                "Lane link out of range between A = {} and B = {}: Lane {} in section A tried to link to \
                 lane {} in section B, but this lane doesn't exist in section B.",
                a_section_contact_point_key.describe(map),
                b_section_contact_point_key.describe(map),
                a_lane_id,
                b_lane_id
            ),
            LinkValidationError::LaneLinkOpposingDirections {
                a_section_contact_point_key,
                b_section_contact_point_key,
                a_lane_id,
                b_lane_id,
            } => format!(
                "Lane {} in {} links to lane {} in {}, which is of opposing driving direction.",
                a_lane_id,
                a_section_contact_point_key.describe(map),
                b_lane_id,
                b_section_contact_point_key.describe(map)
            ),
        }
    }
}
