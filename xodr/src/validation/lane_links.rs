use crate::junction::Connection;
use crate::lane_id::LaneId;
use crate::lane_section::LaneSection;
use crate::map::XodrMap;
use crate::map_keys::{
    lane_section_by_key, JunctionConnectionKey, LaneSectionContactPointKey, RoadContactPointKey,
};

use super::LinkValidationError;

/// Checks that a lane link's target id is usable: not the center lane, on
/// the side matching the two roads' relative direction, and within the
/// target section's lane id range.
///
/// `roads_opposing_directions` is true when the two contact points share a
/// role (start↔start or end↔end): lanes of roads linked head-to-head or
/// tail-to-tail must lie on opposite sides of their reference lines, lanes
/// of same-direction roads on the same side.
fn validate_lane_link_in_range(
    a_section_contact_point_key: LaneSectionContactPointKey,
    b_section_contact_point_key: LaneSectionContactPointKey,
    from_lane_id: LaneId,
    to_lane_id: LaneId,
    roads_opposing_directions: bool,
    to_lane_ids_min: LaneId,
    to_lane_ids_max: LaneId,
    errors: &mut Vec<LinkValidationError>,
) -> bool {
    if to_lane_id == LaneId(0) {
        errors.push(LinkValidationError::LaneLinkToCenterLane {
            a_section_contact_point_key,
            b_section_contact_point_key,
            from_lane_id,
        });
        return false;
    }

    if from_lane_id.same_side(to_lane_id) == roads_opposing_directions {
        errors.push(LinkValidationError::LaneLinkOpposingDirections {
            a_section_contact_point_key,
            b_section_contact_point_key,
            a_lane_id: from_lane_id,
            b_lane_id: to_lane_id,
        });
        return false;
    }

    if to_lane_id < to_lane_ids_min || to_lane_id > to_lane_ids_max {
        errors.push(LinkValidationError::LaneLinkTargetOutOfRange {
            a_section_contact_point_key,
            b_section_contact_point_key,
            a_lane_id: from_lane_id,
            b_lane_id: to_lane_id,
        });
        return false;
    }

    true
}

fn road_to_lane_section_contact_point_key(
    map: &XodrMap,
    road_contact_point_key: RoadContactPointKey,
) -> LaneSectionContactPointKey {
    let road = &map.roads()[road_contact_point_key.road_idx];
    let lane_section_idx = road.lane_section_index_for_contact_point(road_contact_point_key.contact_point);
    LaneSectionContactPointKey::new(
        road_contact_point_key.road_idx,
        lane_section_idx,
        road_contact_point_key.contact_point,
    )
}

/// Validates the lane links from the 'from' road's contact-point section to
/// the 'to' road's, for two roads connected by a direct road link.
pub(crate) fn validate_road_road_lane_links(
    map: &XodrMap,
    from_contact_point_key: RoadContactPointKey,
    to_contact_point_key: RoadContactPointKey,
    errors: &mut Vec<LinkValidationError>,
) -> bool {
    let from_section_key = road_to_lane_section_contact_point_key(map, from_contact_point_key);
    let to_section_key = road_to_lane_section_contact_point_key(map, to_contact_point_key);

    let from_section = lane_section_by_key(map, from_section_key.lane_section_key());
    let to_section = lane_section_by_key(map, to_section_key.lane_section_key());

    validate_lane_links(from_section, to_section, from_section_key, to_section_key, errors)
}

/// Validates the lane links between the sections at `from_section_key` and
/// `to_section_key`, in the from→to direction:
///
/// - links must target valid, non-center lanes on the correct side,
/// - the targeted lane must link back to the originating lane.
///
/// Fully validating a section pair takes one call per direction.
pub fn validate_lane_links(
    from_section: &LaneSection,
    to_section: &LaneSection,
    from_section_contact_point_key: LaneSectionContactPointKey,
    to_section_contact_point_key: LaneSectionContactPointKey,
    errors: &mut Vec<LinkValidationError>,
) -> bool {
    let mut success = true;

    let to_lane_ids_min = LaneId(-(to_section.num_right_lanes() as i32));
    let to_lane_ids_max = LaneId(to_section.num_left_lanes() as i32);

    // The roads are of opposing direction if the link joins two starts or
    // two ends; otherwise they run the same way.
    let roads_opposing_directions =
        from_section_contact_point_key.contact_point == to_section_contact_point_key.contact_point;

    let link_type = from_section_contact_point_key.contact_point.link_type();
    let back_link_type = to_section_contact_point_key.contact_point.link_type();

    for (i, from_lane) in from_section.lanes().iter().enumerate() {
        let to_lane_id = match from_lane.link(link_type) {
            Some(to_lane_id) => to_lane_id,
            None => continue,
        };
        let from_lane_id = from_section.lane_index_to_id(i);

        if !validate_lane_link_in_range(
            from_section_contact_point_key,
            to_section_contact_point_key,
            from_lane_id,
            to_lane_id,
            roads_opposing_directions,
            to_lane_ids_min,
            to_lane_ids_max,
            errors,
        ) {
            success = false;
            continue;
        }

        let b_lane = to_section.lane_by_id(to_lane_id);
        match b_lane.link(back_link_type) {
            Some(back_link_id) => {
                if back_link_id != from_lane_id {
                    errors.push(LinkValidationError::LaneLinkMisMatch {
                        a_section_contact_point_key: from_section_contact_point_key,
                        b_section_contact_point_key: to_section_contact_point_key,
                        a_lane_id: from_lane_id,
                        b_lane_id: to_lane_id,
                        c_lane_id: back_link_id,
                    });
                    success = false;
                }
            }
            None => {
                errors.push(LinkValidationError::LaneBackLinkNotSpecified {
                    a_section_contact_point_key: from_section_contact_point_key,
                    b_section_contact_point_key: to_section_contact_point_key,
                    a_lane_id: from_lane_id,
                    b_lane_id: to_lane_id,
                });
                success = false;
            }
        }
    }

    success
}

/// Validates lane links from a connecting road back to its incoming road.
/// The back links live in the junction connection's lane-link list, not in
/// the incoming road's lanes.
pub(crate) fn validate_connecting_incoming_lane_links(
    map: &XodrMap,
    from_contact_point_key: RoadContactPointKey,
    to_contact_point_key: RoadContactPointKey,
    back_link_connection: &Connection,
    errors: &mut Vec<LinkValidationError>,
) -> bool {
    let mut success = true;

    let from_section_key = road_to_lane_section_contact_point_key(map, from_contact_point_key);
    let to_section_key = road_to_lane_section_contact_point_key(map, to_contact_point_key);

    let from_section = lane_section_by_key(map, from_section_key.lane_section_key());
    let to_section = lane_section_by_key(map, to_section_key.lane_section_key());

    let to_lane_ids_min = LaneId(-(to_section.num_right_lanes() as i32));
    let to_lane_ids_max = LaneId(to_section.num_left_lanes() as i32);

    let link_type = from_contact_point_key.contact_point.link_type();
    let roads_opposing_directions = from_contact_point_key.contact_point == to_contact_point_key.contact_point;

    for (i, from_lane) in from_section.lanes().iter().enumerate() {
        let to_lane_id = match from_lane.link(link_type) {
            Some(to_lane_id) => to_lane_id,
            None => continue,
        };
        let from_lane_id = from_section.lane_index_to_id(i);

        if !validate_lane_link_in_range(
            from_section_key,
            to_section_key,
            from_lane_id,
            to_lane_id,
            roads_opposing_directions,
            to_lane_ids_min,
            to_lane_ids_max,
            errors,
        ) {
            success = false;
            continue;
        }

        match back_link_connection.find_lane_link_target(to_lane_id) {
            Some(back_link_id) => {
                if back_link_id != from_lane_id {
                    errors.push(LinkValidationError::LaneLinkMisMatch {
                        a_section_contact_point_key: from_section_key,
                        b_section_contact_point_key: to_section_key,
                        a_lane_id: from_lane_id,
                        b_lane_id: to_lane_id,
                        c_lane_id: back_link_id,
                    });
                    success = false;
                }
            }
            None => {
                errors.push(LinkValidationError::LaneBackLinkNotSpecified {
                    a_section_contact_point_key: from_section_key,
                    b_section_contact_point_key: to_section_key,
                    a_lane_id: from_lane_id,
                    b_lane_id: to_lane_id,
                });
                success = false;
            }
        }
    }

    success
}

/// Validates lane links from a connecting road to its outgoing road. There
/// is no back-link structure to check in this direction, only the links'
/// own validity.
pub(crate) fn validate_connecting_outgoing_lane_links(
    map: &XodrMap,
    from_contact_point_key: RoadContactPointKey,
    to_contact_point_key: RoadContactPointKey,
    errors: &mut Vec<LinkValidationError>,
) -> bool {
    let mut success = true;

    let from_section_key = road_to_lane_section_contact_point_key(map, from_contact_point_key);
    let to_section_key = road_to_lane_section_contact_point_key(map, to_contact_point_key);

    let from_section = lane_section_by_key(map, from_section_key.lane_section_key());
    let to_section = lane_section_by_key(map, to_section_key.lane_section_key());

    let to_lane_ids_min = LaneId(-(to_section.num_right_lanes() as i32));
    let to_lane_ids_max = LaneId(to_section.num_left_lanes() as i32);

    let link_type = from_contact_point_key.contact_point.link_type();
    let roads_opposing_directions = from_contact_point_key.contact_point == to_contact_point_key.contact_point;

    for (i, from_lane) in from_section.lanes().iter().enumerate() {
        let to_lane_id = match from_lane.link(link_type) {
            Some(to_lane_id) => to_lane_id,
            None => continue,
        };
        let from_lane_id = from_section.lane_index_to_id(i);

        success &= validate_lane_link_in_range(
            from_section_key,
            to_section_key,
            from_lane_id,
            to_lane_id,
            roads_opposing_directions,
            to_lane_ids_min,
            to_lane_ids_max,
            errors,
        );
    }

    success
}

/// Validates the lane links of a junction connection from the incoming road
/// to the connecting road: each entry of the connection's lane-link list
/// must reference valid lanes on both sides, and the connecting road's lane
/// must link back to the incoming lane.
pub(crate) fn validate_incoming_connecting_lane_links(
    map: &XodrMap,
    from_contact_point_key: RoadContactPointKey,
    to_contact_point_key: RoadContactPointKey,
    connection_key: JunctionConnectionKey,
    errors: &mut Vec<LinkValidationError>,
) -> bool {
    let mut success = true;

    let from_section_key = road_to_lane_section_contact_point_key(map, from_contact_point_key);
    let to_section_key = road_to_lane_section_contact_point_key(map, to_contact_point_key);

    let from_section = lane_section_by_key(map, from_section_key.lane_section_key());
    let to_section = lane_section_by_key(map, to_section_key.lane_section_key());

    let connection = &map.junctions()[connection_key.junction_idx].connections()[connection_key.connection_idx];

    let from_lane_ids_min = LaneId(-(from_section.num_right_lanes() as i32));
    let from_lane_ids_max = LaneId(from_section.num_left_lanes() as i32);

    let to_lane_ids_min = LaneId(-(to_section.num_right_lanes() as i32));
    let to_lane_ids_max = LaneId(to_section.num_left_lanes() as i32);

    let back_link_type = to_contact_point_key.contact_point.link_type();
    let roads_opposing_directions = from_contact_point_key.contact_point == to_contact_point_key.contact_point;

    for lane_link in connection.lane_links() {
        let from_lane_id = lane_link.from();
        let to_lane_id = lane_link.to();

        let mut cur_success = true;

        if from_lane_id != LaneId(0) && to_lane_id == LaneId(0) {
            errors.push(LinkValidationError::LaneLinkToCenterLane {
                a_section_contact_point_key: from_section_key,
                b_section_contact_point_key: to_section_key,
                from_lane_id,
            });
            cur_success = false;
        } else if from_lane_id == LaneId(0) && to_lane_id != LaneId(0) {
            errors.push(LinkValidationError::LaneLinkToCenterLane {
                a_section_contact_point_key: to_section_key,
                b_section_contact_point_key: from_section_key,
                from_lane_id: to_lane_id,
            });
            cur_success = false;
        }

        if to_lane_id < to_lane_ids_min || to_lane_id > to_lane_ids_max {
            errors.push(LinkValidationError::LaneLinkTargetOutOfRange {
                a_section_contact_point_key: from_section_key,
                b_section_contact_point_key: to_section_key,
                a_lane_id: from_lane_id,
                b_lane_id: to_lane_id,
            });
            cur_success = false;
        }

        if from_lane_id < from_lane_ids_min || from_lane_id > from_lane_ids_max {
            errors.push(LinkValidationError::LaneLinkTargetOutOfRange {
                a_section_contact_point_key: to_section_key,
                b_section_contact_point_key: from_section_key,
                a_lane_id: to_lane_id,
                b_lane_id: from_lane_id,
            });
            cur_success = false;
        }

        if !cur_success {
            success = false;
            continue;
        }

        if from_lane_id == LaneId(0) || to_lane_id == LaneId(0) {
            continue;
        }

        // Same-direction roads link lanes on the same side of their
        // reference lines; opposing-direction roads on opposite sides.
        if from_lane_id.same_side(to_lane_id) == roads_opposing_directions {
            errors.push(LinkValidationError::LaneLinkOpposingDirections {
                a_section_contact_point_key: from_section_key,
                b_section_contact_point_key: to_section_key,
                a_lane_id: from_lane_id,
                b_lane_id: to_lane_id,
            });
            success = false;
            continue;
        }

        let b_lane = to_section.lane_by_id(to_lane_id);
        match b_lane.link(back_link_type) {
            Some(back_link_id) => {
                if back_link_id != from_lane_id {
                    errors.push(LinkValidationError::LaneLinkMisMatch {
                        a_section_contact_point_key: from_section_key,
                        b_section_contact_point_key: to_section_key,
                        a_lane_id: from_lane_id,
                        b_lane_id: to_lane_id,
                        c_lane_id: back_link_id,
                    });
                    success = false;
                }
            }
            None => {
                errors.push(LinkValidationError::LaneBackLinkNotSpecified {
                    a_section_contact_point_key: from_section_key,
                    b_section_contact_point_key: to_section_key,
                    a_lane_id: from_lane_id,
                    b_lane_id: to_lane_id,
                });
                success = false;
            }
        }
    }

    success
}

/// Validates the lane links of a junction connection when both roads are
/// connecting roads of (different) junctions. Only the links' own validity
/// can be checked; the back links belong to the other junction.
pub(crate) fn validate_connecting_connecting_lane_links(
    map: &XodrMap,
    from_contact_point_key: RoadContactPointKey,
    to_contact_point_key: RoadContactPointKey,
    link_connection: &Connection,
    errors: &mut Vec<LinkValidationError>,
) -> bool {
    let mut success = true;

    let from_section_key = road_to_lane_section_contact_point_key(map, from_contact_point_key);
    let to_section_key = road_to_lane_section_contact_point_key(map, to_contact_point_key);

    let from_section = lane_section_by_key(map, from_section_key.lane_section_key());
    let to_section = lane_section_by_key(map, to_section_key.lane_section_key());

    let from_lane_ids_min = LaneId(-(from_section.num_right_lanes() as i32));
    let from_lane_ids_max = LaneId(from_section.num_left_lanes() as i32);

    let to_lane_ids_min = LaneId(-(to_section.num_right_lanes() as i32));
    let to_lane_ids_max = LaneId(to_section.num_left_lanes() as i32);

    for lane_link in link_connection.lane_links() {
        let from_lane_id = lane_link.from();
        let to_lane_id = lane_link.to();

        if from_lane_id != LaneId(0) && to_lane_id == LaneId(0) {
            errors.push(LinkValidationError::LaneLinkToCenterLane {
                a_section_contact_point_key: from_section_key,
                b_section_contact_point_key: to_section_key,
                from_lane_id,
            });
            success = false;
        } else if from_lane_id == LaneId(0) && to_lane_id != LaneId(0) {
            errors.push(LinkValidationError::LaneLinkToCenterLane {
                a_section_contact_point_key: to_section_key,
                b_section_contact_point_key: from_section_key,
                from_lane_id: to_lane_id,
            });
            success = false;
        }

        if from_lane_id < from_lane_ids_min || from_lane_id > from_lane_ids_max {
            errors.push(LinkValidationError::LaneLinkTargetOutOfRange {
                a_section_contact_point_key: to_section_key,
                b_section_contact_point_key: from_section_key,
                a_lane_id: to_lane_id,
                b_lane_id: from_lane_id,
            });
            success = false;
        }

        if to_lane_id < to_lane_ids_min || to_lane_id > to_lane_ids_max {
            errors.push(LinkValidationError::LaneLinkTargetOutOfRange {
                a_section_contact_point_key: from_section_key,
                b_section_contact_point_key: to_section_key,
                a_lane_id: from_lane_id,
                b_lane_id: to_lane_id,
            });
            success = false;
        }
    }

    success
}

/// Validates the internal lane links of a road: the links between each
/// adjacent pair of lane sections, checked in both directions.
pub(crate) fn validate_road_internal_lane_links(
    map: &XodrMap,
    road_idx: usize,
    errors: &mut Vec<LinkValidationError>,
) -> bool {
    let mut success = true;

    let lane_sections = map.roads()[road_idx].lane_sections();
    for i in 0..lane_sections.len().saturating_sub(1) {
        let key1 = LaneSectionContactPointKey::new(road_idx, i, crate::road_link::ContactPoint::End);
        let key2 = LaneSectionContactPointKey::new(road_idx, i + 1, crate::road_link::ContactPoint::Start);
        success &= validate_lane_links(&lane_sections[i], &lane_sections[i + 1], key1, key2, errors);
        success &= validate_lane_links(&lane_sections[i + 1], &lane_sections[i], key2, key1, errors);
    }

    success
}
