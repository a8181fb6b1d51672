use crate::map::XodrMap;
use crate::map_keys::{JunctionConnectionKey, RoadContactPointKey};
use crate::road_link::{ContactPoint, RoadLink};

use super::lane_links::{
    validate_connecting_connecting_lane_links, validate_connecting_incoming_lane_links,
    validate_connecting_outgoing_lane_links, validate_incoming_connecting_lane_links, validate_road_road_lane_links,
};
use super::{validate_road_internal_lane_links, LinkValidationError};

/// Validates all links (road links and lane links) in the given map.
///
/// Returns true if validation succeeded. Errors are appended to `errors`.
pub fn validate_links(map: &XodrMap, errors: &mut Vec<LinkValidationError>) -> bool {
    let mut success = true;

    for road_idx in 0..map.roads().len() {
        success &= validate_road_internal_lane_links(map, road_idx, errors);
        success &= validate_links_iteration(map, RoadContactPointKey::new(road_idx, ContactPoint::Start), errors);
        success &= validate_links_iteration(map, RoadContactPointKey::new(road_idx, ContactPoint::End), errors);
    }

    success
}

/// Validates the road and lane links originating from a single road contact
/// point.
fn validate_links_iteration(
    map: &XodrMap,
    contact_point_key: RoadContactPointKey,
    errors: &mut Vec<LinkValidationError>,
) -> bool {
    let link = road_link_for_road_contact_point(map, contact_point_key);

    match link {
        RoadLink::NotSpecified => true,

        RoadLink::ToRoad { road, contact_point } => {
            let to_contact_point_key = RoadContactPointKey::new(road.index(), *contact_point);

            let to_road = &map.roads()[road.index()];
            if to_road.junction_ref().has_value() {
                errors.push(LinkValidationError::DirectLinkToJunctionRoad {
                    a_contact_point_key: contact_point_key,
                    b_contact_point_key: to_contact_point_key,
                });
                false
            } else {
                validate_road_road_link(map, contact_point_key, to_contact_point_key, errors)
            }
        }

        RoadLink::ToJunction { junction } => {
            let mut success = true;

            let junction_idx = junction.index();
            let connections = map.junctions()[junction_idx].connections();
            for (i, conn) in connections.iter().enumerate() {
                if conn.incoming_road().index() != contact_point_key.road_idx {
                    continue;
                }
                let contact_point = match conn.contact_point() {
                    Some(contact_point) => contact_point,
                    None => continue,
                };

                let dest_road_idx = conn.connecting_road().index();
                success &= validate_incoming_connecting_link(
                    map,
                    contact_point_key,
                    RoadContactPointKey::new(dest_road_idx, contact_point),
                    JunctionConnectionKey::new(junction_idx, i),
                    errors,
                );
            }

            success
        }
    }
}

/// Validates the links from contact point `from` to contact point `to`, for
/// a pair connected by a direct road link.
///
/// Road link validation is directed; fully validating a contact point pair
/// takes one call per direction, and the full sweep in
/// [`validate_links`] makes both.
pub fn validate_road_road_link(
    map: &XodrMap,
    from_contact_point_key: RoadContactPointKey,
    to_contact_point_key: RoadContactPointKey,
    errors: &mut Vec<LinkValidationError>,
) -> bool {
    let back_link = road_link_for_road_contact_point(map, to_contact_point_key);

    match back_link {
        RoadLink::NotSpecified => {
            errors.push(LinkValidationError::RoadBackLinkNotSpecified {
                a_contact_point_key: from_contact_point_key,
                b_contact_point_key: to_contact_point_key,
                a_to_b_junction_idx: None,
            });
            false
        }

        RoadLink::ToRoad { road, contact_point } => {
            if road.index() != from_contact_point_key.road_idx || *contact_point != from_contact_point_key.contact_point
            {
                errors.push(LinkValidationError::RoadLinkMisMatch {
                    a_contact_point_key: from_contact_point_key,
                    b_contact_point_key: to_contact_point_key,
                    c_contact_point_key: RoadContactPointKey::new(road.index(), *contact_point),
                    a_to_b_junction_idx: None,
                });
                false
            } else {
                validate_road_road_lane_links(map, from_contact_point_key, to_contact_point_key, errors)
            }
        }

        RoadLink::ToJunction { junction } => {
            let back_link_junction_idx = junction.index();
            let back_link_junction = &map.junctions()[back_link_junction_idx];

            if let Some(connection) = back_link_junction.find_connection(
                to_contact_point_key.road_idx,
                from_contact_point_key.road_idx,
                from_contact_point_key.contact_point,
            ) {
                // 'from' is a connecting road of the junction; the back link
                // is the incoming connection.
                validate_connecting_incoming_lane_links(
                    map,
                    from_contact_point_key,
                    to_contact_point_key,
                    connection,
                    errors,
                )
            } else if back_link_junction
                .has_outgoing_connection(from_contact_point_key.road_idx, from_contact_point_key.contact_point)
            {
                // 'from' is a connecting road of the junction; the back link
                // is the outgoing connection.
                validate_connecting_outgoing_lane_links(map, from_contact_point_key, to_contact_point_key, errors)
            } else {
                errors.push(LinkValidationError::RoadBackLinkNotSpecifiedInJunction {
                    a_contact_point_key: from_contact_point_key,
                    b_contact_point_key: to_contact_point_key,
                    a_to_b_junction_idx: None,
                    back_link_junction_idx,
                });
                false
            }
        }
    }
}

/// Validates the links from contact point `from` to contact point `to`, for
/// a pair connected through the junction connection identified by
/// `connection_key` (with `from` the incoming and `to` the connecting road).
pub fn validate_incoming_connecting_link(
    map: &XodrMap,
    from_contact_point_key: RoadContactPointKey,
    to_contact_point_key: RoadContactPointKey,
    connection_key: JunctionConnectionKey,
    errors: &mut Vec<LinkValidationError>,
) -> bool {
    let back_link = road_link_for_road_contact_point(map, to_contact_point_key);

    match back_link {
        RoadLink::NotSpecified => {
            errors.push(LinkValidationError::RoadBackLinkNotSpecified {
                a_contact_point_key: from_contact_point_key,
                b_contact_point_key: to_contact_point_key,
                a_to_b_junction_idx: Some(connection_key.junction_idx),
            });
            false
        }

        RoadLink::ToRoad { road, contact_point } => {
            if road.index() != from_contact_point_key.road_idx || *contact_point != from_contact_point_key.contact_point
            {
                errors.push(LinkValidationError::RoadLinkMisMatch {
                    a_contact_point_key: from_contact_point_key,
                    b_contact_point_key: to_contact_point_key,
                    c_contact_point_key: RoadContactPointKey::new(road.index(), *contact_point),
                    a_to_b_junction_idx: Some(connection_key.junction_idx),
                });
                false
            } else {
                validate_incoming_connecting_lane_links(
                    map,
                    from_contact_point_key,
                    to_contact_point_key,
                    connection_key,
                    errors,
                )
            }
        }

        RoadLink::ToJunction { junction } => {
            let back_link_junction_idx = junction.index();
            let back_link_junction = &map.junctions()[back_link_junction_idx];

            if back_link_junction.has_connection(
                to_contact_point_key.road_idx,
                from_contact_point_key.road_idx,
                from_contact_point_key.contact_point,
            ) {
                // Both roads are connecting roads of (different) junctions.
                // The forward link was the incoming connection, so the back
                // link must be the outgoing one.
                errors.push(LinkValidationError::InconsistentJunctionPathDirections {
                    a_contact_point_key: from_contact_point_key,
                    b_contact_point_key: to_contact_point_key,
                    a_to_b_junction_idx: connection_key.junction_idx,
                    b_to_a_junction_idx: back_link_junction_idx,
                });
                false
            } else if back_link_junction
                .has_outgoing_connection(from_contact_point_key.road_idx, from_contact_point_key.contact_point)
            {
                // Both roads are junction paths; the connection from 'from'
                // to 'to' is incoming, the one from 'to' to 'from' outgoing.
                let connection =
                    &map.junctions()[connection_key.junction_idx].connections()[connection_key.connection_idx];
                validate_connecting_connecting_lane_links(
                    map,
                    from_contact_point_key,
                    to_contact_point_key,
                    connection,
                    errors,
                )
            } else {
                errors.push(LinkValidationError::RoadBackLinkNotSpecifiedInJunction {
                    a_contact_point_key: from_contact_point_key,
                    b_contact_point_key: to_contact_point_key,
                    a_to_b_junction_idx: Some(connection_key.junction_idx),
                    back_link_junction_idx,
                });
                false
            }
        }
    }
}

fn road_link_for_road_contact_point<'a>(map: &'a XodrMap, key: RoadContactPointKey) -> &'a RoadLink {
    let road = &map.roads()[key.road_idx];
    road.road_link(key.contact_point.link_type())
}
