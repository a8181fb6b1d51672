use anyhow::{bail, Result};

use crate::map::XodrMap;

/// Validates junction membership of roads: a road references a junction if
/// and only if that junction has a connection using the road as its
/// connecting road.
pub fn validate_junction_membership(map: &XodrMap) -> Result<()> {
    let roads = map.roads();
    let junctions = map.junctions();

    for (i, road) in roads.iter().enumerate() {
        if road.junction_ref().has_value() {
            let junction = &junctions[road.junction_ref().index()];
            let is_connecting_road = junction
                .connections()
                .iter()
                .any(|conn| conn.connecting_road().index() == i);
            if !is_connecting_road {
                bail!(
                    "The road {} is part of junction {}, but this junction doesn't contain a connection \
                     with road {} as connecting road.",
                    road.id(),
                    junction.id(),
                    road.id()
                );
            }
        }
    }

    for (i, junction) in junctions.iter().enumerate() {
        for conn in junction.connections() {
            let connecting_road = &roads[conn.connecting_road().index()];
            if !connecting_road.junction_ref().has_value() || connecting_road.junction_ref().index() != i {
                bail!(
                    "Junction {} uses {} as a connecting road, but this road doesn't belong to junction {}.",
                    junction.id(),
                    connecting_road.id(),
                    junction.id()
                );
            }
        }
    }

    Ok(())
}
