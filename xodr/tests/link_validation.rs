//! Link-validator scenarios driven by XML fixtures.
//!
//! Each fixture is a complete, internally consistent OpenDRIVE document;
//! tests then knock out or redirect individual links through the `test_*`
//! mutators and check the exact errors reported.

use xodr::validation::LinkValidationError;
use xodr::{
    for_each_road_link, ContactPoint, LaneId, LaneSectionContactPointKey, RoadContactPointKey, RoadLink, XodrMap,
};

/// A 100m straight road with one driving lane per side. `links` goes into
/// the road's `<link>` element, `lane_links(side)` into each lane's.
fn road(id: &str, junction: &str, links: &str, left_lane_link: &str, right_lane_link: &str) -> String {
    format!(
        r#"<road name="road {id}" id="{id}" junction="{junction}" length="100">
             <link>{links}</link>
             <planView>
               <geometry s="0" x="0" y="0" hdg="0" length="100"><line/></geometry>
             </planView>
             <lanes>
               <laneSection s="0">
                 <left>
                   <lane id="1" type="driving">
                     {left_lane_link}
                     <width sOffset="0" a="3.5" b="0" c="0" d="0"/>
                   </lane>
                 </left>
                 <center><lane id="0" type="none"/></center>
                 <right>
                   <lane id="-1" type="driving">
                     {right_lane_link}
                     <width sOffset="0" a="3.5" b="0" c="0" d="0"/>
                   </lane>
                 </right>
               </laneSection>
             </lanes>
           </road>"#,
        id = id,
        junction = junction,
        links = links,
        left_lane_link = left_lane_link,
        right_lane_link = right_lane_link,
    )
}

fn load(body: &str) -> XodrMap {
    let text = format!("<OpenDRIVE><header/>{}</OpenDRIVE>", body);
    XodrMap::from_text(&text).unwrap().extract_value().unwrap()
}

/// Road 1 runs into road 2 end-to-start; all lane links are symmetric.
fn two_road_map() -> XodrMap {
    load(&format!(
        "{}{}",
        road(
            "1",
            "-1",
            r#"<successor elementType="road" elementId="2" contactPoint="start"/>"#,
            r#"<link><successor id="1"/></link>"#,
            r#"<link><successor id="-1"/></link>"#,
        ),
        road(
            "2",
            "-1",
            r#"<predecessor elementType="road" elementId="1" contactPoint="end"/>"#,
            r#"<link><predecessor id="1"/></link>"#,
            r#"<link><predecessor id="-1"/></link>"#,
        ),
    ))
}

#[test]
fn symmetric_links_validate_cleanly() {
    let map = two_road_map();
    assert!(map.validate_links().is_empty());
    assert!(map.validate().is_ok());
}

#[test]
fn missing_lane_back_link_is_reported() {
    let mut map = two_road_map();
    map.test_road_by_id("2")
        .unwrap()
        .test_lane_section(0)
        .test_lane_by_id(LaneId(1))
        .test_set_predecessor(None);

    let errors = map.validate_links();
    assert_eq!(errors.len(), 1);

    let road1 = map.road_index_by_id("1").unwrap();
    let road2 = map.road_index_by_id("2").unwrap();
    match &errors[0] {
        LinkValidationError::LaneBackLinkNotSpecified {
            a_section_contact_point_key,
            b_section_contact_point_key,
            a_lane_id,
            b_lane_id,
        } => {
            assert_eq!(
                *a_section_contact_point_key,
                LaneSectionContactPointKey::new(road1, 0, ContactPoint::End)
            );
            assert_eq!(
                *b_section_contact_point_key,
                LaneSectionContactPointKey::new(road2, 0, ContactPoint::Start)
            );
            assert_eq!(*a_lane_id, LaneId(1));
            assert_eq!(*b_lane_id, LaneId(1));
        }
        other => panic!("unexpected error {:?}", other),
    }

    assert!(map.validate().is_err());
}

#[test]
fn lane_link_to_center_lane_is_reported() {
    let mut map = two_road_map();
    map.test_road_by_id("1")
        .unwrap()
        .test_lane_section(0)
        .test_lane_by_id(LaneId(1))
        .test_set_successor(Some(LaneId(0)));

    let errors = map.validate_links();
    assert!(errors
        .iter()
        .any(|e| matches!(e, LinkValidationError::LaneLinkToCenterLane { from_lane_id, .. } if *from_lane_id == LaneId(1))));
}

#[test]
fn lane_link_target_out_of_range_is_reported() {
    let mut map = two_road_map();
    map.test_road_by_id("1")
        .unwrap()
        .test_lane_section(0)
        .test_lane_by_id(LaneId(1))
        .test_set_successor(Some(LaneId(5)));

    let errors = map.validate_links();
    assert!(errors.iter().any(|e| matches!(
        e,
        LinkValidationError::LaneLinkTargetOutOfRange { a_lane_id, b_lane_id, .. }
            if *a_lane_id == LaneId(1) && *b_lane_id == LaneId(5)
    )));
}

#[test]
fn same_side_link_between_opposing_roads_is_reported() {
    // Roads meeting end-to-end have opposing directions, so lanes must link
    // across the reference line.
    let map = load(&format!(
        "{}{}",
        road(
            "1",
            "-1",
            r#"<successor elementType="road" elementId="2" contactPoint="end"/>"#,
            r#"<link><successor id="-1"/></link>"#,
            r#"<link><successor id="1"/></link>"#,
        ),
        road(
            "2",
            "-1",
            r#"<successor elementType="road" elementId="1" contactPoint="end"/>"#,
            r#"<link><successor id="-1"/></link>"#,
            r#"<link><successor id="1"/></link>"#,
        ),
    ));
    assert!(map.validate_links().is_empty());

    let mut map = map;
    map.test_road_by_id("1")
        .unwrap()
        .test_lane_section(0)
        .test_lane_by_id(LaneId(1))
        .test_set_successor(Some(LaneId(1)));

    let errors = map.validate_links();
    assert!(errors.iter().any(|e| matches!(
        e,
        LinkValidationError::LaneLinkOpposingDirections { a_lane_id, b_lane_id, .. }
            if *a_lane_id == LaneId(1) && *b_lane_id == LaneId(1)
    )));
}

#[test]
fn road_back_link_not_specified_is_reported() {
    let mut map = two_road_map();
    map.test_road_by_id("2").unwrap().test_set_predecessor(RoadLink::NotSpecified);

    let errors = map.validate_links();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        LinkValidationError::RoadBackLinkNotSpecified {
            a_contact_point_key,
            b_contact_point_key,
            a_to_b_junction_idx,
        } => {
            assert_eq!(a_contact_point_key.road_idx, map.road_index_by_id("1").unwrap());
            assert_eq!(a_contact_point_key.contact_point, ContactPoint::End);
            assert_eq!(b_contact_point_key.road_idx, map.road_index_by_id("2").unwrap());
            assert_eq!(*a_to_b_junction_idx, None);
        }
        other => panic!("unexpected error {:?}", other),
    }

    let description = errors[0].description(&map);
    assert!(description.contains("aren't symmetric"), "{}", description);
}

#[test]
fn road_link_mismatch_is_reported() {
    // Road 2's back link points at road 3 instead of road 1.
    let map = load(&format!(
        "{}{}{}",
        road(
            "1",
            "-1",
            r#"<successor elementType="road" elementId="2" contactPoint="start"/>"#,
            r#"<link><successor id="1"/></link>"#,
            r#"<link><successor id="-1"/></link>"#,
        ),
        road(
            "2",
            "-1",
            r#"<predecessor elementType="road" elementId="3" contactPoint="end"/>"#,
            "",
            "",
        ),
        road("3", "-1", "", "", ""),
    ));

    let errors = map.validate_links();
    assert!(errors.iter().any(|e| matches!(
        e,
        LinkValidationError::RoadLinkMisMatch { c_contact_point_key, .. }
            if c_contact_point_key.road_idx == map.road_index_by_id("3").unwrap()
    )));
}

/// An incoming road (1), a junction road (5) in junction j1, and an outgoing
/// road (2), all fully linked.
fn junction_map_body() -> String {
    format!(
        "{}{}{}{}",
        road(
            "1",
            "-1",
            r#"<successor elementType="junction" elementId="j1"/>"#,
            "",
            "",
        ),
        road(
            "5",
            "j1",
            concat!(
                r#"<predecessor elementType="road" elementId="1" contactPoint="end"/>"#,
                r#"<successor elementType="road" elementId="2" contactPoint="start"/>"#,
            ),
            r#"<link><predecessor id="1"/><successor id="1"/></link>"#,
            r#"<link><predecessor id="-1"/><successor id="-1"/></link>"#,
        ),
        road(
            "2",
            "-1",
            r#"<predecessor elementType="junction" elementId="j1"/>"#,
            r#"<link><predecessor id="1"/></link>"#,
            r#"<link><predecessor id="-1"/></link>"#,
        ),
        r#"<junction name="j" id="j1">
             <connection id="0" incomingRoad="1" connectingRoad="5" contactPoint="start">
               <laneLink from="1" to="1"/>
               <laneLink from="-1" to="-1"/>
             </connection>
           </junction>"#,
    )
}

#[test]
fn junction_connected_roads_validate_cleanly() {
    let map = load(&junction_map_body());
    let errors = map.validate_links();
    assert!(errors.is_empty(), "{:?}", errors.iter().map(|e| e.description(&map)).collect::<Vec<_>>());
    assert!(map.validate().is_ok());
}

#[test]
fn junction_road_without_back_link_is_reported() {
    let mut map = load(&junction_map_body());
    map.test_road_by_id("5").unwrap().test_set_predecessor(RoadLink::NotSpecified);

    let errors = map.validate_links();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        LinkValidationError::RoadBackLinkNotSpecified {
            a_to_b_junction_idx, ..
        } => {
            assert_eq!(*a_to_b_junction_idx, Some(map.junction_index_by_id("j1").unwrap()));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn junction_lane_link_without_back_link_is_reported() {
    let mut map = load(&junction_map_body());
    map.test_road_by_id("5")
        .unwrap()
        .test_lane_section(0)
        .test_lane_by_id(LaneId(-1))
        .test_set_predecessor(None);

    let errors = map.validate_links();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        errors[0],
        LinkValidationError::LaneBackLinkNotSpecified { a_lane_id, b_lane_id, .. }
            if a_lane_id == LaneId(-1) && b_lane_id == LaneId(-1)
    ));
}

#[test]
fn direct_link_to_junction_road_is_reported() {
    // Road 1 links straight at junction road 5 instead of going through the
    // junction's connections.
    let map = load(&format!(
        "{}{}{}",
        road(
            "1",
            "-1",
            r#"<successor elementType="road" elementId="5" contactPoint="start"/>"#,
            r#"<link><successor id="1"/></link>"#,
            r#"<link><successor id="-1"/></link>"#,
        ),
        road(
            "5",
            "j1",
            r#"<predecessor elementType="road" elementId="1" contactPoint="end"/>"#,
            r#"<link><predecessor id="1"/></link>"#,
            r#"<link><predecessor id="-1"/></link>"#,
        ),
        r#"<junction name="j" id="j1">
             <connection id="0" incomingRoad="1" connectingRoad="5" contactPoint="start">
               <laneLink from="1" to="1"/>
               <laneLink from="-1" to="-1"/>
             </connection>
           </junction>"#,
    ));

    let errors = map.validate_links();
    assert!(errors
        .iter()
        .any(|e| matches!(e, LinkValidationError::DirectLinkToJunctionRoad { .. })));
}

#[test]
fn inconsistent_junction_path_directions_are_reported() {
    // Roads 5 and 6 are junction paths in j1 and j2 respectively; both
    // junctions claim the connection between them as incoming.
    let body = format!(
        "{}{}{}{}{}{}",
        road("1", "-1", r#"<successor elementType="junction" elementId="j1"/>"#, "", ""),
        road(
            "5",
            "j1",
            concat!(
                r#"<predecessor elementType="road" elementId="1" contactPoint="end"/>"#,
                r#"<successor elementType="junction" elementId="j2"/>"#,
            ),
            r#"<link><predecessor id="1"/><successor id="1"/></link>"#,
            r#"<link><predecessor id="-1"/><successor id="-1"/></link>"#,
        ),
        road(
            "6",
            "j2",
            concat!(
                r#"<predecessor elementType="junction" elementId="j1"/>"#,
                r#"<successor elementType="road" elementId="2" contactPoint="start"/>"#,
            ),
            r#"<link><predecessor id="1"/><successor id="1"/></link>"#,
            r#"<link><predecessor id="-1"/><successor id="-1"/></link>"#,
        ),
        road(
            "2",
            "-1",
            r#"<predecessor elementType="junction" elementId="j2"/>"#,
            r#"<link><predecessor id="1"/></link>"#,
            r#"<link><predecessor id="-1"/></link>"#,
        ),
        r#"<junction name="j1" id="j1">
             <connection id="0" incomingRoad="1" connectingRoad="5" contactPoint="start">
               <laneLink from="1" to="1"/>
               <laneLink from="-1" to="-1"/>
             </connection>
             <connection id="1" incomingRoad="6" connectingRoad="5" contactPoint="end"/>
           </junction>"#,
        r#"<junction name="j2" id="j2">
             <connection id="0" incomingRoad="5" connectingRoad="6" contactPoint="start">
               <laneLink from="1" to="1"/>
               <laneLink from="-1" to="-1"/>
             </connection>
           </junction>"#,
    );
    let map = load(&body);

    let errors = map.validate_links();
    assert!(errors
        .iter()
        .any(|e| matches!(e, LinkValidationError::InconsistentJunctionPathDirections { .. })));
}

#[test]
fn for_each_road_link_visits_each_connection_once() {
    let map = load(&junction_map_body());
    let road1 = map.road_index_by_id("1").unwrap();
    let road5 = map.road_index_by_id("5").unwrap();
    let road2 = map.road_index_by_id("2").unwrap();

    let mut pairs = Vec::new();
    for_each_road_link(&map, |a, b, _connection| pairs.push((a, b)));

    assert_eq!(pairs.len(), 2);
    assert!(pairs.contains(&(
        RoadContactPointKey::new(road5, ContactPoint::Start),
        RoadContactPointKey::new(road1, ContactPoint::End),
    )));
    assert!(pairs.contains(&(
        RoadContactPointKey::new(road5, ContactPoint::End),
        RoadContactPointKey::new(road2, ContactPoint::Start),
    )));
}

#[test]
fn junction_membership_is_validated() {
    // Road 5 claims to be outside any junction, but j1 uses it as a
    // connecting road.
    let body = format!(
        "{}{}{}",
        road("1", "-1", r#"<successor elementType="junction" elementId="j1"/>"#, "", ""),
        road(
            "5",
            "-1",
            r#"<predecessor elementType="road" elementId="1" contactPoint="end"/>"#,
            r#"<link><predecessor id="1"/></link>"#,
            r#"<link><predecessor id="-1"/></link>"#,
        ),
        r#"<junction name="j" id="j1">
             <connection id="0" incomingRoad="1" connectingRoad="5" contactPoint="start">
               <laneLink from="1" to="1"/>
               <laneLink from="-1" to="-1"/>
             </connection>
           </junction>"#,
    );
    let map = load(&body);
    let err = map.validate().unwrap_err();
    assert!(err.to_string().contains("doesn't belong to junction"), "{}", err);
}
