//! End-to-end parsing of complete OpenDRIVE documents.

use approx::assert_relative_eq;
use xodr::{LaneId, LaneType, RoadObjectType, SpeedUnit, XodrMap};

const FULL_MAP: &str = r#"
<OpenDRIVE>
  <header>
    <geoReference><![CDATA[+proj=tmerc +lat_0=48 +lon_0=11 +ellps=WGS84]]></geoReference>
  </header>
  <road name="country road" id="1" junction="-1" length="130">
    <link>
      <successor elementType="road" elementId="2" contactPoint="start"/>
      <neighbor side="left" elementId="2" direction="same"/>
    </link>
    <planView>
      <geometry s="0" x="0" y="0" hdg="0" length="100"><line/></geometry>
      <geometry s="100" x="100" y="0" hdg="0" length="30"><arc curvature="0.02"/></geometry>
    </planView>
    <elevationProfile>
      <elevation s="0" a="500" b="0.01" c="0" d="0"/>
    </elevationProfile>
    <lanes>
      <laneSection s="0">
        <left>
          <lane id="2" type="sidewalk" level="true">
            <width sOffset="0" a="2" b="0" c="0" d="0"/>
          </lane>
          <lane id="1" type="driving">
            <link><successor id="1"/></link>
            <width sOffset="0" a="3.25" b="0" c="0" d="0"/>
            <speed sOffset="0" max="100" unit="km/h"/>
          </lane>
        </left>
        <center><lane id="0" type="none"/></center>
        <right>
          <lane id="-1" type="driving">
            <link><successor id="-1"/></link>
            <width sOffset="0" a="3.25" b="0" c="0" d="0"/>
            <material sOffset="0" surface="asphalt" friction="0.9" roughness="0.05"/>
          </lane>
        </right>
      </laneSection>
    </lanes>
    <objects>
      <object type="pole" name="sign post" id="o1" s="20" t="-5" zOffset="0" validLength="0"
        orientation="none" radius="0.06" height="2.5" hdg="0" pitch="0" roll="0"/>
    </objects>
  </road>
  <road name="continuation" id="2" junction="-1" length="50">
    <link>
      <predecessor elementType="road" elementId="1" contactPoint="end"/>
    </link>
    <planView>
      <geometry s="0" x="129" y="9" hdg="0.6" length="50"><line/></geometry>
    </planView>
    <lanes>
      <laneSection s="0">
        <left>
          <lane id="1" type="driving">
            <link><predecessor id="1"/></link>
            <width sOffset="0" a="3.25" b="0" c="0" d="0"/>
          </lane>
        </left>
        <center><lane id="0" type="none"/></center>
        <right>
          <lane id="-1" type="driving">
            <link><predecessor id="-1"/></link>
            <width sOffset="0" a="3.25" b="0" c="0" d="0"/>
          </lane>
        </right>
      </laneSection>
    </lanes>
  </road>
</OpenDRIVE>"#;

#[test]
fn parses_a_complete_document() {
    let result = XodrMap::from_text(FULL_MAP).unwrap();
    assert!(result.errors().is_empty(), "{:?}", result.error_messages());

    let map = result.extract_value().unwrap();
    assert!(map.has_geo_reference());
    assert_eq!(map.roads().len(), 2);
    assert_eq!(map.total_num_lanes(), 5);

    let road = map.road_by_id("1").unwrap();
    assert_eq!(road.name(), "country road");
    assert_relative_eq!(road.reference_line().end_s(), 130.0);
    assert!(road.elevation_profile().is_some());
    assert_eq!(road.links().left_neighbor().unwrap().element_ref().id(), "2");

    let section = &road.lane_sections()[0];
    assert_eq!(section.num_left_lanes(), 2);
    assert_eq!(section.num_right_lanes(), 1);
    assert_eq!(section.lane_by_id(LaneId(2)).lane_type(), LaneType::Sidewalk);
    assert!(section.lane_by_id(LaneId(2)).level());
    assert_eq!(
        section.lane_by_id(LaneId(1)).speed_limits()[0].unit(),
        SpeedUnit::KilometersPerHour
    );
    assert_eq!(section.lane_by_id(LaneId(-1)).materials()[0].surface(), "asphalt");

    assert!(map.has_road_objects());
    assert_eq!(road.road_objects()[0].object_type(), RoadObjectType::Pole);

    assert!(map.validate().is_ok());
    assert!(map.validate_links().is_empty());
}

#[test]
fn geometry_queries_work_on_the_parsed_map() {
    let map = XodrMap::from_text(FULL_MAP).unwrap().extract_value().unwrap();
    let road = map.road_by_id("1").unwrap();

    // On the straight piece.
    let pt = road.reference_line().eval(50.0);
    assert_relative_eq!(pt.point.x, 50.0);
    assert_relative_eq!(pt.point.y, 0.0);
    assert_relative_eq!(road.reference_line().eval_curvature(50.0), 0.0);

    // On the arc.
    assert_relative_eq!(road.reference_line().eval_curvature(110.0), 0.02);

    // Tessellation covers the whole road with one vertex per meter.
    let tess = road.reference_line().tessellate(0.0, road.reference_line().end_s());
    assert_eq!(tess.len(), 131);
    assert_relative_eq!(tess.last().unwrap().s_coord, 130.0);

    // Lane boundaries line up with the lane widths on the straight piece.
    let section = &road.lane_sections()[0];
    let section_tess = road.reference_line().tessellate(0.0, 100.0);
    let boundaries = section.tessellate_lane_boundaries(&section_tess);
    assert_eq!(boundaries.len(), 4);
    assert_relative_eq!(boundaries[0].lateral_positions[0], 5.25);
    assert_relative_eq!(boundaries[1].lateral_positions[0], 3.25);
    assert_relative_eq!(boundaries[2].lateral_positions[0], 0.0);
    assert_relative_eq!(boundaries[3].lateral_positions[0], -3.25);
}

#[test]
fn unknown_elements_and_attributes_only_warn() {
    let text = FULL_MAP
        .replace("<planView>", r#"<userData code="7"/><planView vendor="acme">"#)
        .replace("</OpenDRIVE>", "<futureElement/></OpenDRIVE>");
    let result = XodrMap::from_text(&text).unwrap();

    assert!(!result.errors().is_empty());
    assert!(result.errors().iter().all(|e| !e.is_fatal()));
    assert!(result.has_valid_geometry());
    assert!(result.has_valid_connectivity());
    assert!(result.extract_value().is_ok());
}

#[test]
fn parsing_is_deterministic() {
    let first = XodrMap::from_text(FULL_MAP).unwrap();
    let second = XodrMap::from_text(FULL_MAP).unwrap();
    assert_eq!(first.error_messages(), second.error_messages());
    assert_eq!(
        first.value().total_num_lanes(),
        second.value().total_num_lanes()
    );

    let text = FULL_MAP.replace(r#"max="100" unit="km/h""#, r#"max="oops" unit="furlongs""#);
    let first = XodrMap::from_text(&text).unwrap();
    let second = XodrMap::from_text(&text).unwrap();
    assert_eq!(first.error_messages(), second.error_messages());
    assert!(!first.error_messages().is_empty());
}

#[test]
fn partial_maps_are_still_produced_on_fatal_errors() {
    // Break road 2's reference line; road 1 should still come out usable.
    let text = FULL_MAP.replace(
        r#"<geometry s="0" x="129" y="9" hdg="0.6" length="50"><line/></geometry>"#,
        r#"<geometry s="0" x="129" y="9" hdg="0.6" length="-50"><line/></geometry>"#,
    );
    let result = XodrMap::from_text(&text).unwrap();
    assert!(!result.has_valid_geometry());
    assert!(result.extract_value().is_err());

    let result = XodrMap::from_text(&text).unwrap();
    let (map, errors) = result.into_parts();
    assert!(!errors.is_empty());
    assert_eq!(map.roads().len(), 2);
    assert_relative_eq!(map.road_by_id("1").unwrap().reference_line().end_s(), 130.0);
}
