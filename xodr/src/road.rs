use std::sync::OnceLock;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::elevation::ElevationProfile;
use crate::geometry::ReferenceLine;
use crate::lane_section::LaneSection;
use crate::object_reference::{IdToIndexMaps, XodrObjectReference};
use crate::result::{Invalidations, XodrParseError, XodrParseResult};
use crate::road_link::{ContactPoint, RoadLink, RoadLinkType, RoadLinks};
use crate::road_object::RoadObject;
use crate::xml::{Multiplicity, XmlAttributeParsers, XmlChildElementParsers};

/// A road in an OpenDRIVE map.
///
/// A road has a reference line, one or more lane sections covering the
/// reference line's s-range, and at most one predecessor and one successor
/// link. Places where the network branches are described by
/// [`Junction`](crate::Junction)s instead.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Road {
    name: String,
    id: String,
    junction_ref: XodrObjectReference,

    length: f64,
    reference_line: ReferenceLine,
    elevation_profile: Option<ElevationProfile>,
    lane_sections: Vec<LaneSection>,
    road_objects: Vec<RoadObject>,

    links: RoadLinks,
}

impl Road {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<Road> {
        let mut ret = XodrParseResult::default();
        road_attrib_parsers().parse(node, &mut ret);
        road_child_parsers().parse(node, &mut ret);

        if !ret.has_valid_geometry() {
            // Without a usable reference line there's nothing to close the
            // last lane section against.
            return ret;
        }

        let reference_line_end_s = ret.value().reference_line.end_s();
        if let Some(last_section) = ret.value().lane_sections.last() {
            if last_section.start_s() >= reference_line_end_s {
                let message = format!(
                    "A laneSection of the road with id '{}' has invalid endS.",
                    ret.value().id
                );
                ret.push_error(XodrParseError::message(message, Invalidations::GEOMETRY));
            }
            ret.value_mut()
                .lane_sections
                .last_mut()
                .unwrap()
                .set_end_s(reference_line_end_s);
        }

        ret
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The reference to the junction this road belongs to. Null for roads
    /// which aren't part of a junction (junction id `-1` in the file).
    pub fn junction_ref(&self) -> &XodrObjectReference {
        &self.junction_ref
    }

    /// The length of this road, as given by the `length` attribute.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn reference_line(&self) -> &ReferenceLine {
        &self.reference_line
    }

    pub fn elevation_profile(&self) -> Option<&ElevationProfile> {
        self.elevation_profile.as_ref()
    }

    /// The lane sections of this road, ordered by increasing start s; they
    /// partition the reference line's s-range.
    pub fn lane_sections(&self) -> &[LaneSection] {
        &self.lane_sections
    }

    pub fn road_objects(&self) -> &[RoadObject] {
        &self.road_objects
    }

    pub fn links(&self) -> &RoadLinks {
        &self.links
    }

    pub fn predecessor(&self) -> &RoadLink {
        self.links.predecessor()
    }

    pub fn successor(&self) -> &RoadLink {
        self.links.successor()
    }

    /// The predecessor or successor link, selected by link type. Useful for
    /// code which handles both directions generically.
    pub fn road_link(&self, road_link_type: RoadLinkType) -> &RoadLink {
        match road_link_type {
            RoadLinkType::Predecessor => self.predecessor(),
            RoadLinkType::Successor => self.successor(),
        }
    }

    /// The index of the lane section containing the given contact point:
    /// the first section for `Start`, the last for `End`.
    pub fn lane_section_index_for_contact_point(&self, contact_point: ContactPoint) -> usize {
        match contact_point {
            ContactPoint::Start => 0,
            ContactPoint::End => self.lane_sections.len() - 1,
        }
    }

    /// The lane section containing the given contact point.
    pub fn lane_section_for_contact_point(&self, contact_point: ContactPoint) -> &LaneSection {
        &self.lane_sections[self.lane_section_index_for_contact_point(contact_point)]
    }

    /// The lane section whose s-range contains `s`. Sections own their
    /// s-ranges closed-left, open-right; the last section also owns the
    /// closing endpoint.
    pub fn lane_section_containing(&self, s: f64) -> &LaneSection {
        for lane_section in &self.lane_sections {
            if s < lane_section.end_s() {
                return lane_section;
            }
        }
        self.lane_sections.last().unwrap()
    }

    /// The index of the lane section whose lanes' links of the given type
    /// are external (i.e. cross over to another road): the first section for
    /// predecessor links, the last for successor links.
    pub fn lane_section_index_for_external_link_type(&self, link_type: RoadLinkType) -> usize {
        match link_type {
            RoadLinkType::Predecessor => 0,
            RoadLinkType::Successor => self.lane_sections.len() - 1,
        }
    }

    /// The lane section whose lanes' links of the given type are external.
    pub fn lane_section_for_external_link_type(&self, link_type: RoadLinkType) -> &LaneSection {
        &self.lane_sections[self.lane_section_index_for_external_link_type(link_type)]
    }

    /// The beginning of the contiguous range of global lane indices used by
    /// this road's lanes. Requires the road to have lanes.
    pub fn global_lane_indices_begin(&self) -> usize {
        self.lane_sections[0].lanes()[0].global_index()
    }

    /// The end (exclusive) of the contiguous range of global lane indices
    /// used by this road's lanes. Requires the road to have lanes.
    pub fn global_lane_indices_end(&self) -> usize {
        self.lane_sections.last().unwrap().lanes().last().unwrap().global_index() + 1
    }

    pub(crate) fn resolve_references(&mut self, id_to_index_maps: &IdToIndexMaps) -> Result<(), String> {
        self.junction_ref
            .resolve_nullable(&id_to_index_maps.junction_id_to_index, "-1", "junction")?;
        self.links.resolve_references(id_to_index_maps)
    }

    /// Validates every lane section of this road. See
    /// [`LaneSection::validate`].
    pub fn validate(&self) -> Result<()> {
        for lane_section in &self.lane_sections {
            lane_section.validate()?;
        }
        Ok(())
    }

    pub(crate) fn lane_sections_mut(&mut self) -> &mut [LaneSection] {
        &mut self.lane_sections
    }

    /// Only for use from tests.
    pub fn test_set_predecessor(&mut self, predecessor: RoadLink) {
        self.links.test_set_predecessor(predecessor);
    }

    /// Only for use from tests.
    pub fn test_set_successor(&mut self, successor: RoadLink) {
        self.links.test_set_successor(successor);
    }

    /// Only for use from tests.
    pub fn test_lane_section(&mut self, i: usize) -> &mut LaneSection {
        &mut self.lane_sections[i]
    }
}

fn road_attrib_parsers() -> &'static XmlAttributeParsers<Road> {
    static PARSERS: OnceLock<XmlAttributeParsers<Road>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlAttributeParsers::new();
        parsers.field("name", Invalidations::NONE, |road: &mut Road, name: String| {
            road.name = name
        });
        parsers.field("length", Invalidations::GEOMETRY, |road: &mut Road, length: f64| {
            road.length = length
        });
        parsers.field("id", Invalidations::ALL, |road: &mut Road, id: String| road.id = id);
        parsers.field(
            "junction",
            Invalidations::CONNECTIVITY,
            |road: &mut Road, junction: XodrObjectReference| road.junction_ref = junction,
        );
        parsers.finalize();
        parsers
    })
}

fn road_child_parsers() -> &'static XmlChildElementParsers<Road> {
    static PARSERS: OnceLock<XmlChildElementParsers<Road>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlChildElementParsers::new();
        parsers.field(
            "planView",
            Invalidations::ALL,
            ReferenceLine::parse_xml,
            |road: &mut Road, reference_line| road.reference_line = reference_line,
        );
        parsers.optional_field(
            "elevationProfile",
            Invalidations::NONE,
            ElevationProfile::parse_xml,
            |road: &mut Road, profile| road.elevation_profile = Some(profile),
        );
        parsers.parser("lanes", Multiplicity::One, Invalidations::GEOMETRY, |node, result| {
            lanes_child_parsers().parse(node, result);
        });
        parsers.optional_field(
            "link",
            Invalidations::CONNECTIVITY,
            RoadLinks::parse_xml,
            |road: &mut Road, links| road.links = links,
        );
        parsers.parser("objects", Multiplicity::ZeroOrOne, Invalidations::NONE, |node, result| {
            objects_child_parsers().parse(node, result);
        });
        parsers.finalize();
        parsers
    })
}

fn lanes_child_parsers() -> &'static XmlChildElementParsers<Road> {
    static PARSERS: OnceLock<XmlChildElementParsers<Road>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers: XmlChildElementParsers<Road> = XmlChildElementParsers::new();
        parsers.parser(
            "laneSection",
            Multiplicity::OneOrMore,
            Invalidations::NONE,
            |node, result| {
                let lane_section = LaneSection::parse_xml(node);
                let lane_section = result.absorb(lane_section);

                if result.value().lane_sections.is_empty() {
                    if lane_section.start_s() != 0.0 {
                        let message = format!(
                            "The first <laneSection> of the road with id '{}' does not start at s-coordinate 0.",
                            result.value().id
                        );
                        result.push_error(XodrParseError::message(message, Invalidations::GEOMETRY));
                    }
                } else {
                    let prev_start_s = result.value().lane_sections.last().unwrap().start_s();
                    if prev_start_s >= lane_section.start_s() {
                        let message = format!(
                            "The <laneSection>s of the road with id '{}' do not appear in ascending order of \
                             starting s-coordinates.",
                            result.value().id
                        );
                        result.push_error(XodrParseError::message(message, Invalidations::GEOMETRY));
                    }

                    // Each section runs up to where the next one starts.
                    let start_s = lane_section.start_s();
                    result.value_mut().lane_sections.last_mut().unwrap().set_end_s(start_s);
                }

                result.value_mut().lane_sections.push(lane_section);
            },
        );
        parsers.finalize();
        parsers
    })
}

fn objects_child_parsers() -> &'static XmlChildElementParsers<Road> {
    static PARSERS: OnceLock<XmlChildElementParsers<Road>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlChildElementParsers::new();
        parsers.vector(
            "object",
            Multiplicity::ZeroOrMore,
            Invalidations::NONE,
            RoadObject::parse_xml,
            |road: &mut Road, object| road.road_objects.push(object),
        );
        parsers.parser(
            "objectReference",
            Multiplicity::ZeroOrMore,
            Invalidations::NONE,
            |_, result| {
                result.push_error(XodrParseError::warning(
                    "WARNING: <objectReference> element not implemented yet.",
                ));
            },
        );
        parsers.parser("tunnel", Multiplicity::ZeroOrMore, Invalidations::NONE, |_, result| {
            result.push_error(XodrParseError::warning("WARNING: <tunnel> element not implemented yet."));
        });
        parsers.parser("bridge", Multiplicity::ZeroOrMore, Invalidations::NONE, |_, result| {
            result.push_error(XodrParseError::warning("WARNING: <bridge> element not implemented yet."));
        });
        parsers.finalize();
        parsers
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::lane_id::LaneId;

    use super::*;

    fn parse_road(text: &str) -> XodrParseResult<Road> {
        let doc = roxmltree::Document::parse(text).unwrap();
        Road::parse_xml(doc.root_element())
    }

    const SIMPLE_ROAD: &str = r#"
        <road name="main street" id="1" junction="-1" length="100">
          <planView>
            <geometry s="0" x="0" y="0" hdg="0" length="100"><line/></geometry>
          </planView>
          <lanes>
            <laneSection s="0">
              <left>
                <lane id="1" type="driving"><width sOffset="0" a="3.5" b="0" c="0" d="0"/></lane>
              </left>
              <center><lane id="0" type="none"/></center>
              <right>
                <lane id="-1" type="driving"><width sOffset="0" a="3.5" b="0" c="0" d="0"/></lane>
              </right>
            </laneSection>
            <laneSection s="60">
              <center><lane id="0" type="none"/></center>
              <right>
                <lane id="-1" type="driving"><width sOffset="0" a="3.5" b="0" c="0" d="0"/></lane>
              </right>
            </laneSection>
          </lanes>
        </road>"#;

    #[test]
    fn lane_sections_chain_and_close_against_the_reference_line() {
        let result = parse_road(SIMPLE_ROAD);
        assert!(result.errors().is_empty(), "{:?}", result.error_messages());

        let road = result.value();
        assert_eq!(road.name(), "main street");
        assert_eq!(road.lane_sections().len(), 2);
        assert_relative_eq!(road.lane_sections()[0].start_s(), 0.0);
        assert_relative_eq!(road.lane_sections()[0].end_s(), 60.0);
        assert_relative_eq!(road.lane_sections()[1].start_s(), 60.0);
        assert_relative_eq!(road.lane_sections()[1].end_s(), 100.0);

        assert_eq!(road.lane_section_index_for_contact_point(ContactPoint::Start), 0);
        assert_eq!(road.lane_section_index_for_contact_point(ContactPoint::End), 1);
        assert_eq!(
            road.lane_section_for_contact_point(ContactPoint::End).lanes()[0].id(),
            LaneId(-1)
        );
    }

    #[test]
    fn first_section_must_start_at_zero() {
        let text = SIMPLE_ROAD.replace(r#"<laneSection s="0">"#, r#"<laneSection s="5">"#);
        let result = parse_road(&text);
        assert!(!result.has_valid_geometry());
    }

    #[test]
    fn sections_must_be_sorted_by_start_s() {
        let text = SIMPLE_ROAD.replace(r#"<laneSection s="60">"#, r#"<laneSection s="0">"#);
        let result = parse_road(&text);
        assert!(!result.has_valid_geometry());
    }

    #[test]
    fn section_start_beyond_reference_line_is_rejected() {
        let text = SIMPLE_ROAD.replace(r#"<laneSection s="60">"#, r#"<laneSection s="150">"#);
        let result = parse_road(&text);
        assert!(!result.has_valid_geometry());
    }

    #[test]
    fn missing_lanes_element_invalidates_geometry() {
        let result = parse_road(
            r#"<road name="r" id="1" junction="-1" length="10">
                 <planView>
                   <geometry s="0" x="0" y="0" hdg="0" length="10"><line/></geometry>
                 </planView>
               </road>"#,
        );
        assert!(!result.has_valid_geometry());
    }

    #[test]
    fn objects_and_stub_elements() {
        let result = parse_road(
            r#"<road name="r" id="1" junction="-1" length="10">
                 <planView>
                   <geometry s="0" x="0" y="0" hdg="0" length="10"><line/></geometry>
                 </planView>
                 <lanes>
                   <laneSection s="0">
                     <center><lane id="0" type="none"/></center>
                     <right>
                       <lane id="-1" type="driving"><width sOffset="0" a="3" b="0" c="0" d="0"/></lane>
                     </right>
                   </laneSection>
                 </lanes>
                 <objects>
                   <object type="pole" name="p" id="o1" s="1" t="0" zOffset="0" validLength="0"
                     orientation="none" radius="0.2" height="4" hdg="0" pitch="0" roll="0"/>
                   <tunnel/>
                 </objects>
               </road>"#,
        );
        assert!(result.has_valid_geometry());
        assert_eq!(result.value().road_objects().len(), 1);
        assert_eq!(result.errors().len(), 1);
        assert!(!result.errors()[0].is_fatal());
    }
}
