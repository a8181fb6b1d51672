use std::sync::OnceLock;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::object_reference::{IdToIndexMaps, XodrObjectReference};
use crate::result::{Invalidations, XodrParseError, XodrParseResult};
use crate::xml::{FromXmlAttribute, Multiplicity, XmlAttributeParsers, XmlChildElementParsers};

/// One of the two ends of a road.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ContactPoint {
    Start,
    End,
}

impl ContactPoint {
    pub fn opposite(self) -> ContactPoint {
        match self {
            ContactPoint::Start => ContactPoint::End,
            ContactPoint::End => ContactPoint::Start,
        }
    }

    /// The type of link which originates from this contact point: links at
    /// the start of a road are predecessor links, links at the end successor
    /// links.
    pub fn link_type(self) -> RoadLinkType {
        match self {
            ContactPoint::Start => RoadLinkType::Predecessor,
            ContactPoint::End => RoadLinkType::Successor,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ContactPoint::Start => "start",
            ContactPoint::End => "end",
        }
    }
}

impl FromXmlAttribute for ContactPoint {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        match value {
            "start" => Ok(ContactPoint::Start),
            "end" => Ok(ContactPoint::End),
            _ => bail!("not a valid contact point: '{}'", value),
        }
    }
}

/// Which of a road's two links is meant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoadLinkType {
    Predecessor,
    Successor,
}

impl RoadLinkType {
    /// The contact point from which a link of this type originates.
    pub fn contact_point(self) -> ContactPoint {
        match self {
            RoadLinkType::Predecessor => ContactPoint::Start,
            RoadLinkType::Successor => ContactPoint::End,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RoadLinkType::Predecessor => "predecessor",
            RoadLinkType::Successor => "successor",
        }
    }
}

/// The target of a road's predecessor or successor link.
///
/// A road end either links to nothing, directly to another road's contact
/// point, or into a junction (which then describes the individual
/// connections).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum RoadLink {
    #[default]
    NotSpecified,
    ToRoad {
        road: XodrObjectReference,
        contact_point: ContactPoint,
    },
    ToJunction {
        junction: XodrObjectReference,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LinkElementType {
    Road,
    Junction,
}

impl FromXmlAttribute for LinkElementType {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        match value {
            "road" => Ok(LinkElementType::Road),
            "junction" => Ok(LinkElementType::Junction),
            _ => bail!("not a valid element type: '{}'", value),
        }
    }
}

impl RoadLink {
    pub fn to_road(road: XodrObjectReference, contact_point: ContactPoint) -> Self {
        RoadLink::ToRoad { road, contact_point }
    }

    pub fn to_junction(junction: XodrObjectReference) -> Self {
        RoadLink::ToJunction { junction }
    }

    pub fn is_specified(&self) -> bool {
        !matches!(self, RoadLink::NotSpecified)
    }

    /// The reference to the link's target, if one is specified.
    pub fn element_ref(&self) -> Option<&XodrObjectReference> {
        match self {
            RoadLink::NotSpecified => None,
            RoadLink::ToRoad { road, .. } => Some(road),
            RoadLink::ToJunction { junction } => Some(junction),
        }
    }

    /// The contact point on the target road, for links which target a road.
    pub fn contact_point(&self) -> Option<ContactPoint> {
        match self {
            RoadLink::ToRoad { contact_point, .. } => Some(*contact_point),
            _ => None,
        }
    }

    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<RoadLink> {
        #[derive(Default)]
        struct LinkAttribs {
            element_type: Option<LinkElementType>,
            element_id: XodrObjectReference,
            contact_point: Option<ContactPoint>,
        }

        static PARSERS: OnceLock<XmlAttributeParsers<LinkAttribs>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlAttributeParsers::new();
            parsers.field(
                "elementType",
                Invalidations::NONE,
                |attribs: &mut LinkAttribs, v: LinkElementType| attribs.element_type = Some(v),
            );
            parsers.field(
                "elementId",
                Invalidations::NONE,
                |attribs: &mut LinkAttribs, v: XodrObjectReference| attribs.element_id = v,
            );
            parsers.optional_field(
                "contactPoint",
                Invalidations::NONE,
                |attribs: &mut LinkAttribs, v: ContactPoint| attribs.contact_point = Some(v),
            );
            parsers.finalize();
            parsers
        });

        let mut attribs = XodrParseResult::<LinkAttribs>::default();
        parsers.parse(node, &mut attribs);
        let (attribs, mut errors) = attribs.into_parts();

        let link = match (attribs.element_type, attribs.contact_point) {
            (Some(LinkElementType::Road), Some(contact_point)) => RoadLink::ToRoad {
                road: attribs.element_id,
                contact_point,
            },
            (Some(LinkElementType::Road), None) => {
                errors.push(XodrParseError::message(
                    "The contactPoint attribute is required when elementType is 'road'.",
                    Invalidations::CONNECTIVITY,
                ));
                RoadLink::NotSpecified
            }
            (Some(LinkElementType::Junction), _) => RoadLink::ToJunction {
                junction: attribs.element_id,
            },
            (None, _) => RoadLink::NotSpecified,
        };

        XodrParseResult::from_parts(link, errors)
    }

    pub(crate) fn resolve_references(&mut self, id_to_index_maps: &IdToIndexMaps) -> Result<(), String> {
        match self {
            RoadLink::NotSpecified => Ok(()),
            RoadLink::ToRoad { road, .. } => road.resolve(&id_to_index_maps.road_id_to_index, "road"),
            RoadLink::ToJunction { junction } => {
                junction.resolve(&id_to_index_maps.junction_id_to_index, "junction")
            }
        }
    }
}

/// The side a neighboring road is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighborSide {
    Left,
    Right,
}

impl FromXmlAttribute for NeighborSide {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        match value {
            "left" => Ok(NeighborSide::Left),
            "right" => Ok(NeighborSide::Right),
            _ => bail!("not a valid side: '{}'", value),
        }
    }
}

/// Whether two neighboring roads run in the same or opposing directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighborDirection {
    Same,
    Opposite,
}

impl FromXmlAttribute for NeighborDirection {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        match value {
            "same" => Ok(NeighborDirection::Same),
            "opposite" => Ok(NeighborDirection::Opposite),
            _ => bail!("not a valid direction: '{}'", value),
        }
    }
}

/// A link from a road to a parallel neighboring road.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighborLink {
    side: NeighborSide,
    direction: NeighborDirection,
    road: XodrObjectReference,
}

impl NeighborLink {
    pub fn side(&self) -> NeighborSide {
        self.side
    }

    pub fn direction(&self) -> NeighborDirection {
        self.direction
    }

    pub fn element_ref(&self) -> &XodrObjectReference {
        &self.road
    }

    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<NeighborLink> {
        #[derive(Default)]
        struct NeighborAttribs {
            side: Option<NeighborSide>,
            direction: Option<NeighborDirection>,
            road: XodrObjectReference,
        }

        static PARSERS: OnceLock<XmlAttributeParsers<NeighborAttribs>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlAttributeParsers::new();
            parsers.field(
                "side",
                Invalidations::NONE,
                |attribs: &mut NeighborAttribs, v: NeighborSide| attribs.side = Some(v),
            );
            parsers.field(
                "elementId",
                Invalidations::NONE,
                |attribs: &mut NeighborAttribs, v: XodrObjectReference| attribs.road = v,
            );
            parsers.field(
                "direction",
                Invalidations::NONE,
                |attribs: &mut NeighborAttribs, v: NeighborDirection| attribs.direction = Some(v),
            );
            parsers.finalize();
            parsers
        });

        let mut attribs = XodrParseResult::<NeighborAttribs>::default();
        parsers.parse(node, &mut attribs);
        let (attribs, errors) = attribs.into_parts();

        // Placeholder values on error; the errors gate any use of the link.
        let link = NeighborLink {
            side: attribs.side.unwrap_or(NeighborSide::Left),
            direction: attribs.direction.unwrap_or(NeighborDirection::Same),
            road: attribs.road,
        };
        XodrParseResult::from_parts(link, errors)
    }

    pub(crate) fn resolve_references(&mut self, id_to_index_maps: &IdToIndexMaps) -> Result<(), String> {
        self.road.resolve(&id_to_index_maps.road_id_to_index, "road")
    }
}

/// The `<link>` element of a road: predecessor and successor road links plus
/// up to one neighbor per side.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoadLinks {
    predecessor: RoadLink,
    successor: RoadLink,
    left_neighbor: Option<NeighborLink>,
    right_neighbor: Option<NeighborLink>,
}

impl RoadLinks {
    pub fn predecessor(&self) -> &RoadLink {
        &self.predecessor
    }

    pub fn successor(&self) -> &RoadLink {
        &self.successor
    }

    pub fn left_neighbor(&self) -> Option<&NeighborLink> {
        self.left_neighbor.as_ref()
    }

    pub fn right_neighbor(&self) -> Option<&NeighborLink> {
        self.right_neighbor.as_ref()
    }

    /// Only for use from tests.
    pub fn test_set_predecessor(&mut self, predecessor: RoadLink) {
        self.predecessor = predecessor;
    }

    /// Only for use from tests.
    pub fn test_set_successor(&mut self, successor: RoadLink) {
        self.successor = successor;
    }

    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<RoadLinks> {
        static PARSERS: OnceLock<XmlChildElementParsers<RoadLinks>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlChildElementParsers::new();
            parsers.optional_field(
                "predecessor",
                Invalidations::CONNECTIVITY,
                RoadLink::parse_xml,
                |links: &mut RoadLinks, link| links.predecessor = link,
            );
            parsers.optional_field(
                "successor",
                Invalidations::CONNECTIVITY,
                RoadLink::parse_xml,
                |links: &mut RoadLinks, link| links.successor = link,
            );
            parsers.parser(
                "neighbor",
                Multiplicity::ZeroOrMore,
                Invalidations::CONNECTIVITY,
                |node, result| {
                    let link_result = NeighborLink::parse_xml(node);
                    if !link_result.errors().is_empty() {
                        let _ = result.absorb(link_result);
                        return;
                    }
                    let link = result.absorb(link_result);
                    let occupied = match link.side() {
                        NeighborSide::Left => result.value().left_neighbor.is_some(),
                        NeighborSide::Right => result.value().right_neighbor.is_some(),
                    };
                    if occupied {
                        result.push_error(XodrParseError::message(
                            match link.side() {
                                NeighborSide::Left => "At most a single left neighbor may be specified.",
                                NeighborSide::Right => "At most a single right neighbor may be specified.",
                            },
                            Invalidations::CONNECTIVITY,
                        ));
                    } else {
                        match link.side() {
                            NeighborSide::Left => result.value_mut().left_neighbor = Some(link),
                            NeighborSide::Right => result.value_mut().right_neighbor = Some(link),
                        }
                    }
                },
            );
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        parsers.parse(node, &mut ret);
        ret
    }

    pub(crate) fn resolve_references(&mut self, id_to_index_maps: &IdToIndexMaps) -> Result<(), String> {
        self.predecessor.resolve_references(id_to_index_maps)?;
        self.successor.resolve_references(id_to_index_maps)?;
        if let Some(neighbor) = &mut self.left_neighbor {
            neighbor.resolve_references(id_to_index_maps)?;
        }
        if let Some(neighbor) = &mut self.right_neighbor {
            neighbor.resolve_references(id_to_index_maps)?;
        }
        Ok(())
    }
}
