use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::lane_id::LaneId;
use crate::object_reference::{IdToIndexMaps, XodrObjectReference};
use crate::result::{Invalidations, XodrParseResult};
use crate::road_link::ContactPoint;
use crate::xml::{Multiplicity, XmlAttributeParsers, XmlChildElementParsers};

/// A junction: the part of a road network where roads branch into more than
/// one predecessor or successor.
///
/// A junction is a set of [`Connection`]s; each connection routes one
/// incoming road onto one connecting road (a road owned by the junction)
/// with per-lane links.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Junction {
    name: String,
    id: String,
    connections: Vec<Connection>,
}

impl Junction {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<Junction> {
        static ATTRIB_PARSERS: OnceLock<XmlAttributeParsers<Junction>> = OnceLock::new();
        let attrib_parsers = ATTRIB_PARSERS.get_or_init(|| {
            let mut parsers = XmlAttributeParsers::new();
            parsers.field("name", Invalidations::NONE, |junction: &mut Junction, name: String| {
                junction.name = name
            });
            parsers.field("id", Invalidations::ALL, |junction: &mut Junction, id: String| {
                junction.id = id
            });
            parsers.finalize();
            parsers
        });

        static CHILD_PARSERS: OnceLock<XmlChildElementParsers<Junction>> = OnceLock::new();
        let child_parsers = CHILD_PARSERS.get_or_init(|| {
            let mut parsers = XmlChildElementParsers::new();
            parsers.vector(
                "connection",
                Multiplicity::OneOrMore,
                Invalidations::NONE,
                Connection::parse_xml,
                |junction: &mut Junction, connection| junction.connections.push(connection),
            );
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        attrib_parsers.parse(node, &mut ret);
        child_parsers.parse(node, &mut ret);
        ret
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Whether this junction contains a connection from the given incoming
    /// road to the given connecting road, at the given contact point on the
    /// connecting road.
    pub fn has_connection(
        &self,
        incoming_road_idx: usize,
        connecting_road_idx: usize,
        contact_point: ContactPoint,
    ) -> bool {
        self.find_connection(incoming_road_idx, connecting_road_idx, contact_point)
            .is_some()
    }

    /// The connection with the given incoming road, connecting road and
    /// contact point, if this junction has one.
    pub fn find_connection(
        &self,
        incoming_road_idx: usize,
        connecting_road_idx: usize,
        contact_point: ContactPoint,
    ) -> Option<&Connection> {
        self.connections.iter().find(|conn| {
            conn.incoming_road().index() == incoming_road_idx
                && conn.connecting_road().index() == connecting_road_idx
                && conn.contact_point() == Some(contact_point)
        })
    }

    /// Whether this junction has a connection using the given connecting
    /// road whose *outgoing* contact point is `contact_point` (i.e. whose
    /// incoming contact point is the opposite one).
    pub fn has_outgoing_connection(&self, connecting_road_idx: usize, contact_point: ContactPoint) -> bool {
        let incoming_contact_point = contact_point.opposite();
        self.connections.iter().any(|conn| {
            conn.connecting_road().index() == connecting_road_idx
                && conn.contact_point() == Some(incoming_contact_point)
        })
    }

    pub(crate) fn resolve_references(&mut self, id_to_index_maps: &IdToIndexMaps) -> Result<(), String> {
        for connection in &mut self.connections {
            connection.resolve_references(id_to_index_maps)?;
        }
        Ok(())
    }

    /// Only for use from tests.
    pub fn test_connection_by_id(&mut self, id: &str) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|conn| conn.id() == id)
    }
}

/// A connection within a junction: the incoming road, the connecting road
/// which carries traffic through the junction, and the lane-to-lane links
/// between the two.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Connection {
    id: String,
    incoming_road: XodrObjectReference,
    connecting_road: XodrObjectReference,
    contact_point: Option<ContactPoint>,
    lane_links: Vec<LaneLink>,
}

impl Connection {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<Connection> {
        static ATTRIB_PARSERS: OnceLock<XmlAttributeParsers<Connection>> = OnceLock::new();
        let attrib_parsers = ATTRIB_PARSERS.get_or_init(|| {
            let mut parsers = XmlAttributeParsers::new();
            parsers.field("id", Invalidations::ALL, |conn: &mut Connection, id: String| {
                conn.id = id
            });
            parsers.field(
                "incomingRoad",
                Invalidations::CONNECTIVITY,
                |conn: &mut Connection, road: XodrObjectReference| conn.incoming_road = road,
            );
            parsers.field(
                "connectingRoad",
                Invalidations::CONNECTIVITY,
                |conn: &mut Connection, road: XodrObjectReference| conn.connecting_road = road,
            );
            parsers.field(
                "contactPoint",
                Invalidations::CONNECTIVITY,
                |conn: &mut Connection, contact_point: ContactPoint| conn.contact_point = Some(contact_point),
            );
            parsers.finalize();
            parsers
        });

        static CHILD_PARSERS: OnceLock<XmlChildElementParsers<Connection>> = OnceLock::new();
        let child_parsers = CHILD_PARSERS.get_or_init(|| {
            let mut parsers = XmlChildElementParsers::new();
            parsers.vector(
                "laneLink",
                Multiplicity::ZeroOrMore,
                Invalidations::NONE,
                LaneLink::parse_xml,
                |conn: &mut Connection, lane_link| conn.lane_links.push(lane_link),
            );
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        attrib_parsers.parse(node, &mut ret);
        child_parsers.parse(node, &mut ret);
        ret
    }

    /// The id of this connection within its junction.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn incoming_road(&self) -> &XodrObjectReference {
        &self.incoming_road
    }

    pub fn connecting_road(&self) -> &XodrObjectReference {
        &self.connecting_road
    }

    /// The contact point on the connecting road. `None` only when the
    /// attribute failed to parse, which a CONNECTIVITY error will have
    /// recorded.
    pub fn contact_point(&self) -> Option<ContactPoint> {
        self.contact_point
    }

    pub fn lane_links(&self) -> &[LaneLink] {
        &self.lane_links
    }

    /// The 'to' lane of the lane link whose 'from' lane equals `from_lane`,
    /// or `None` if this connection doesn't link that lane.
    pub fn find_lane_link_target(&self, from_lane: LaneId) -> Option<LaneId> {
        self.lane_links
            .iter()
            .find(|link| link.from() == from_lane)
            .map(LaneLink::to)
    }

    pub(crate) fn resolve_references(&mut self, id_to_index_maps: &IdToIndexMaps) -> Result<(), String> {
        self.incoming_road.resolve(&id_to_index_maps.road_id_to_index, "road")?;
        self.connecting_road.resolve(&id_to_index_maps.road_id_to_index, "road")
    }

    /// Sets the target of the given 'from' lane, replacing an existing link,
    /// adding a new one, or (with `None`) removing it.
    ///
    /// Only for use from tests.
    pub fn test_set_lane_link_target(&mut self, from_lane_id: LaneId, to_lane_id: Option<LaneId>) {
        if let Some(pos) = self.lane_links.iter().position(|link| link.from() == from_lane_id) {
            match to_lane_id {
                Some(to) => self.lane_links[pos].to = to,
                None => {
                    self.lane_links.remove(pos);
                }
            }
            return;
        }
        if let Some(to) = to_lane_id {
            self.lane_links.push(LaneLink { from: from_lane_id, to });
        }
    }
}

/// A lane-to-lane link of a junction connection: `from` is a lane of the
/// incoming road, `to` a lane of the connecting road.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneLink {
    from: LaneId,
    to: LaneId,
}

impl LaneLink {
    pub fn new(from: LaneId, to: LaneId) -> Self {
        LaneLink { from, to }
    }

    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<LaneLink> {
        static PARSERS: OnceLock<XmlAttributeParsers<LaneLink>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlAttributeParsers::new();
            parsers.field("from", Invalidations::CONNECTIVITY, |link: &mut LaneLink, id: LaneId| {
                link.from = id
            });
            parsers.field("to", Invalidations::CONNECTIVITY, |link: &mut LaneLink, id: LaneId| {
                link.to = id
            });
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        parsers.parse(node, &mut ret);
        ret
    }

    pub fn from(&self) -> LaneId {
        self.from
    }

    pub fn to(&self) -> LaneId {
        self.to
    }
}
